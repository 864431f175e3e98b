pub mod crawl;
pub mod remind;
pub mod server;

use crate::modules::migration::MIGRATOR;
use anyhow::{Context, Result};
use contest_tracker_libs::notify::{
    ConsoleEmailSender, EmailSender, SmsSender, SmtpConfig, SmtpEmailSender, TwilioConfig,
    TwilioSmsSender,
};
use reqwest::Client;
use sqlx::{postgres::Postgres, Pool};
use std::{env, sync::Arc};

/// DATABASE_URLで指定されたデータベースに接続し、マイグレーションを実行する
pub async fn connect_database() -> Result<Pool<Postgres>> {
    let database_url: String = env::var("DATABASE_URL").with_context(|| {
        let message = "DATABASE_URL must be configured.";
        tracing::error!(message);
        message
    })?;

    let pool: Pool<Postgres> = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .with_context(|| {
            let message = "Failed to create database connection pool.";
            tracing::error!(message);
            message
        })?;

    MIGRATOR.run(&pool).await.with_context(|| {
        let message = "Failed to run database migrations.";
        tracing::error!(message);
        message
    })?;

    Ok(pool)
}

/// 環境変数の設定に応じて通知の送信手段を作る
///
/// SMTPの設定がなければメールはログに出力するだけになり、
/// Twilioの設定がなければSMSは送信しない
pub fn build_notifiers(
    client: Client,
    console_only: bool,
) -> Result<(Arc<dyn EmailSender>, Option<Arc<dyn SmsSender>>)> {
    if console_only {
        tracing::info!("Reminders will be written to the log instead of being delivered");
        return Ok((Arc::new(ConsoleEmailSender::new()), None));
    }

    let email: Arc<dyn EmailSender> = match SmtpConfig::from_env() {
        Some(config) => Arc::new(SmtpEmailSender::new(config).with_context(|| {
            let message = "Failed to configure SMTP transport.";
            tracing::error!(message);
            message
        })?),
        None => {
            tracing::warn!(
                "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD or SMTP_FROM_EMAIL is not set. Reminder emails will be written to the log."
            );
            Arc::new(ConsoleEmailSender::new())
        }
    };

    let sms: Option<Arc<dyn SmsSender>> = match TwilioConfig::from_env() {
        Some(config) => Some(Arc::new(TwilioSmsSender::new(config, client))),
        None => None,
    };

    Ok((email, sms))
}
