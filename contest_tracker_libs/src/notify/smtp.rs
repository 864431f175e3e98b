use super::{EmailSender, NotifyError};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::env;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// 環境変数から設定を読み込む
    ///
    /// SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD, SMTP_FROM_EMAILのいずれかが
    /// 未設定の場合はNoneを返す
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            env::var(key).ok().filter(|value| !value.is_empty())
        }

        let host = get_env("SMTP_HOST")?;
        let username = get_env("SMTP_USERNAME")?;
        let password = get_env("SMTP_PASSWORD")?;
        let from_email = get_env("SMTP_FROM_EMAIL")?;
        let port = get_env("SMTP_PORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(465);
        let from_name = get_env("SMTP_FROM_NAME");

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            from_name,
        })
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        let address = match &config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_email),
            None => config.from_email.clone(),
        };
        let from: Mailbox = address
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(address.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotifyError::TransportError(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        tracing::info!("SMTP transport configured for {}:{}", config.host, config.port);

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::BuildError(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::TransportError(e.to_string()))?;

        Ok(())
    }
}
