use super::{NotifyError, SmsSender};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioConfig {
    /// TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBERから設定を読み込む
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            env::var(key).ok().filter(|value| !value.is_empty())
        }

        Some(Self {
            account_sid: get_env("TWILIO_ACCOUNT_SID")?,
            auth_token: get_env("TWILIO_AUTH_TOKEN")?,
            from_number: get_env("TWILIO_PHONE_NUMBER")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

pub struct TwilioSmsSender {
    config: TwilioConfig,
    client: Client,
}

impl TwilioSmsSender {
    pub fn new(config: TwilioConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let res = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        if let Err(e) = res.error_for_status_ref() {
            let detail = res
                .json::<TwilioErrorResponse>()
                .await
                .ok()
                .and_then(|error| {
                    error
                        .message
                        .map(|message| format!("{} (code {:?})", message, error.code))
                })
                .unwrap_or_default();
            return Err(NotifyError::TransportError(format!("{} {}", e, detail)));
        }

        Ok(())
    }
}
