//! Outbound notification sinks used by the reminder scheduler.

pub mod console;
pub mod smtp;
pub mod twilio;

pub use console::ConsoleEmailSender;
pub use smtp::{SmtpConfig, SmtpEmailSender};
pub use twilio::{TwilioConfig, TwilioSmsSender};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    BuildError(String),
    #[error("failed to deliver message: {0}")]
    TransportError(String),
    #[error("failed to request to SMS gateway")]
    RequestError(#[from] reqwest::Error),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}
