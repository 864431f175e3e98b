use super::{EmailSender, NotifyError};
use async_trait::async_trait;

/// メールを送信せずにログへ出力する開発用の実装
#[derive(Debug, Default)]
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for ConsoleEmailSender {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(to = %to, subject = %subject, "email (console)\n{}", body);
        Ok(())
    }
}
