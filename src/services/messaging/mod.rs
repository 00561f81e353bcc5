pub mod twilio;

use async_trait::async_trait;

/// Outbound SMS channel.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()>;
}
