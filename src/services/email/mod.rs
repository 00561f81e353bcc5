pub mod http;

use async_trait::async_trait;

/// Outbound email channel.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
