use async_trait::async_trait;
use tracing::{debug, info};

/// Outbound mail used by the password reset flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes reset links to the log instead of sending mail. Good enough for
/// development; production wires a real provider behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        info!(%to, "password reset mail queued");
        debug!(%to, %link, "password reset link");
        Ok(())
    }
}
