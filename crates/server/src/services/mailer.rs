use async_trait::async_trait;

use crate::db::models::User;

/// Outgoing mail. Delivery itself lives outside this service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, user: &User, link: &str) -> anyhow::Result<()>;
}

/// Writes verification links to the log instead of sending mail.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, user: &User, link: &str) -> anyhow::Result<()> {
        tracing::info!(email = %user.email, %link, "verification link issued");
        Ok(())
    }
}
