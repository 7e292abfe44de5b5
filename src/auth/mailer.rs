use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

/// Out-of-band channel for password reset links.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()>;
}

/// Writes reset links to the log. Stand-in until a mail transport is wired up.
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        info!(%email, %reset_url, "password reset requested");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReset {
    pub email: String,
    pub reset_url: String,
}

/// Keeps every message in memory; used by `AppState::fake`.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentReset>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentReset> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token at the end of the most recent reset link.
    pub fn last_token(&self) -> Option<String> {
        self.sent()
            .last()
            .and_then(|m| m.reset_url.rsplit('/').next().map(String::from))
    }
}

#[async_trait]
impl ResetMailer for MemoryMailer {
    async fn send_reset(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("mail transport unavailable");
        }
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailer lock poisoned"))?
            .push(SentReset {
                email: email.to_string(),
                reset_url: reset_url.to_string(),
            });
        Ok(())
    }
}
