// src/notify/webhook.rs
use super::{DetectionEvent, DetectionNotifier};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const VERSION_HEADER: &str = "X-News-Source";
/// Upper bound on delivery attempts; the last backoff is `500ms << (MAX_RETRIES - 2)`.
pub const MAX_RETRIES: u8 = 8;

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }

    fn version_value() -> String {
        format!("v{}", env!("CARGO_PKG_VERSION"))
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt - 1))
}

#[async_trait]
impl DetectionNotifier for WebhookNotifier {
    async fn notify(&self, url: &str, event: &DetectionEvent) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(url)
                .timeout(self.timeout)
                .header(VERSION_HEADER, Self::version_value())
                .json(event)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(backoff(attempt)).await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn retries_are_clamped() {
        assert_eq!(WebhookNotifier::new().with_retries(0).max_retries, 1);
        assert_eq!(WebhookNotifier::new().with_retries(5).max_retries, 5);
        assert_eq!(WebhookNotifier::new().with_retries(200).max_retries, MAX_RETRIES);
        assert_eq!(WebhookNotifier::new().with_retries(u8::MAX).max_retries, MAX_RETRIES);
        // Longest wait the loop can reach.
        assert_eq!(backoff(MAX_RETRIES - 1), Duration::from_secs(32));
    }

    #[test]
    fn header_carries_crate_version() {
        let v = WebhookNotifier::version_value();
        assert!(v.starts_with('v'));
        assert_eq!(&v[1..], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unreachable_target_fails_after_retries() {
        let n = WebhookNotifier::new().with_timeout(1).with_retries(1);
        let s = crate::source::Source::new(1, "Water Board");
        let ev = DetectionEvent::source_detected(&s, 0.5, chrono::Utc::now());
        // Port 9 on localhost (discard) is closed in test environments.
        assert!(n.notify("http://127.0.0.1:9/hook", &ev).await.is_err());
    }
}
