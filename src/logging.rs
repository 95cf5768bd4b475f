// src/logging.rs
//! Tracing setup and the anonymizing helpers used wherever content would be logged.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_DEV_LOG: &str = "NEWS_SOURCE_DEV_LOG";
const DEFAULT_FILTER: &str = "news_source_detector=info,warn";

/// Dev-only verbose logging: `NEWS_SOURCE_DEV_LOG=1` AND (debug build OR a dev `SHUTTLE_ENV`).
pub fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Install a compact fmt subscriber. Safe to call more than once; later calls are no-ops.
/// On Shuttle the platform installs its own subscriber, so the `try_init` error is ignored.
pub fn init_tracing() {
    let fallback = if dev_logging_enabled() {
        "news_source_detector=debug,info"
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Short stable fingerprint of `text` (first 6 bytes of SHA-256, hex).
/// Logs carry this instead of the bulletin itself.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("Water Board notice");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("Water Board notice"));
        assert_ne!(a, anon_hash("Water Board notice."));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[serial_test::serial]
    #[test]
    fn dev_logging_needs_flag() {
        std::env::remove_var(ENV_DEV_LOG);
        assert!(!dev_logging_enabled());
        std::env::set_var(ENV_DEV_LOG, "0");
        assert!(!dev_logging_enabled());
        std::env::remove_var(ENV_DEV_LOG);
    }
}
