// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod prompt;
pub mod rules;
pub mod source;
pub mod store;
pub mod text;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::DetectorConfig;
pub use crate::detect::{
    detect_intelligent, detect_simple, strategy_for, Detection, DetectionMethod, DetectionMode,
    DetectionStrategy,
};
pub use crate::error::SourceError;
pub use crate::rules::{DetectionRule, DetectionRules, RuleKind};
pub use crate::source::{Source, SourceDraft};
pub use crate::store::SourceStore;
pub use crate::validate::{validate_content, Validation};

use axum::Router;
use tracing::info;

/// Build the full in-process app from `config` (seed import included).
pub fn app(config: DetectorConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(config)?;
    info!(
        sources = state.store.len(),
        mode = state.config.detection.default_mode.as_str(),
        min_confidence = state.config.detection.min_confidence,
        "news source detector ready"
    );
    router(state)
}
