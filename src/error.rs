// src/error.rs
//! Typed errors for source writes. Detection itself never fails.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source name is required")]
    EmptyName,

    #[error("slug derived from '{0}' is empty")]
    EmptySlug(String),

    #[error("a source with slug '{0}' already exists")]
    DuplicateSlug(String),

    #[error("invalid JSON in detection rules: {0}")]
    InvalidRules(String),

    #[error("source {0} not found")]
    NotFound(u64),

    #[error("invalid import payload: {0}")]
    InvalidImport(String),
}

impl SourceError {
    /// True for errors caused by the submitted payload (as opposed to a missing record).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyName | Self::EmptySlug(_) | Self::InvalidRules(_) | Self::InvalidImport(_)
        )
    }
}
