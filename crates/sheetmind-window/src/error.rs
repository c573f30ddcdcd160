//! Error types for window perception.

use thiserror::Error;

/// Reject code surfaced when the locator refuses a registration or
/// lookup. Not an exception that escapes the subsystem — the manager
/// records the code and falls back to its own legacy indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// The identity is already registered to a different window id.
    IdentityConflict,
    /// The identity resolved to a window of a different kind than expected.
    KindConflict,
}

impl RejectCode {
    /// Stable string form, matching the original reject-code constants.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentityConflict => "WINDOW_IDENTITY_CONFLICT",
            Self::KindConflict => "WINDOW_KIND_CONFLICT",
        }
    }
}

impl std::fmt::Display for RejectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locator reject: carries the code plus a human-readable reason.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct LocatorReject {
    /// The reject code.
    pub code: RejectCode,
    /// Human-readable context.
    pub message: String,
}

impl LocatorReject {
    /// Build an identity-conflict reject.
    #[must_use]
    pub fn identity_conflict(message: impl Into<String>) -> Self {
        Self { code: RejectCode::IdentityConflict, message: message.into() }
    }

    /// Build a kind-conflict reject.
    #[must_use]
    pub fn kind_conflict(message: impl Into<String>) -> Self {
        Self { code: RejectCode::KindConflict, message: message.into() }
    }
}

/// Raised when a delta cannot be applied to a window (kind mismatch, or
/// a generic field target that doesn't exist / isn't list-like).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeltaReject(pub String);

/// Errors produced by the window perception subsystem.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The locator rejected a registration or lookup.
    #[error(transparent)]
    Locator(#[from] LocatorReject),
    /// A delta could not be applied to its target window.
    #[error(transparent)]
    Delta(#[from] DeltaReject),
    /// The requested window id is not known to the manager.
    #[error("unknown window id: {0}")]
    UnknownWindow(String),
    /// The requested focus action string does not match any known action.
    #[error("invalid focus action: {0}")]
    InvalidFocusAction(String),
    /// The focus action requires a refill that no reader is configured for.
    #[error("no refill reader configured for window {0}")]
    NoRefillReader(String),
}

/// Result alias for window perception operations.
pub type WindowResult<T> = Result<T, WindowError>;
