//! Result and error types for Esperar.
//!
//! The error taxonomy distinguishes the two known-transient failures that a
//! wait loop may absorb (`NotFound`, `StaleHandle`) from failures that always
//! surface to the caller. Wait policies name the kinds they absorb by value
//! through [`FailureKind`] rather than catching broad error classes.

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur while driving a remote browser session
#[derive(Debug, Error)]
pub enum EsperarError {
    /// A wait elapsed without its condition becoming true
    #[error("Timed out after {ms}ms waiting for {description}")]
    Timeout {
        /// Human-readable description of the awaited condition
        description: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// A previously valid handle was invalidated by remote document mutation
    #[error("Stale element handle: {description}")]
    StaleHandle {
        /// What the handle referred to
        description: String,
    },

    /// The interaction target was obscured by another element
    #[error("Action intercepted: {description}")]
    Intercepted {
        /// What was being interacted with
        description: String,
    },

    /// No element matched the locator
    #[error("Element not found: {locator}")]
    NotFound {
        /// The locator that matched nothing
        locator: String,
    },

    /// The requested window does not exist
    #[error("No such window: {description}")]
    NoSuchWindow {
        /// Which window was requested
        description: String,
    },

    /// The requested frame does not exist
    #[error("No such frame: {description}")]
    NoSuchFrame {
        /// Which frame was requested
        description: String,
    },

    /// No alert is currently open
    #[error("No alert present")]
    NoAlert,

    /// JavaScript execution in the page failed or returned an unusable value
    #[error("Script execution failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// The remote session itself failed (transport, protocol, browser crash)
    #[error("Session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// A caller-supplied value was rejected before reaching the session
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Value-comparable tag for each error variant.
///
/// Wait policies carry a set of these to declare which failures are treated
/// as "condition not yet satisfied" while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Locator matched nothing
    NotFound,
    /// Handle invalidated by document mutation
    StaleHandle,
    /// Interaction target obscured
    Intercepted,
    /// Wait deadline elapsed
    Timeout,
    /// Window missing
    NoSuchWindow,
    /// Frame missing
    NoSuchFrame,
    /// No alert open
    NoAlert,
    /// Page script failure
    Script,
    /// Remote session failure
    Session,
    /// Rejected input
    InvalidArgument,
    /// JSON (de)serialization failure
    Json,
}

impl EsperarError {
    /// Get the value-comparable kind of this error
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::StaleHandle { .. } => FailureKind::StaleHandle,
            Self::Intercepted { .. } => FailureKind::Intercepted,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::NoSuchWindow { .. } => FailureKind::NoSuchWindow,
            Self::NoSuchFrame { .. } => FailureKind::NoSuchFrame,
            Self::NoAlert => FailureKind::NoAlert,
            Self::Script { .. } => FailureKind::Script,
            Self::Session { .. } => FailureKind::Session,
            Self::InvalidArgument { .. } => FailureKind::InvalidArgument,
            Self::Json(_) => FailureKind::Json,
        }
    }

    /// Check if this error belongs to the known-transient class that waits
    /// absorb by default
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::NotFound | FailureKind::StaleHandle
        )
    }

    /// Stale-handle error for the given target
    #[must_use]
    pub fn stale(description: impl Into<String>) -> Self {
        Self::StaleHandle {
            description: description.into(),
        }
    }

    /// Not-found error for the given locator
    #[must_use]
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::NotFound {
            locator: locator.into(),
        }
    }

    /// Intercepted-action error for the given target
    #[must_use]
    pub fn intercepted(description: impl Into<String>) -> Self {
        Self::Intercepted {
            description: description.into(),
        }
    }
}
