use thiserror::Error;

/// Canonical FedQ error taxonomy used across crates.
///
/// Classification guidance:
/// - [`FedqError::Planning`]: plan shape/name/type issues discovered while rewriting
/// - [`FedqError::Internal`]: caller contract violations and broken invariants, always a bug
/// - [`FedqError::InvalidConfig`]: config/session-property/path contract violations
/// - [`FedqError::Io`]: raw filesystem IO failures from std APIs
///
/// A predicate that merely cannot run on the remote source is not an error at
/// all; classifiers report that through their own result type and the rewrite
/// keeps the predicate local.
#[derive(Debug, Error)]
pub enum FedqError {
    /// Invalid or inconsistent configuration/session state.
    ///
    /// Examples:
    /// - malformed numeric session property values
    /// - unreadable or malformed connector config files
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Plan rewriting failures on structurally valid input.
    ///
    /// Examples:
    /// - remote query descriptors that fail to serialize
    /// - handle/column mismatches discovered mid-rewrite
    #[error("planning error: {0}")]
    Planning(String),

    /// Caller contract violations and broken internal invariants.
    ///
    /// Examples:
    /// - a plan fragment with zero or several remote-source scans
    /// - an anchor scan missing its remote table handle
    #[error("internal error: {0}")]
    Internal(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Standard FedQ result alias.
pub type Result<T> = std::result::Result<T, FedqError>;
