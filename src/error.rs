//! Error types for collocated caller enforcement.

use crate::frame::CallTrace;
use std::fmt;
use thiserror::Error;

/// Raised when a guarded operation is called from outside its allowed files.
///
/// The trace is rooted at the violating caller, never at guard internals.
#[derive(Debug, Clone)]
pub struct CollocationViolation {
    owner: String,
    operation: String,
    allowed_paths: Vec<String>,
    trace: CallTrace,
}

impl CollocationViolation {
    pub(crate) fn new(
        owner: impl Into<String>,
        operation: impl Into<String>,
        allowed_paths: impl IntoIterator<Item = String>,
        trace: CallTrace,
    ) -> Self {
        let mut allowed_paths: Vec<String> = allowed_paths.into_iter().collect();
        allowed_paths.sort();
        Self {
            owner: owner.into(),
            operation: operation.into(),
            allowed_paths,
            trace,
        }
    }

    /// Type name owning the guarded operation
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Name of the guarded operation
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Files the operation may be called from, sorted
    pub fn allowed_paths(&self) -> &[String] {
        &self.allowed_paths
    }

    /// Call trace starting at the violating caller
    pub fn trace(&self) -> &CallTrace {
        &self.trace
    }
}

impl fmt::Display for CollocationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} was called outside of '{}'",
            self.operation,
            self.allowed_paths.join(", ")
        )?;
        if let Some(caller) = self.trace.caller() {
            write!(f, " (called from {})", caller)?;
        }
        write!(
            f,
            ". Call it from one of these files, or wrap a trusted caller in \
             `allow_noncollocated_callers`"
        )
    }
}

impl std::error::Error for CollocationViolation {}

/// Errors produced by guard setup and guarded dispatch
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Violation(#[from] CollocationViolation),

    #[error("Unknown operation '{operation}' on {owner}")]
    UnknownOperation { owner: String, operation: String },

    #[error("Operation '{operation}' on {owner} called with mismatched argument or return types")]
    SignatureMismatch { owner: String, operation: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GuardError {
    /// The violation, if this error is one
    pub fn as_violation(&self) -> Option<&CollocationViolation> {
        match self {
            GuardError::Violation(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for GuardError {
    fn from(err: config::ConfigError) -> Self {
        GuardError::ConfigError(err.to_string())
    }
}

impl From<regex::Error> for GuardError {
    fn from(err: regex::Error) -> Self {
        GuardError::ConfigError(format!("Invalid debug pattern: {}", err))
    }
}
