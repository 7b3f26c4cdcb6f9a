//! Configuration System
//!
//! Layered configuration for enforcement settings and collocation policies:
//! defaults, the global config file, an explicit file, then `COLLOCATE_*`
//! environment variables.

use crate::guard::{DEFAULT_DEBUG_WINDOW, DEFAULT_TRACE_DEPTH};
use crate::logging::LoggingConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollocateConfig {
    /// Enforcement settings
    #[serde(default)]
    pub enforcement: EnforcementSettings,

    /// Collocation policies, applied per owner type
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Enforcement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementSettings {
    /// When false, installing guards is a no-op
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ancestor frames inspected for debugging tools
    #[serde(default = "default_debug_window")]
    pub debug_window: usize,

    /// Frames captured for violation traces
    #[serde(default = "default_trace_depth")]
    pub trace_depth: usize,

    /// Include the built-in debugging tool patterns
    #[serde(default = "default_true")]
    pub default_debug_patterns: bool,

    /// Additional debugging tool path patterns (regex)
    #[serde(default)]
    pub debug_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_debug_window() -> usize {
    DEFAULT_DEBUG_WINDOW
}

fn default_trace_depth() -> usize {
    DEFAULT_TRACE_DEPTH
}

impl Default for EnforcementSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debug_window: default_debug_window(),
            trace_depth: default_trace_depth(),
            default_debug_patterns: default_true(),
            debug_patterns: Vec::new(),
        }
    }
}

/// Operations of one owner type and the files allowed to call them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Owner type name, full or trailing path segments
    pub owner: String,
    pub operations: Vec<String>,
    pub allowed_paths: Vec<String>,
}

impl PolicyConfig {
    /// Validate a single policy
    pub fn validate(&self) -> Result<(), String> {
        if self.owner.trim().is_empty() {
            return Err("Owner cannot be empty".to_string());
        }
        if self.operations.is_empty() {
            return Err("At least one operation is required".to_string());
        }
        if self.operations.iter().any(|op| op.trim().is_empty()) {
            return Err("Operation names cannot be empty".to_string());
        }
        if self.allowed_paths.is_empty() {
            return Err("At least one allowed path is required".to_string());
        }
        if self.allowed_paths.iter().any(|path| path.trim().is_empty()) {
            return Err("Allowed paths cannot be empty".to_string());
        }
        Ok(())
    }

    /// Whether this policy applies to the type named `owner`.
    ///
    /// The policy owner matches the full type name or its trailing path
    /// segments: `QueryResult` covers `app::model::QueryResult`, `Result` does not.
    pub fn covers_owner(&self, owner: &str) -> bool {
        owner_matches(owner, &self.owner)
    }

    /// Whether both policies can apply to the same type
    fn overlaps(&self, other: &PolicyConfig) -> bool {
        owner_matches(&self.owner, &other.owner) || owner_matches(&other.owner, &self.owner)
    }
}

fn owner_matches(full: &str, tail: &str) -> bool {
    full == tail
        || full
            .strip_suffix(tail)
            .map(|prefix| prefix.ends_with("::"))
            .unwrap_or(false)
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Policy(String, String),
    Enforcement(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Policy(owner, msg) => {
                write!(f, "Policy '{}': {}", owner, msg)
            }
            ValidationError::Enforcement(msg) => {
                write!(f, "Enforcement: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl EnforcementSettings {
    /// Validate enforcement settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.debug_window > self.trace_depth {
            errors.push(format!(
                "debug_window ({}) cannot exceed trace_depth ({})",
                self.debug_window, self.trace_depth
            ));
        }

        for pattern in &self.debug_patterns {
            if let Err(e) = Regex::new(pattern) {
                errors.push(format!("Invalid debug pattern '{}': {}", pattern, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl CollocateConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(messages) = self.enforcement.validate() {
            errors.extend(messages.into_iter().map(ValidationError::Enforcement));
        }

        for policy in &self.policies {
            if let Err(e) = policy.validate() {
                errors.push(ValidationError::Policy(policy.owner.clone(), e));
            }
        }

        // Check for operations covered by more than one policy
        for (index, policy) in self.policies.iter().enumerate() {
            let earlier: HashSet<&str> = self.policies[..index]
                .iter()
                .filter(|other| other.overlaps(policy))
                .flat_map(|other| other.operations.iter().map(String::as_str))
                .collect();
            for operation in &policy.operations {
                if earlier.contains(operation.as_str()) {
                    errors.push(ValidationError::Policy(
                        policy.owner.clone(),
                        format!("Operation '{}' is covered by more than one policy", operation),
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Policy covering `operation` on the type named `owner`, if any.
    ///
    /// Owners match as in [`PolicyConfig::covers_owner`].
    pub fn find_policy(&self, owner: &str, operation: &str) -> Option<&PolicyConfig> {
        self.policies
            .iter()
            .find(|p| p.covers_owner(owner) && p.operations.iter().any(|op| op == operation))
    }
}
