//! Debugging tool allowlist
//!
//! Interactive tools (REPLs, debugger expression evaluation) end up calling
//! guarded operations from their own frames. Enforcement is skipped when any
//! frame in the inspected window comes from one of them.

use crate::error::GuardError;
use crate::frame::CallStackFrame;
use regex::RegexSet;

/// Source path patterns of known interactive debugging tools
pub const DEFAULT_DEBUG_PATTERNS: &[&str] = &[
    r"(^|/)evcxr[^/]*/",
    r"(^|/)irust[^/]*/",
    r"__lldb_expr",
];

#[derive(Debug, Clone)]
pub struct DebugAllowlist {
    patterns: RegexSet,
}

impl DebugAllowlist {
    /// Allowlist built from `patterns` only
    pub fn new<I, S>(patterns: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// Default patterns plus `extra`
    pub fn with_extra<I, S>(extra: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = DEFAULT_DEBUG_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.into_iter().map(|p| p.as_ref().to_string()))
            .collect();
        Self::new(patterns)
    }

    /// Allowlist that never matches
    pub fn empty() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }

    /// True iff any frame's source path matches a pattern
    pub fn matches(&self, frames: &[CallStackFrame]) -> bool {
        frames.iter().any(|frame| self.matches_path(&frame.path))
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.patterns.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        self.patterns.patterns()
    }
}

impl Default for DebugAllowlist {
    fn default() -> Self {
        Self::with_extra(std::iter::empty::<&str>()).unwrap_or_else(|_| Self::empty())
    }
}
