//! Operation Guard
//!
//! Per-call collocation check. A call passes when bypass is active, when the
//! caller's source file is one of the operation's allowed paths, or when a
//! debugging tool is on the stack. A passing call runs inside a bypass scope, so
//! whatever the operation calls internally is not challenged again.

use crate::allowlist::DebugAllowlist;
use crate::bypass::{self, BypassScope};
use crate::config::EnforcementSettings;
use crate::error::{CollocationViolation, GuardError};
use crate::frame::{normalize_path, CallStackFrame, CallTrace};
use crate::resolver::{BacktraceResolver, CallerResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::Location;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Number of ancestor frames inspected for debugging tools
pub const DEFAULT_DEBUG_WINDOW: usize = 5;

/// Number of frames captured for violation traces
pub const DEFAULT_TRACE_DEPTH: usize = 32;

/// An operation restricted to callers in a set of source files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedOperation {
    owner: String,
    operation: String,
    allowed_paths: BTreeSet<String>,
}

impl GuardedOperation {
    pub fn new<I, S>(owner: impl Into<String>, operation: impl Into<String>, allowed_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            owner: owner.into(),
            operation: operation.into(),
            allowed_paths: allowed_paths
                .into_iter()
                .map(|path| normalize_path(path.as_ref()))
                .collect(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn allowed_paths(&self) -> &BTreeSet<String> {
        &self.allowed_paths
    }

    /// Whether a call from `path` is collocated
    pub fn permits(&self, path: &str) -> bool {
        self.allowed_paths.contains(&normalize_path(path))
    }
}

/// Outcome of the location check for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Caller is in an allowed file
    Collocated,
    /// A debugging tool is on the stack
    DebugTool,
    Denied,
}

/// Enforcement settings shared by the guards of one setup call
#[derive(Debug, Clone)]
pub struct Enforcement {
    enabled: bool,
    resolver: Arc<dyn CallerResolver>,
    allowlist: Arc<DebugAllowlist>,
    debug_window: usize,
    trace_depth: usize,
}

impl Default for Enforcement {
    fn default() -> Self {
        Self {
            enabled: true,
            resolver: Arc::new(BacktraceResolver::new()),
            allowlist: Arc::new(DebugAllowlist::default()),
            debug_window: DEFAULT_DEBUG_WINDOW,
            trace_depth: DEFAULT_TRACE_DEPTH,
        }
    }
}

impl Enforcement {
    /// Build enforcement from the `[enforcement]` configuration section
    pub fn from_settings(settings: &EnforcementSettings) -> Result<Self, GuardError> {
        let allowlist = if settings.default_debug_patterns {
            DebugAllowlist::with_extra(&settings.debug_patterns)?
        } else {
            DebugAllowlist::new(&settings.debug_patterns)?
        };

        Ok(Self {
            enabled: settings.enabled,
            allowlist: Arc::new(allowlist),
            debug_window: settings.debug_window,
            trace_depth: settings.trace_depth,
            ..Self::default()
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CallerResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_allowlist(mut self, allowlist: DebugAllowlist) -> Self {
        self.allowlist = Arc::new(allowlist);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_debug_window(mut self, debug_window: usize) -> Self {
        self.debug_window = debug_window;
        self
    }

    pub fn with_trace_depth(mut self, trace_depth: usize) -> Self {
        self.trace_depth = trace_depth;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn allowlist(&self) -> &DebugAllowlist {
        &self.allowlist
    }

    pub fn debug_window(&self) -> usize {
        self.debug_window
    }

    pub fn trace_depth(&self) -> usize {
        self.trace_depth
    }
}

/// Enforces one [`GuardedOperation`]
#[derive(Debug, Clone)]
pub struct OperationGuard {
    operation: Arc<GuardedOperation>,
    enforcement: Enforcement,
}

impl OperationGuard {
    pub fn new(operation: GuardedOperation, enforcement: Enforcement) -> Self {
        Self {
            operation: Arc::new(operation),
            enforcement,
        }
    }

    pub fn operation(&self) -> &GuardedOperation {
        &self.operation
    }

    pub fn enforcement(&self) -> &Enforcement {
        &self.enforcement
    }

    /// Location policy for a caller and its ancestor window. No side effects.
    pub fn decide(&self, caller: &CallStackFrame, window: &[CallStackFrame]) -> Decision {
        if self.operation.permits(&caller.path) {
            return Decision::Collocated;
        }
        let allowlist = &self.enforcement.allowlist;
        if allowlist.matches(std::slice::from_ref(caller)) || allowlist.matches(window) {
            return Decision::DebugTool;
        }
        Decision::Denied
    }

    /// Check a call made from `site`, ignoring any active bypass.
    ///
    /// Ancestor frames are captured only when the caller itself is not
    /// collocated, and at most once.
    pub fn check(&self, site: &Location<'_>) -> Result<Decision, CollocationViolation> {
        let caller = CallStackFrame::from_location(site);
        if self.operation.permits(&caller.path) {
            trace!(
                owner = %self.operation.owner,
                operation = %self.operation.operation,
                caller = %caller,
                "Collocated call"
            );
            return Ok(Decision::Collocated);
        }

        let depth = self.enforcement.trace_depth.max(self.enforcement.debug_window);
        let window = self.enforcement.resolver.frames_in_window(0, depth);
        let inspected = &window[..window.len().min(self.enforcement.debug_window)];

        match self.decide(&caller, inspected) {
            Decision::Denied => {
                warn!(
                    owner = %self.operation.owner,
                    operation = %self.operation.operation,
                    caller = %caller,
                    "Non-collocated call rejected"
                );
                let trace = CallTrace::rooted_at(caller, window);
                Err(CollocationViolation::new(
                    self.operation.owner.clone(),
                    self.operation.operation.clone(),
                    self.operation.allowed_paths.iter().cloned(),
                    trace,
                ))
            }
            decision => {
                debug!(
                    owner = %self.operation.owner,
                    operation = %self.operation.operation,
                    caller = %caller,
                    "Debugging tool on stack, call allowed"
                );
                Ok(decision)
            }
        }
    }

    /// Run `body` as the guarded operation, called from the caller of this
    /// method.
    #[track_caller]
    pub fn invoke<R>(&self, body: impl FnOnce() -> R) -> Result<R, CollocationViolation> {
        self.invoke_at(Location::caller(), body)
    }

    /// Run `body` as the guarded operation, called from `site`.
    ///
    /// `body` runs inside a bypass scope once the call is accepted. Its result
    /// is returned unchanged and a panic in it unwinds through, restoring the
    /// previous bypass state on the way.
    pub fn invoke_at<R>(
        &self,
        site: &Location<'_>,
        body: impl FnOnce() -> R,
    ) -> Result<R, CollocationViolation> {
        if !self.enforcement.enabled {
            return Ok(body());
        }
        if bypass::is_bypassed() {
            trace!(
                owner = %self.operation.owner,
                operation = %self.operation.operation,
                "Bypassed call"
            );
            return Ok(body());
        }

        self.check(site)?;
        let _scope = BypassScope::enter();
        Ok(body())
    }
}
