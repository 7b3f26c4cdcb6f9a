//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources override earlier ones key by key: defaults, global file,
//! explicit file, environment.

use crate::guard::{DEFAULT_DEBUG_WINDOW, DEFAULT_TRACE_DEPTH};
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("enforcement.enabled", true)?
        .set_default("enforcement.debug_window", DEFAULT_DEBUG_WINDOW as i64)?
        .set_default("enforcement.trace_depth", DEFAULT_TRACE_DEPTH as i64)?
        .set_default("enforcement.default_debug_patterns", true)?
        .set_default("logging.level", "info")
}
