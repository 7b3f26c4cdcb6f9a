//! Environment source: COLLOCATE_<SECTION>__<KEY>, e.g. COLLOCATE_ENFORCEMENT__ENABLED=false
//!
//! List keys take comma-separated values, e.g.
//! COLLOCATE_ENFORCEMENT__DEBUG_PATTERNS="tools/inspector/,scripts/repl". Patterns
//! containing a comma can only be set in a config file.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "COLLOCATE";

/// Keys parsed as comma-separated lists
const LIST_KEYS: &[&str] = &["enforcement.debug_patterns"];

/// Add environment overrides to builder.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    let environment = LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .try_parsing(true),
        |environment, key| environment.with_list_parse_key(key),
    );
    builder.add_source(environment)
}
