//! Shared test utilities for integration tests
//!
//! Serializes environment variable changes so configuration tests can run in
//! parallel with the rest of the suite.

use std::sync::Mutex;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(keys: &[&str]) -> Self {
        Self {
            saved: keys
                .iter()
                .map(|key| (key.to_string(), std::env::var(key).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (key, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(&key, orig),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Run `f` with an isolated config home and the given environment variables set
///
/// - XDG_CONFIG_HOME and HOME point into `test_dir`
/// - `vars` are set for the duration of `f`
/// - The original environment is restored afterwards
pub fn with_config_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut keys = vec!["HOME", "XDG_CONFIG_HOME"];
    keys.extend(vars.iter().map(|(key, _)| *key));
    let env_state = EnvState::capture(&keys);

    let test_config_home = test_dir.path().join("config");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    env_state.restore();

    result
}
