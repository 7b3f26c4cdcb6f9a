//! Integration tests for debugging tool detection

use super::support::{query_result_table, QueryResult};
use collocate::{
    CallStackFrame, DebugAllowlist, Enforcement, EnforcementSettings, FixedResolver, GuardError,
};
use serde_json::Value;
use std::sync::Arc;

fn stack(paths: &[&str]) -> Arc<FixedResolver> {
    Arc::new(FixedResolver::new(
        paths.iter().map(|path| CallStackFrame::new(*path)).collect(),
    ))
}

fn value_with(enforcement: &Enforcement) -> Result<Value, GuardError> {
    let table = query_result_table(enforcement);
    table.call(&QueryResult::sample(), "value", ())
}

#[test]
fn test_debugger_frame_allows_call() {
    let enforcement = Enforcement::default().with_resolver(stack(&[
        "tests/integration/debug_allowlist.rs",
        "/home/dev/.cargo/registry/src/index.crates.io/evcxr-0.17.0/src/eval_context.rs",
        "src/main.rs",
    ]));

    let value = value_with(&enforcement).unwrap();
    assert_eq!(value["user"]["login"], "octocat");
}

#[test]
fn test_call_without_debugger_frame_is_rejected() {
    let enforcement = Enforcement::default().with_resolver(stack(&[
        "tests/integration/debug_allowlist.rs",
        "src/controller.rs",
        "src/main.rs",
    ]));

    let err = value_with(&enforcement).unwrap_err();
    let violation = err.as_violation().unwrap();
    // the caller plus every captured ancestor
    assert_eq!(violation.trace().len(), 3);
    assert_eq!(violation.trace().frames()[1].path, "src/controller.rs");
}

#[test]
fn test_debugger_frame_outside_window_is_ignored() {
    let mut paths = vec!["src/frame.rs"; 5];
    paths.push("/opt/irust/src/main.rs");
    let enforcement = Enforcement::default()
        .with_resolver(stack(&paths))
        .with_debug_window(5);
    assert!(value_with(&enforcement).is_err());

    let widened = Enforcement::default()
        .with_resolver(stack(&paths))
        .with_debug_window(6);
    assert!(value_with(&widened).is_ok());
}

#[test]
fn test_custom_debug_pattern_from_settings() {
    let settings = EnforcementSettings {
        debug_patterns: vec![r"(^|/)tools/inspector/".to_string()],
        ..EnforcementSettings::default()
    };
    let enforcement = Enforcement::from_settings(&settings)
        .unwrap()
        .with_resolver(stack(&["tools/inspector/repl.rs"]));
    assert!(value_with(&enforcement).is_ok());

    // built-in patterns remain active alongside custom ones
    let enforcement = Enforcement::from_settings(&settings)
        .unwrap()
        .with_resolver(stack(&["/src/evcxr_repl/main.rs"]));
    assert!(value_with(&enforcement).is_ok());
}

#[test]
fn test_default_patterns_can_be_disabled() {
    let settings = EnforcementSettings {
        default_debug_patterns: false,
        ..EnforcementSettings::default()
    };
    let enforcement = Enforcement::from_settings(&settings)
        .unwrap()
        .with_resolver(stack(&["/src/evcxr_repl/main.rs"]));
    assert!(value_with(&enforcement).is_err());
}

#[test]
fn test_empty_allowlist_rejects_debugger() {
    let enforcement = Enforcement::default()
        .with_allowlist(DebugAllowlist::empty())
        .with_resolver(stack(&["/opt/evcxr/src/lib.rs"]));
    assert!(value_with(&enforcement).is_err());
}

#[test]
fn test_invalid_debug_pattern() {
    let settings = EnforcementSettings {
        debug_patterns: vec!["(unclosed".to_string()],
        ..EnforcementSettings::default()
    };
    assert!(matches!(
        Enforcement::from_settings(&settings),
        Err(GuardError::ConfigError(_))
    ));
}
