//! Integration tests for nested, recursive and layered guarded operations

use super::support::{query_result_operations, query_result_table, QueryResult, ResultWrapper, WRAPPER_PATH};
use collocate::{
    enforce_collocated_callers_with, is_bypassed, Enforcement, FixedResolver, GuardError,
    Invocation, MethodTable,
};
use serde_json::Value;
use std::sync::Arc;

fn enforcement() -> Enforcement {
    Enforcement::default().with_resolver(Arc::new(FixedResolver::default()))
}

#[test]
fn test_nested_operations_through_wrapper() {
    let table = query_result_table(&enforcement());
    let wrapper = ResultWrapper::new(QueryResult::sample(), Arc::new(table));

    let summary = wrapper.summary().unwrap();
    assert!(summary.contains("octocat"));
    assert!(summary.ends_with("(1 errors)"));
}

#[test]
fn test_inner_operation_is_not_rechallenged() {
    // `value` may only be called from the wrapper file; `report` is allowed here
    // and calls `value` from this file.
    let mut table: MethodTable<QueryResult> = query_result_table(&enforcement());
    table.define(
        "report",
        |inv: &Invocation<'_, QueryResult>, ()| -> Result<String, GuardError> {
            let value: Value = inv.call("value", ())?;
            Ok(value["user"]["login"].to_string())
        },
    );
    enforce_collocated_callers_with(&mut table, ["report"], [file!()], &enforcement()).unwrap();

    let result = QueryResult::sample();
    let report = table
        .call::<(), Result<String, GuardError>>(&result, "report", ())
        .unwrap()
        .unwrap();
    assert_eq!(report, "\"octocat\"");
    assert_eq!(result.reads(), 1);

    // outside of `report` the same call is rejected
    assert!(table.call::<(), Value>(&result, "value", ()).is_err());
}

#[test]
fn test_recursive_operation() {
    let table = query_result_table(&enforcement());
    let wrapper = ResultWrapper::new(QueryResult::sample(), Arc::new(table));

    assert!(wrapper.depth(16).unwrap());
    assert!(!is_bypassed());
}

#[test]
fn test_recursive_operation_from_disallowed_file() {
    let table = query_result_table(&enforcement());
    let err = table
        .call::<u32, Result<bool, GuardError>>(&QueryResult::sample(), "depth", 3)
        .unwrap_err();
    assert_eq!(err.as_violation().unwrap().operation(), "depth");
}

#[test]
fn test_layered_guards_delegate_inward() {
    let mut table = query_result_operations();
    enforce_collocated_callers_with(&mut table, ["value", "errors"], [WRAPPER_PATH], &enforcement())
        .unwrap();
    enforce_collocated_callers_with(&mut table, ["value"], [file!()], &enforcement()).unwrap();

    let layers = table.guarded_operations("value");
    assert_eq!(layers.len(), 2);
    assert!(layers[0].permits(file!()));
    assert!(layers[1].permits(WRAPPER_PATH));
    assert_eq!(table.guarded_operations("errors").len(), 1);

    let result = QueryResult::sample();
    // the outer layer accepts this file; the inner layer runs bypassed
    assert!(table.call::<(), Value>(&result, "value", ()).is_ok());
    // `errors` only has the wrapper layer
    assert!(table.call::<(), Vec<String>>(&result, "errors", ()).is_err());

    // through the wrapper file, the outer layer rejects
    let wrapper = ResultWrapper::new(QueryResult::sample(), Arc::new(table));
    assert!(wrapper.value().is_err());
}
