//! Integration tests for thread isolation of bypass scopes

use super::support::{query_result_table, QueryResult, ResultWrapper};
use collocate::{allow_noncollocated_callers, is_bypassed, Enforcement, FixedResolver};
use serde_json::Value;
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

fn shared_table() -> Arc<collocate::MethodTable<QueryResult>> {
    let enforcement = Enforcement::default().with_resolver(Arc::new(FixedResolver::default()));
    Arc::new(query_result_table(&enforcement))
}

#[test]
fn test_bypass_does_not_leak_across_threads() {
    let table = shared_table();
    let entered = Arc::new(Barrier::new(2));
    let checked = Arc::new(Barrier::new(2));

    let holder = {
        let table = Arc::clone(&table);
        let entered = Arc::clone(&entered);
        let checked = Arc::clone(&checked);
        thread::spawn(move || {
            allow_noncollocated_callers(|| {
                entered.wait();
                let value = table.call::<(), Value>(&QueryResult::sample(), "value", ());
                checked.wait();
                value.is_ok()
            })
        })
    };

    entered.wait();
    assert!(!is_bypassed());
    let direct = table.call::<(), Value>(&QueryResult::sample(), "value", ());
    checked.wait();

    assert!(direct.is_err());
    assert!(holder.join().unwrap());
}

#[test]
fn test_parallel_wrapper_calls() {
    let table = shared_table();
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let table = Arc::clone(&table);
            let tx = tx.clone();
            thread::spawn(move || {
                let wrapper = ResultWrapper::new(QueryResult::sample(), table);
                for _ in 0..50 {
                    let login = wrapper.login().unwrap();
                    assert_eq!(login, Some(Value::from("octocat")));
                    assert!(wrapper.depth(3).unwrap());
                }
                tx.send((id, wrapper.inner().table().owner().to_string())).unwrap();
            })
        })
        .collect();
    drop(tx);

    for handle in handles {
        handle.join().unwrap();
    }
    let results: Vec<_> = rx.iter().collect();
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|(_, owner)| owner.ends_with("QueryResult")));
}

#[test]
fn test_spawned_thread_starts_unbypassed() {
    allow_noncollocated_callers(|| {
        assert!(is_bypassed());
        let inherited = thread::spawn(is_bypassed).join().unwrap();
        assert!(!inherited);
    });
}
