//! Property-based tests for the location policy

use collocate::{CallStackFrame, Decision, Enforcement, FixedResolver, GuardedOperation, OperationGuard};
use proptest::prelude::*;
use std::sync::Arc;

fn source_path() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}(/[a-z_]{1,8}){0,3}\\.rs"
}

fn guard(allowed: &str) -> OperationGuard {
    OperationGuard::new(
        GuardedOperation::new("QueryResult", "value", [allowed]),
        Enforcement::default().with_resolver(Arc::new(FixedResolver::default())),
    )
}

proptest! {
    #[test]
    fn prop_allowed_path_permitted_in_any_spelling(path in source_path()) {
        let operation = GuardedOperation::new("QueryResult", "value", [path.as_str()]);
        prop_assert!(operation.permits(&path));
        let dotted = format!("./{}", path);
        prop_assert!(operation.permits(&dotted));
        let backslashed = path.replace('/', "\\");
        prop_assert!(operation.permits(&backslashed));
    }

    #[test]
    fn prop_other_paths_denied(allowed in source_path(), caller in source_path()) {
        prop_assume!(allowed != caller);
        let decision = guard(&allowed).decide(&CallStackFrame::new(caller), &[]);
        prop_assert_eq!(decision, Decision::Denied);
    }

    #[test]
    fn prop_debugger_frame_anywhere_in_window(
        allowed in source_path(),
        ancestors in prop::collection::vec(source_path(), 0..8),
        position in 0usize..8,
    ) {
        let mut window: Vec<CallStackFrame> =
            ancestors.into_iter().map(CallStackFrame::new).collect();
        let position = position.min(window.len());
        window.insert(position, CallStackFrame::new("/opt/evcxr/src/eval.rs"));

        let decision = guard(&allowed).decide(&CallStackFrame::new("src/caller.rs"), &window);
        prop_assert_eq!(decision, Decision::DebugTool);
    }
}
