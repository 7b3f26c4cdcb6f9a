//! Collocate: Collocated Caller Enforcement
//!
//! Restricts designated operations of a type to callers located in approved
//! source files, so an object's internals are only touched by the wrapper code
//! that lives alongside it.
//!
//! This is a discipline aid, not a security boundary: enforcement can be
//! disabled through configuration and bypassed with
//! [`allow_noncollocated_callers`].
//!
//! ```
//! use collocate::{allow_noncollocated_callers, enforce_collocated_callers, Invocation, MethodTable};
//!
//! struct QueryResult {
//!     value: i64,
//! }
//!
//! let mut table = MethodTable::<QueryResult>::new();
//! table.define("value", |inv: &Invocation<'_, QueryResult>, ()| inv.target().value);
//! enforce_collocated_callers(&mut table, ["value"], ["src/query_result.rs"]).unwrap();
//!
//! let result = QueryResult { value: 42 };
//! assert!(table.call::<(), i64>(&result, "value", ()).is_err());
//!
//! let value = allow_noncollocated_callers(|| table.call::<(), i64>(&result, "value", ()));
//! assert_eq!(value.unwrap(), 42);
//! ```

pub mod allowlist;
pub mod bypass;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod guard;
pub mod logging;
pub mod resolver;

pub use allowlist::DebugAllowlist;
pub use bypass::{is_bypassed, with_bypass, BypassScope};
pub use config::{CollocateConfig, ConfigLoader, EnforcementSettings, PolicyConfig};
pub use dispatch::{Bound, Invocation, MethodTable};
pub use error::{CollocationViolation, GuardError};
pub use frame::{CallStackFrame, CallTrace};
pub use guard::{Decision, Enforcement, GuardedOperation, OperationGuard};
pub use resolver::{BacktraceResolver, CallerResolver, FixedResolver};

/// Guard `operations` of `table` so they may only be called from
/// `allowed_paths`, with default enforcement settings.
pub fn enforce_collocated_callers<T, O, OS, P, PS>(
    table: &mut MethodTable<T>,
    operations: O,
    allowed_paths: P,
) -> Result<(), GuardError>
where
    T: 'static,
    O: IntoIterator<Item = OS>,
    OS: AsRef<str>,
    P: IntoIterator<Item = PS>,
    PS: AsRef<str>,
{
    table.wrap(operations, allowed_paths, &Enforcement::default())
}

/// Like [`enforce_collocated_callers`], with explicit enforcement settings.
pub fn enforce_collocated_callers_with<T, O, OS, P, PS>(
    table: &mut MethodTable<T>,
    operations: O,
    allowed_paths: P,
    enforcement: &Enforcement,
) -> Result<(), GuardError>
where
    T: 'static,
    O: IntoIterator<Item = OS>,
    OS: AsRef<str>,
    P: IntoIterator<Item = PS>,
    PS: AsRef<str>,
{
    table.wrap(operations, allowed_paths, enforcement)
}

/// Run `body` with collocation enforcement suspended on the current thread.
///
/// For trusted callers that are not collocated, such as test harnesses and
/// framework glue. The previous bypass state is restored afterwards, also when
/// `body` panics.
pub fn allow_noncollocated_callers<R>(body: impl FnOnce() -> R) -> R {
    bypass::with_bypass(body)
}
