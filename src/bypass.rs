//! Bypass Context
//!
//! Per-thread flag that suspends enforcement. Set by the guard around a validated
//! call, so the operation's own internals are not re-challenged against the
//! external caller's location, and by [`with_bypass`] for trusted non-collocated
//! callers.
//!
//! The flag is restored to its previous value, not cleared, when a scope ends.
//! Scopes therefore nest, and restoration runs during unwinding as well.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static BYPASSED: Cell<bool> = const { Cell::new(false) };
}

/// Whether enforcement is suspended on the current thread
pub fn is_bypassed() -> bool {
    BYPASSED.with(Cell::get)
}

/// RAII bypass scope for the current thread
///
/// Not `Send`: a scope is always released on the thread that entered it.
#[must_use = "the bypass ends as soon as the scope is dropped"]
#[derive(Debug)]
pub struct BypassScope {
    previous: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl BypassScope {
    pub fn enter() -> Self {
        let previous = BYPASSED.with(|flag| flag.replace(true));
        Self {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// Flag value restored when this scope ends
    pub fn previous(&self) -> bool {
        self.previous
    }
}

impl Drop for BypassScope {
    fn drop(&mut self) {
        let previous = self.previous;
        BYPASSED.with(|flag| flag.set(previous));
    }
}

/// Run `body` with enforcement suspended on the current thread
pub fn with_bypass<R>(body: impl FnOnce() -> R) -> R {
    let _scope = BypassScope::enter();
    body()
}
