//! Method Table
//!
//! Named operations of a target type, dispatched through replaceable entries.
//! Guarding an operation replaces its entry with an intercepting layer that holds
//! the previous entry, so repeated guards form a chain in which each layer
//! delegates to the next one inward.
//!
//! Operations are called through `#[track_caller]` methods; the call site of
//! the outermost call becomes the caller checked by each layer.

use crate::config::CollocateConfig;
use crate::error::GuardError;
use crate::guard::{Enforcement, GuardedOperation, OperationGuard};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use tracing::debug;

type Imp<T, A, R> = Arc<dyn Fn(&Invocation<'_, T>, A) -> Result<R, GuardError> + Send + Sync>;

/// One call of a table operation, as seen by its implementation
pub struct Invocation<'a, T> {
    target: &'a T,
    table: &'a MethodTable<T>,
    operation: &'a str,
    site: &'static Location<'static>,
}

impl<'a, T: 'static> Invocation<'a, T> {
    pub fn target(&self) -> &'a T {
        self.target
    }

    pub fn table(&self) -> &'a MethodTable<T> {
        self.table
    }

    pub fn operation(&self) -> &'a str {
        self.operation
    }

    /// Where the operation was called from
    pub fn call_site(&self) -> &'static Location<'static> {
        self.site
    }

    /// Call another operation on the same target.
    ///
    /// The call site is the caller of this method, i.e. the implementation
    /// making the nested call.
    #[track_caller]
    pub fn call<A: 'static, R: 'static>(&self, name: &str, args: A) -> Result<R, GuardError> {
        self.table.call(self.target, name, args)
    }
}

fn erase<T, A, R, F>(imp: F) -> Imp<T, A, R>
where
    F: Fn(&Invocation<'_, T>, A) -> Result<R, GuardError> + Send + Sync + 'static,
{
    Arc::new(imp)
}

struct Method<T, A, R> {
    imp: Imp<T, A, R>,
    /// Policies layered on this entry, outermost first
    guards: Vec<GuardedOperation>,
}

trait Entry<T>: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn intercepted(&self, guard: OperationGuard) -> Box<dyn Entry<T>>;

    fn guards(&self) -> &[GuardedOperation];
}

impl<T: 'static, A: 'static, R: 'static> Entry<T> for Method<T, A, R> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn intercepted(&self, guard: OperationGuard) -> Box<dyn Entry<T>> {
        let mut guards = Vec::with_capacity(self.guards.len() + 1);
        guards.push(guard.operation().clone());
        guards.extend(self.guards.iter().cloned());

        let inner = Arc::clone(&self.imp);
        let imp = erase(move |invocation: &Invocation<'_, T>, args: A| {
            guard.invoke_at(invocation.site, || inner(invocation, args))?
        });

        Box::new(Method { imp, guards })
    }

    fn guards(&self) -> &[GuardedOperation] {
        &self.guards
    }
}

/// Dispatch table for the operations of `T`
pub struct MethodTable<T> {
    owner: String,
    entries: HashMap<String, Box<dyn Entry<T>>>,
}

impl<T: 'static> MethodTable<T> {
    /// Empty table owned by `T`'s type name
    pub fn new() -> Self {
        Self::with_owner(type_name::<T>())
    }

    /// Empty table with an explicit owner name
    pub fn with_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Define or redefine an operation.
    ///
    /// Redefining a name discards the previous entry together with any guards
    /// layered on it.
    pub fn define<A, R, F>(&mut self, name: impl Into<String>, imp: F) -> &mut Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&Invocation<'_, T>, A) -> R + Send + Sync + 'static,
    {
        let imp = erase(move |invocation: &Invocation<'_, T>, args: A| Ok(imp(invocation, args)));
        self.entries.insert(
            name.into(),
            Box::new(Method {
                imp,
                guards: Vec::new(),
            }),
        );
        self
    }

    /// Call operation `name` on `target` from the caller's location.
    #[track_caller]
    pub fn call<A: 'static, R: 'static>(
        &self,
        target: &T,
        name: &str,
        args: A,
    ) -> Result<R, GuardError> {
        let site = Location::caller();
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| GuardError::UnknownOperation {
                owner: self.owner.clone(),
                operation: name.to_string(),
            })?;
        let method = entry
            .as_any()
            .downcast_ref::<Method<T, A, R>>()
            .ok_or_else(|| GuardError::SignatureMismatch {
                owner: self.owner.clone(),
                operation: name.to_string(),
            })?;

        let invocation = Invocation {
            target,
            table: self,
            operation: name,
            site,
        };
        (method.imp)(&invocation, args)
    }

    /// Guard `operations` so they may only be called from `allowed_paths`.
    ///
    /// Every name must already be defined; otherwise nothing is installed.
    /// With enforcement disabled this is a no-op.
    pub fn wrap<O, OS, P, PS>(
        &mut self,
        operations: O,
        allowed_paths: P,
        enforcement: &Enforcement,
    ) -> Result<(), GuardError>
    where
        O: IntoIterator<Item = OS>,
        OS: AsRef<str>,
        P: IntoIterator<Item = PS>,
        PS: AsRef<str>,
    {
        let operations: Vec<String> = operations
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        let allowed_paths: Vec<String> = allowed_paths
            .into_iter()
            .map(|path| path.as_ref().to_string())
            .collect();

        if let Some(missing) = operations.iter().find(|name| !self.entries.contains_key(*name)) {
            return Err(GuardError::UnknownOperation {
                owner: self.owner.clone(),
                operation: missing.clone(),
            });
        }

        if !enforcement.is_enabled() {
            debug!(owner = %self.owner, "Collocation enforcement disabled, guards not installed");
            return Ok(());
        }

        for name in operations {
            let operation = GuardedOperation::new(self.owner.clone(), name.clone(), &allowed_paths);
            let guard = OperationGuard::new(operation, enforcement.clone());
            if let Some(entry) = self.entries.get_mut(&name) {
                *entry = entry.intercepted(guard);
                debug!(
                    owner = %self.owner,
                    operation = %name,
                    layers = entry.guards().len(),
                    "Installed collocation guard"
                );
            }
        }
        Ok(())
    }

    /// Install every configured policy whose owner names this table.
    ///
    /// A policy owner matches the full owner name or its trailing path
    /// segments (`QueryResult` matches `app::model::QueryResult`). Returns the
    /// number of policies installed.
    pub fn apply_policies(
        &mut self,
        config: &CollocateConfig,
        enforcement: &Enforcement,
    ) -> Result<usize, GuardError> {
        let policies: Vec<_> = config
            .policies
            .iter()
            .filter(|policy| policy.covers_owner(&self.owner))
            .collect();

        // Nothing is installed unless every policy can be
        if let Some(missing) = policies
            .iter()
            .flat_map(|policy| &policy.operations)
            .find(|name| !self.entries.contains_key(*name))
        {
            return Err(GuardError::UnknownOperation {
                owner: self.owner.clone(),
                operation: missing.clone(),
            });
        }

        for policy in &policies {
            self.wrap(&policy.operations, &policy.allowed_paths, enforcement)?;
        }
        Ok(policies.len())
    }

    /// Defined operation names, sorted
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_guarded(&self, name: &str) -> bool {
        !self.guarded_operations(name).is_empty()
    }

    /// Policies layered on `name`, outermost first
    pub fn guarded_operations(&self, name: &str) -> &[GuardedOperation] {
        self.entries
            .get(name)
            .map(|entry| entry.guards())
            .unwrap_or(&[])
    }
}

impl<T: 'static> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MethodTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("MethodTable")
            .field("owner", &self.owner)
            .field("operations", &names)
            .finish()
    }
}

/// A target paired with the table of its operations
pub struct Bound<T> {
    target: T,
    table: Arc<MethodTable<T>>,
}

impl<T: 'static> Bound<T> {
    pub fn new(target: T, table: Arc<MethodTable<T>>) -> Self {
        Self { target, table }
    }

    /// Call operation `name` from the caller's location
    #[track_caller]
    pub fn call<A: 'static, R: 'static>(&self, name: &str, args: A) -> Result<R, GuardError> {
        self.table.call(&self.target, name, args)
    }

    /// The target itself, without dispatch
    pub fn get(&self) -> &T {
        &self.target
    }

    pub fn table(&self) -> &Arc<MethodTable<T>> {
        &self.table
    }

    pub fn into_inner(self) -> T {
        self.target
    }
}
