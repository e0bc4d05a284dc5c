//! Scoped dependency resolution and disposal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{DependencyRegistry, ResolverContext};
use crate::error::{DiError, DiResult};
use crate::internal::{with_circular_catch, DisposeBag};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration};
use crate::traits::ResolverCore;

/// A lifetime boundary with its own cache of scoped instances.
///
/// - **Singleton**: delegated to the registry root, shared by every scope
/// - **Scoped**: constructed once per `LifetimeScope` and cached here
/// - **Transient**: constructed on every resolution
///
/// Scopes created with [`create_child`](Self::create_child) share the root
/// but not the scoped cache, so a child sees fresh scoped instances.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, DependencyRegistry, Resolver};
/// use std::sync::Arc;
///
/// struct Connection;
///
/// let mut catalog = DependencyCatalog::new("db");
/// catalog.add_scoped_factory::<Connection, _>(|_| Connection);
/// let registry = DependencyRegistry::build(&[catalog]).unwrap();
///
/// let fixture = registry.create_scope("fixture");
/// let test = fixture.create_child("test");
/// assert!(Arc::ptr_eq(&fixture.get_required::<Connection>(), &fixture.get_required::<Connection>()));
/// assert!(!Arc::ptr_eq(&fixture.get_required::<Connection>(), &test.get_required::<Connection>()));
///
/// fixture.dispose();
/// assert!(fixture.get::<Connection>().is_err());
/// ```
pub struct LifetimeScope {
    root: DependencyRegistry,
    label: String,
    scoped: Mutex<HashMap<TypeKey, Arc<OnceCell<AnyArc>>>>,
    disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl LifetimeScope {
    pub(crate) fn new(root: DependencyRegistry, label: String) -> Self {
        Self {
            root,
            label,
            scoped: Mutex::new(HashMap::new()),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Label used in diagnostics, usually the fixture or method signature.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The registry this scope resolves against.
    pub fn registry(&self) -> &DependencyRegistry {
        &self.root
    }

    /// Creates a nested scope sharing the root but with an empty scoped cache.
    pub fn create_child(&self, label: impl Into<String>) -> LifetimeScope {
        LifetimeScope::new(self.root.clone(), label.into())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes the scope: runs its disposers in LIFO order and drops every
    /// cached scoped instance. Later resolutions fail with
    /// [`DiError::ScopeDisposed`]. Returns how many disposers ran; disposing
    /// twice is a no-op.
    pub fn dispose(&self) -> usize {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let ran = self.disposers.lock().run_all_reverse();
        self.scoped.lock().clear();
        ran
    }

    fn resolve_scoped(&self, key: &TypeKey, reg: &Registration) -> DiResult<AnyArc> {
        let cell = {
            let mut scoped = self.scoped.lock();
            scoped.entry(*key).or_default().clone()
        };

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        // The cache lock is released here; nested resolutions may need it.
        cell.get_or_try_init(|| {
            let ctx = ResolverContext::new(self);
            (reg.ctor)(&ctx)
        })
        .cloned()
    }

    fn resolve_any_impl(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        if self.is_disposed() {
            return Err(DiError::ScopeDisposed(self.label.clone()));
        }

        let Some(reg) = self.root.inner().registry_entry(key) else {
            return Ok(None);
        };

        let value = match reg.lifetime {
            Lifetime::Singleton => self.root.resolve_singleton(reg)?,
            Lifetime::Scoped => self.resolve_scoped(key, reg)?,
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self);
                (reg.ctor)(&ctx)?
            }
        };

        tracing::trace!(scope = %self.label, dependency = key.name(), lifetime = %reg.lifetime, "resolved");
        Ok(Some(value))
    }
}

impl ResolverCore for LifetimeScope {
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        with_circular_catch(key.name(), self.root.max_depth(), || self.resolve_any_impl(key))
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.disposers.lock().push(f);
    }
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        if !self.disposers.get_mut().is_empty() {
            tracing::warn!(scope = %self.label, "scope dropped with undisposed resources");
        }
    }
}

impl std::fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("label", &self.label)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::DependencyCatalog;
    use crate::traits::{Dispose, Resolver};
    use std::sync::atomic::AtomicUsize;

    struct Counted(usize);

    struct Handle {
        closed: Arc<AtomicUsize>,
    }

    impl Dispose for Handle {
        fn dispose(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn transient_is_fresh_within_one_scope() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_transient_factory::<Counted, _>(move |_| Counted(counter.fetch_add(1, Ordering::SeqCst)));
        let registry = DependencyRegistry::build(&[catalog]).unwrap();
        let scope = registry.create_scope("s");

        let a = scope.get_required::<Counted>();
        let b = scope.get_required::<Counted>();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_runs_hooks_once_and_rejects_resolution() {
        let closed = Arc::new(AtomicUsize::new(0));
        let hook_counter = closed.clone();
        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_scoped_factory::<Handle, _>(move |r| {
            let handle = Arc::new(Handle { closed: hook_counter.clone() });
            r.register_disposer(handle);
            Handle { closed: hook_counter.clone() }
        });
        let registry = DependencyRegistry::build(&[catalog]).unwrap();
        let scope = registry.create_scope("s");

        scope.get_required::<Handle>();
        assert_eq!(scope.dispose(), 1);
        assert_eq!(scope.dispose(), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(matches!(scope.get::<Handle>(), Err(DiError::ScopeDisposed(label)) if label == "s"));
    }
}
