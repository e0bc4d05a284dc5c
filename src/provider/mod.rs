//! The dependency registry built from catalogs.
//!
//! This module contains the [`DependencyRegistry`] root container and the
//! [`LifetimeScope`] type that caches scoped instances beneath it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::collection::DependencyCatalog;
use crate::descriptors::DependencyDescriptor;
use crate::error::{DiError, DiResult, ExecuteError};
use crate::internal::{with_circular_catch, DisposeBag};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;
pub use context::ResolverContext;
pub use scope::LifetimeScope;

/// Default bound on nested factory resolutions before giving up.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Immutable dependency container built from one or more catalogs.
///
/// The registry records, for every declared type, its lifetime, its factory and
/// whether it carries the [`Execute`](crate::Execute) capability. Once built it
/// never changes. Singletons are cached here; scoped dependencies live in the
/// [`LifetimeScope`]s created from it.
///
/// Cloning is cheap: the registry is shared through an `Arc`.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, DependencyRegistry, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct RequestId(u32);
///
/// let mut catalog = DependencyCatalog::new("requests");
/// catalog.add_scoped_factory::<RequestId, _>(|_| RequestId(7));
///
/// let registry = DependencyRegistry::build(&[catalog]).unwrap();
/// let first = registry.create_scope("first");
/// let second = registry.create_scope("second");
///
/// let a = first.get_required::<RequestId>();
/// let b = first.get_required::<RequestId>();
/// let c = second.get_required::<RequestId>();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Clone)]
pub struct DependencyRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    registry: Registry,
    descriptors: Vec<DependencyDescriptor>,
    max_depth: usize,
    root_disposers: Mutex<DisposeBag>,
}

impl RegistryInner {
    #[inline(always)]
    pub(crate) fn registry_entry(&self, key: &TypeKey) -> Option<&Registration> {
        self.registry.get(key)
    }
}

impl DependencyRegistry {
    /// Builds a registry from every declaration of every catalog.
    ///
    /// Fails on the first type declared more than once; no partial registry is
    /// ever produced.
    pub fn build(catalogs: &[DependencyCatalog]) -> DiResult<Self> {
        Self::build_with_max_depth(catalogs, DEFAULT_MAX_DEPTH)
    }

    /// Builds a registry with a custom resolution depth limit.
    pub fn build_with_max_depth(catalogs: &[DependencyCatalog], max_depth: usize) -> DiResult<Self> {
        let mut registry = Registry::new();
        let mut descriptors = Vec::new();

        for catalog in catalogs {
            for declaration in catalog.declarations() {
                registry.insert(declaration)?;
            }
            descriptors.extend(catalog.descriptors());
        }

        tracing::debug!(
            catalogs = catalogs.len(),
            declarations = registry.len(),
            "dependency registry built"
        );

        Ok(Self {
            inner: Arc::new(RegistryInner {
                registry,
                descriptors,
                max_depth,
                root_disposers: Mutex::new(DisposeBag::default()),
            }),
        })
    }

    #[inline]
    pub(crate) fn inner(&self) -> &RegistryInner {
        &self.inner
    }

    /// Creates a fresh lifetime scope with its own scoped-instance cache.
    pub fn create_scope(&self, label: impl Into<String>) -> LifetimeScope {
        LifetimeScope::new(self.clone(), label.into())
    }

    /// Whether `key` was declared in any catalog.
    pub fn is_declared(&self, key: &TypeKey) -> bool {
        self.inner.registry.get(key).is_some()
    }

    /// Whether `key` was declared with the executable capability.
    pub fn is_executable(&self, key: &TypeKey) -> bool {
        self.inner
            .registry
            .get(key)
            .is_some_and(|reg| reg.executor.is_some())
    }

    /// Declared lifetime of `key`, if any.
    pub fn lifetime_of(&self, key: &TypeKey) -> Option<Lifetime> {
        self.inner.registry.get(key).map(|reg| reg.lifetime)
    }

    /// Descriptors of every declared dependency, in declaration order.
    pub fn descriptors(&self) -> &[DependencyDescriptor] {
        &self.inner.descriptors
    }

    /// Number of declared dependencies.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    /// Runs the executable capability of an instance declared as `key`.
    ///
    /// `None` when the type is not executable.
    pub(crate) fn execute(&self, key: &TypeKey, instance: &AnyArc) -> Option<Result<(), ExecuteError>> {
        let executor = self.inner.registry.get(key)?.executor.as_ref()?;
        Some(executor(instance))
    }

    /// Singleton resolution; the factory sees the root as its resolver.
    pub(crate) fn resolve_singleton(&self, reg: &Registration) -> DiResult<AnyArc> {
        let Some(cell) = &reg.singleton else {
            let ctx = ResolverContext::new(self);
            return (reg.ctor)(&ctx);
        };

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        cell.get_or_try_init(|| {
            let ctx = ResolverContext::new(self);
            (reg.ctor)(&ctx)
        })
        .cloned()
    }

    /// Runs the disposers registered by singleton factories, LIFO.
    pub fn dispose(&self) -> usize {
        let ran = self.inner.root_disposers.lock().run_all_reverse();
        if ran > 0 {
            tracing::debug!(hooks = ran, "singleton disposers ran");
        }
        ran
    }

    fn resolve_any_impl(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        let Some(reg) = self.inner.registry.get(key) else {
            return Ok(None);
        };

        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg).map(Some),
            Lifetime::Scoped => Err(DiError::WrongLifetime(
                "Cannot resolve scoped dependency from the registry root",
            )),
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self);
                (reg.ctor)(&ctx).map(Some)
            }
        }
    }
}

impl ResolverCore for DependencyRegistry {
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        with_circular_catch(key.name(), self.max_depth(), || self.resolve_any_impl(key))
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.inner.root_disposers.lock().push(f);
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        if !self.root_disposers.get_mut().is_empty() {
            tracing::warn!("dependency registry dropped with undisposed singleton resources");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Resolver;

    struct Settings;
    struct Session;

    #[test]
    fn scoped_from_root_is_a_lifetime_error() {
        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_scoped_factory::<Session, _>(|_| Session);
        let registry = DependencyRegistry::build(&[catalog]).unwrap();

        assert!(matches!(registry.get::<Session>(), Err(DiError::WrongLifetime(_))));
    }

    #[test]
    fn undeclared_types_are_absent() {
        let registry = DependencyRegistry::build(&[DependencyCatalog::new("empty")]).unwrap();
        assert!(registry.get::<Settings>().unwrap().is_none());
        assert!(!registry.is_declared(&TypeKey::of::<Settings>()));
    }

    #[test]
    fn duplicates_across_catalogs_fail_the_build() {
        let mut first = DependencyCatalog::new("first");
        first.add_singleton(Settings);
        let mut second = DependencyCatalog::new("second");
        second.add_singleton(Settings);

        let err = DependencyRegistry::build(&[first, second]).err().unwrap();
        assert!(matches!(err, DiError::DuplicateDeclaration(name) if name.ends_with("Settings")));
    }
}
