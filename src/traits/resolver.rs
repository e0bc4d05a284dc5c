//! Resolver traits for dependency resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::registration::AnyArc;
use crate::traits::Dispose;

/// Core resolver trait for object-safe dependency resolution.
///
/// Implemented by every lifetime scope (fixture scopes, test scopes and the
/// context handed to factories). The builder and the eager-execution step only
/// ever talk to a `&dyn ResolverCore`.
///
/// Most callers should use the [`Resolver`] trait instead, which adds typed
/// generic methods on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single dependency.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(AnyArc))` - The resolved instance wrapped in `Arc<dyn Any>`
    /// * `Ok(None)` - The type was never declared; callers skip the parameter
    /// * `Err(DiError)` - Resolution error (circular, disposed scope, etc.)
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>>;

    /// Registers a disposal hook with the scope that owns this resolution.
    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>);
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// Blanket-implemented for every [`ResolverCore`], so fixture scopes, test
/// scopes and factory contexts all share the same API.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, Resolver, TestSession};
///
/// struct Config { name: &'static str }
/// struct Client { config: std::sync::Arc<Config> }
///
/// let mut catalog = DependencyCatalog::new("client_tests");
/// catalog.add_singleton(Config { name: "staging" });
/// catalog.add_scoped_factory::<Client, _>(|r| Client { config: r.get_required::<Config>() });
///
/// let session = TestSession::new(catalog);
/// let scope = session.scopes().unwrap().fixture("client_tests::Suite", "client_tests::Suite");
/// let client = scope.get_required::<Client>();
/// assert_eq!(client.config.name, "staging");
/// assert!(scope.get::<u8>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete dependency, `None` if it was never declared.
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Option<Arc<T>>> {
        let key = TypeKey::of::<T>();
        match self.resolve_any(&key)? {
            Some(any) => any
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch(key.name())),
            None => Ok(None),
        }
    }

    /// Resolves a concrete dependency that must have been declared.
    fn try_get_required<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.get::<T>()?
            .ok_or(DiError::NotDeclared(std::any::type_name::<T>()))
    }

    /// Resolves a concrete dependency, panicking on failure.
    ///
    /// Convenient inside factories, where a missing upstream dependency is a
    /// programming error in the catalog.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.try_get_required::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Registers a dependency for disposal when its scope is disposed.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_disposer(Box::new(move || service.dispose()));
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
