//! Dependency catalogs.
//!
//! A [`DependencyCatalog`] is the explicit list of injectable types for one unit
//! of test code. Catalogs are handed to a session, which builds the immutable
//! [`DependencyRegistry`](crate::DependencyRegistry) from them on first use.

use std::sync::Arc;

use crate::dependant::ExecutableTypes;
use crate::descriptors::DependencyDescriptor;
use crate::error::{DiError, DiResult, ExecuteError};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::pipeline::{HappyPath, Pipeline};
use crate::provider::ResolverContext;
use crate::registration::{AnyArc, Declaration, Executor};
use crate::traits::Execute;

#[cfg(feature = "async")]
use crate::pipeline::{AsyncHappyPath, AsyncPipeline};

/// Declarations of injectable types with their lifetimes.
///
/// Each type may be declared once per session. Declaring it twice, in one
/// catalog or across catalogs, makes the registry build fail.
///
/// # Examples
///
/// ```rust
/// use ferrous_fixtures::{DependencyCatalog, Lifetime, Resolver, TypeKey};
/// use std::sync::Arc;
///
/// struct Settings { retries: u32 }
/// struct HttpClient { settings: Arc<Settings> }
///
/// let mut catalog = DependencyCatalog::new("http_tests");
/// catalog
///     .add_singleton(Settings { retries: 3 })
///     .add_scoped_factory::<HttpClient, _>(|r| HttpClient { settings: r.get_required::<Settings>() });
///
/// assert_eq!(catalog.name(), "http_tests");
/// assert!(catalog.contains(&TypeKey::of::<HttpClient>()));
/// assert_eq!(catalog.lifetime_of(&TypeKey::of::<Settings>()), Some(Lifetime::Singleton));
/// ```
#[derive(Clone)]
pub struct DependencyCatalog {
    name: String,
    declarations: Vec<Declaration>,
}

impl DependencyCatalog {
    /// Creates a new empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ----- Plain declarations -----

    /// Declares a singleton instance shared by the whole session.
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        let arc: AnyArc = Arc::new(value);
        let ctor = move |_: &ResolverContext| -> DiResult<AnyArc> { Ok(arc.clone()) };
        self.push(Declaration {
            key: TypeKey::of::<T>(),
            lifetime: Lifetime::Singleton,
            ctor: Arc::new(ctor),
            executor: None,
        })
    }

    /// Declares a singleton built by `factory` on first request.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.declare(Lifetime::Singleton, factory)
    }

    /// Declares a dependency built once per fixture or test scope.
    ///
    /// ```rust
    /// use ferrous_fixtures::{DependencyCatalog, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Database { url: String }
    /// struct UnitOfWork { db: Arc<Database> }
    ///
    /// let mut catalog = DependencyCatalog::new("orders");
    /// catalog.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// catalog.add_scoped_factory::<UnitOfWork, _>(|r| UnitOfWork { db: r.get_required::<Database>() });
    /// ```
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.declare(Lifetime::Scoped, factory)
    }

    /// Declares a dependency built fresh on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.declare(Lifetime::Transient, factory)
    }

    /// Declares `T` with an explicit lifetime.
    pub fn declare<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.push(Declaration {
            key: TypeKey::of::<T>(),
            lifetime,
            ctor: erase(factory),
            executor: None,
        })
    }

    // ----- Executable declarations -----

    /// Declares `T` together with its [`Execute`] capability.
    ///
    /// Only executable declarations may be listed in a
    /// [`DependantConfig`](crate::DependantConfig) or run through "execute
    /// everything injected".
    pub fn declare_executable<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Execute,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.push(Declaration {
            key: TypeKey::of::<T>(),
            lifetime,
            ctor: erase(factory),
            executor: Some(executor_for::<T>()),
        })
    }

    /// Declares a pipeline fixture.
    ///
    /// The injectable type is [`Pipeline<P>`], scoped and executable.
    /// Downstream fixtures take `Pipeline<P>` as a parameter and read its
    /// [`result`](Pipeline::result).
    pub fn add_pipeline<P, F>(&mut self, factory: F) -> &mut Self
    where
        P: HappyPath,
        F: Fn(&ResolverContext) -> P + Send + Sync + 'static,
    {
        self.declare_executable::<Pipeline<P>, _>(Lifetime::Scoped, move |r| Pipeline::new(factory(r)))
    }

    /// Declares an asynchronous pipeline fixture, injectable as [`AsyncPipeline<P>`].
    #[cfg(feature = "async")]
    pub fn add_async_pipeline<P, F>(&mut self, factory: F) -> &mut Self
    where
        P: AsyncHappyPath,
        F: Fn(&ResolverContext) -> P + Send + Sync + 'static,
    {
        self.declare_executable::<AsyncPipeline<P>, _>(Lifetime::Scoped, move |r| {
            AsyncPipeline::new(factory(r))
        })
    }

    // ----- Queries -----

    /// Whether `key` is declared in this catalog.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.find(key).is_some()
    }

    pub fn lifetime_of(&self, key: &TypeKey) -> Option<Lifetime> {
        self.find(key).map(|d| d.lifetime)
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Descriptors of all declarations, in declaration order.
    pub fn descriptors(&self) -> Vec<DependencyDescriptor> {
        self.declarations
            .iter()
            .map(|d| DependencyDescriptor {
                key: d.key,
                lifetime: d.lifetime,
                executable: d.executor.is_some(),
                catalog: self.name.clone(),
            })
            .collect()
    }

    pub(crate) fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn find(&self, key: &TypeKey) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.key == *key)
    }

    fn push(&mut self, declaration: Declaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }
}

impl ExecutableTypes for DependencyCatalog {
    fn is_executable(&self, key: &TypeKey) -> bool {
        self.find(key).is_some_and(|d| d.executor.is_some())
    }
}

impl ExecutableTypes for [DependencyCatalog] {
    fn is_executable(&self, key: &TypeKey) -> bool {
        self.iter().any(|catalog| catalog.is_executable(key))
    }
}

impl std::fmt::Debug for DependencyCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCatalog")
            .field("name", &self.name)
            .field("declarations", &self.declarations.len())
            .finish()
    }
}

fn erase<T, F>(factory: F) -> crate::registration::Ctor
where
    T: 'static + Send + Sync,
    F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
{
    Arc::new(move |r: &ResolverContext| -> DiResult<AnyArc> { Ok(Arc::new(factory(r))) })
}

fn executor_for<T: Execute>() -> Executor {
    Arc::new(|instance: &AnyArc| match instance.downcast_ref::<T>() {
        Some(value) => value.execute(),
        None => Err(ExecuteError::Failure(
            DiError::TypeMismatch(std::any::type_name::<T>()).into(),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Execute for Probe {
        fn execute(&self) -> Result<(), ExecuteError> {
            Ok(())
        }
    }

    struct Plain;

    #[test]
    fn executable_capability_is_recorded() {
        let mut catalog = DependencyCatalog::new("unit");
        catalog
            .declare_executable::<Probe, _>(Lifetime::Transient, |_| Probe)
            .declare::<Plain, _>(Lifetime::default(), |_| Plain);

        assert!(catalog.is_executable(&TypeKey::of::<Probe>()));
        assert!(!catalog.is_executable(&TypeKey::of::<Plain>()));
        assert!(!catalog.is_executable(&TypeKey::of::<u8>()));

        let descriptors = catalog.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert!(descriptors[0].executable);
        assert_eq!(descriptors[1].lifetime, Lifetime::Scoped);
        assert_eq!(descriptors[1].catalog, "unit");
    }

    #[test]
    fn executable_lookup_spans_catalogs() {
        let mut first = DependencyCatalog::new("first");
        first.add_singleton(Plain);
        let mut second = DependencyCatalog::new("second");
        second.declare_executable::<Probe, _>(Lifetime::Scoped, |_| Probe);

        let catalogs = [first, second];
        assert!(catalogs[..].is_executable(&TypeKey::of::<Probe>()));
    }
}
