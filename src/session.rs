//! The test session: the per-run context owning registry, scopes and fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::builder::InjectionBuilder;
use crate::collection::DependencyCatalog;
use crate::config::SessionOptions;
use crate::dependant::ExecutableTypes;
use crate::definition::FixtureDefinition;
use crate::error::DiResult;
use crate::key::TypeKey;
use crate::lifecycle::LifecycleBridge;
use crate::observer::{Observers, SessionObserver};
use crate::provider::DependencyRegistry;
use crate::runner::TestRunner;
use crate::scope_tree::ScopeTree;

/// Context of one test run.
///
/// A session is created once per run and passed by reference (or cheaply
/// cloned) to whatever needs it. It owns the catalogs, builds the
/// [`DependencyRegistry`] from them on first use, keeps the [`ScopeTree`] and
/// remembers every registered [`FixtureDefinition`].
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, Resolver, TestSession};
/// use std::sync::Arc;
///
/// struct Clock;
///
/// let mut catalog = DependencyCatalog::new("clock_tests");
/// catalog.add_singleton(Clock);
/// let session = TestSession::new(catalog);
///
/// let scopes = session.scopes().unwrap();
/// let a = scopes.fixture("tests::A", "tests::A").get_required::<Clock>();
/// let b = scopes.fixture("tests::B", "tests::B").get_required::<Clock>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct TestSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    catalogs: Vec<DependencyCatalog>,
    options: SessionOptions,
    observers: Observers,
    registry: OnceCell<DependencyRegistry>,
    scopes: OnceCell<ScopeTree>,
    fixtures: RwLock<HashMap<String, Arc<FixtureDefinition>>>,
}

impl TestSession {
    /// Session over a single catalog with default options.
    pub fn new(catalog: DependencyCatalog) -> Self {
        Self::builder().catalog(catalog).build()
    }

    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::default()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub fn catalogs(&self) -> &[DependencyCatalog] {
        &self.inner.catalogs
    }

    /// The registry, built from the catalogs on first call.
    ///
    /// Concurrent first callers observe a single build. A failed build is not
    /// cached; every call reports it again.
    pub fn registry(&self) -> DiResult<&DependencyRegistry> {
        self.inner.registry.get_or_try_init(|| {
            DependencyRegistry::build_with_max_depth(&self.inner.catalogs, self.inner.options.max_resolution_depth)
        })
    }

    /// The scope tree, building the registry if needed.
    pub fn scopes(&self) -> DiResult<&ScopeTree> {
        let registry = self.registry()?;
        Ok(self
            .inner
            .scopes
            .get_or_init(|| ScopeTree::new(registry.clone(), self.inner.observers.clone())))
    }

    /// The scope tree if anything has created it yet.
    pub fn scopes_if_built(&self) -> Option<&ScopeTree> {
        self.inner.scopes.get()
    }

    /// Argument resolver and outcome builder bound to this session.
    pub fn injector(&self) -> DiResult<InjectionBuilder<'_>> {
        Ok(InjectionBuilder::new(self.scopes()?, &self.inner.options, &self.inner.observers))
    }

    /// Registers a fixture definition, merging its inherited configuration once.
    ///
    /// Registering a second definition with the same name replaces the first.
    pub fn register_fixture(&self, definition: FixtureDefinition) -> Arc<FixtureDefinition> {
        let definition = Arc::new(definition.flattened());
        let previous = self
            .inner
            .fixtures
            .write()
            .insert(definition.name().to_string(), definition.clone());
        if previous.is_some() {
            tracing::debug!(fixture = definition.name(), "fixture definition replaced");
        }
        definition
    }

    pub fn fixture(&self, name: &str) -> Option<Arc<FixtureDefinition>> {
        self.inner.fixtures.read().get(name).cloned()
    }

    /// Whether `class_name` names a registered fixture or owns a scope.
    pub fn knows_class(&self, class_name: &str) -> bool {
        self.inner.fixtures.read().contains_key(class_name)
            || self.scopes_if_built().is_some_and(|scopes| scopes.has_class(class_name))
    }

    pub fn bridge(&self) -> LifecycleBridge {
        LifecycleBridge::new(self.clone())
    }

    pub fn runner(&self) -> TestRunner {
        TestRunner::new(self.clone())
    }

    /// Disposes every scope, then the singletons' disposers.
    pub fn dispose(&self) -> usize {
        let fixtures = self.scopes_if_built().map_or(0, ScopeTree::dispose_all);
        if let Some(registry) = self.inner.registry.get() {
            registry.dispose();
        }
        fixtures
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }
}

impl ExecutableTypes for TestSession {
    fn is_executable(&self, key: &TypeKey) -> bool {
        self.inner.catalogs[..].is_executable(key)
    }
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("catalogs", &self.inner.catalogs)
            .field("options", &self.inner.options)
            .field("registry_built", &self.inner.registry.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TestSession`].
#[derive(Default)]
pub struct TestSessionBuilder {
    catalogs: Vec<DependencyCatalog>,
    options: SessionOptions,
    observers: Observers,
}

impl TestSessionBuilder {
    pub fn catalog(mut self, catalog: DependencyCatalog) -> Self {
        self.catalogs.push(catalog);
        self
    }

    pub fn catalogs(mut self, catalogs: impl IntoIterator<Item = DependencyCatalog>) -> Self {
        self.catalogs.extend(catalogs);
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn add_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> TestSession {
        TestSession {
            inner: Arc::new(SessionInner {
                catalogs: self.catalogs,
                options: self.options,
                observers: self.observers,
                registry: OnceCell::new(),
                scopes: OnceCell::new(),
                fixtures: RwLock::new(HashMap::new()),
            }),
        }
    }
}
