//! The two-level tree of fixture and test scopes.
//!
//! One [`FixtureScope`] exists per fixture construction signature, and one
//! [`TestScope`] per test-method signature beneath it. Both levels are created
//! lazily by an atomic get-or-insert, so concurrent requests for the same key
//! always share one scope. Disposing a scope removes it from the tree; the next
//! request for its key creates a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::observer::{Observers, ScopeKind};
use crate::provider::{DependencyRegistry, LifetimeScope};
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Get-or-insert over a shared map, replacing entries that were disposed.
fn get_or_insert<V>(
    map: &RwLock<HashMap<String, Arc<V>>>,
    key: &str,
    is_live: impl Fn(&V) -> bool,
    create: impl FnOnce() -> V,
) -> (Arc<V>, bool) {
    if let Some(existing) = map.read().get(key) {
        if is_live(existing) {
            return (existing.clone(), false);
        }
    }

    let mut map = map.write();
    // Re-check: another thread may have inserted while we waited for the lock.
    if let Some(existing) = map.get(key) {
        if is_live(existing) {
            return (existing.clone(), false);
        }
    }
    let created = Arc::new(create());
    map.insert(key.to_string(), created.clone());
    (created, true)
}

/// Per-session tree of fixture scopes.
pub struct ScopeTree {
    registry: DependencyRegistry,
    fixtures: RwLock<HashMap<String, Arc<FixtureScope>>>,
    observers: Observers,
}

impl ScopeTree {
    pub(crate) fn new(registry: DependencyRegistry, observers: Observers) -> Self {
        Self {
            registry,
            fixtures: RwLock::new(HashMap::new()),
            observers,
        }
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    /// The fixture scope for `signature`, created on first request.
    ///
    /// `class_name` is the fixture's full name; it is what suite-finished
    /// events refer to.
    pub fn fixture(&self, class_name: &str, signature: &str) -> Arc<FixtureScope> {
        let (scope, created) = get_or_insert(
            &self.fixtures,
            signature,
            |scope| !scope.is_disposed(),
            || FixtureScope {
                class_name: class_name.to_string(),
                scope: self.registry.create_scope(signature),
                tests: RwLock::new(HashMap::new()),
                observers: self.observers.clone(),
            },
        );
        if created {
            self.observers.scope_created(ScopeKind::Fixture, signature);
        }
        scope
    }

    /// The live fixture scope for `signature`, without creating one.
    pub fn get_fixture(&self, signature: &str) -> Option<Arc<FixtureScope>> {
        self.fixtures
            .read()
            .get(signature)
            .filter(|scope| !scope.is_disposed())
            .cloned()
    }

    /// Every live fixture scope created for the fixture class `class_name`.
    pub fn fixtures_of(&self, class_name: &str) -> Vec<Arc<FixtureScope>> {
        self.fixtures
            .read()
            .values()
            .filter(|scope| scope.class_name == class_name && !scope.is_disposed())
            .cloned()
            .collect()
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.fixtures.read().values().any(|scope| scope.class_name == class_name)
    }

    /// Disposes and removes one fixture scope. No-op when absent.
    pub fn dispose_fixture(&self, signature: &str) -> bool {
        let removed = self.fixtures.write().remove(signature);
        match removed {
            Some(scope) => {
                scope.dispose();
                true
            }
            None => false,
        }
    }

    /// Disposes and removes every fixture scope of `class_name`.
    pub fn dispose_class(&self, class_name: &str) -> usize {
        let removed: Vec<Arc<FixtureScope>> = {
            let mut fixtures = self.fixtures.write();
            let keys: Vec<String> = fixtures
                .iter()
                .filter(|(_, scope)| scope.class_name == class_name)
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| fixtures.remove(key)).collect()
        };
        for scope in &removed {
            scope.dispose();
        }
        removed.len()
    }

    /// Disposes every scope in the tree.
    pub fn dispose_all(&self) -> usize {
        let removed: Vec<Arc<FixtureScope>> = self.fixtures.write().drain().map(|(_, scope)| scope).collect();
        for scope in &removed {
            scope.dispose();
        }
        removed.len()
    }

    /// Number of fixture scopes currently in the tree.
    pub fn len(&self) -> usize {
        self.fixtures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifetime scope of one fixture construction signature.
///
/// Scoped dependencies resolved here are shared by all constructor parameters
/// of the fixture. Each test method gets its own [`TestScope`] below it.
pub struct FixtureScope {
    class_name: String,
    scope: LifetimeScope,
    tests: RwLock<HashMap<String, Arc<TestScope>>>,
    observers: Observers,
}

impl FixtureScope {
    /// Scope key: the fixture's construction signature.
    pub fn key(&self) -> &str {
        self.scope.label()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The test scope for `signature`, created on first request.
    ///
    /// `method_path` is the method's qualified name without parameters; it
    /// lets case-finished events without parameter types find every overload.
    ///
    /// Fails with [`DiError::ScopeDisposed`] once this fixture scope has been
    /// disposed, so no test scope outlives its parent.
    pub fn test(&self, method_path: &str, signature: &str) -> DiResult<Arc<TestScope>> {
        if self.is_disposed() {
            return Err(DiError::ScopeDisposed(self.key().to_string()));
        }
        if let Some(existing) = self.tests.read().get(signature) {
            if !existing.is_disposed() {
                return Ok(existing.clone());
            }
        }

        let mut tests = self.tests.write();
        // `dispose` marks the scope before draining under this lock, so a
        // child inserted past this check is always drained with the rest.
        if self.is_disposed() {
            return Err(DiError::ScopeDisposed(self.key().to_string()));
        }
        if let Some(existing) = tests.get(signature) {
            if !existing.is_disposed() {
                return Ok(existing.clone());
            }
        }
        let created = Arc::new(TestScope {
            method_path: method_path.to_string(),
            scope: self.scope.create_child(signature),
            observers: self.observers.clone(),
        });
        tests.insert(signature.to_string(), created.clone());
        drop(tests);

        self.observers.scope_created(ScopeKind::Test, signature);
        Ok(created)
    }

    pub fn get_test(&self, signature: &str) -> Option<Arc<TestScope>> {
        self.tests
            .read()
            .get(signature)
            .filter(|scope| !scope.is_disposed())
            .cloned()
    }

    /// Signatures of the test scopes currently held.
    pub fn test_keys(&self) -> Vec<String> {
        self.tests.read().keys().cloned().collect()
    }

    /// Disposes exactly one test scope. No-op when `signature` is absent.
    pub fn dispose_test(&self, signature: &str) -> bool {
        let removed = self.tests.write().remove(signature);
        match removed {
            Some(test) => {
                test.dispose();
                true
            }
            None => false,
        }
    }

    /// Disposes every overload of the method at `method_path`.
    pub fn dispose_tests_named(&self, method_path: &str) -> usize {
        let removed: Vec<Arc<TestScope>> = {
            let mut tests = self.tests.write();
            let keys: Vec<String> = tests
                .iter()
                .filter(|(_, test)| test.method_path == method_path)
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| tests.remove(key)).collect()
        };
        for test in &removed {
            test.dispose();
        }
        removed.len()
    }

    /// Disposes this scope, then every child test scope whether or not its
    /// completion was reported.
    pub fn dispose(&self) {
        if self.scope.is_disposed() {
            return;
        }
        let hooks = self.scope.dispose();
        self.observers.scope_disposed(ScopeKind::Fixture, self.key());

        let children: Vec<Arc<TestScope>> = self.tests.write().drain().map(|(_, test)| test).collect();
        tracing::debug!(
            fixture = self.key(),
            hooks,
            tests = children.len(),
            "disposing fixture scope"
        );
        for test in children {
            test.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }

    pub fn lifetime_scope(&self) -> &LifetimeScope {
        &self.scope
    }
}

impl ResolverCore for FixtureScope {
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        self.scope.resolve_any(key)
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.scope.push_disposer(f);
    }
}

/// Lifetime scope of one test method, nested under a [`FixtureScope`].
///
/// Scoped dependencies resolved here are distinct from the fixture's and from
/// every other method's, overloads included.
pub struct TestScope {
    method_path: String,
    scope: LifetimeScope,
    observers: Observers,
}

impl TestScope {
    /// Scope key: the method's full signature.
    pub fn key(&self) -> &str {
        self.scope.label()
    }

    pub fn method_path(&self) -> &str {
        &self.method_path
    }

    pub fn dispose(&self) {
        if self.scope.is_disposed() {
            return;
        }
        self.scope.dispose();
        self.observers.scope_disposed(ScopeKind::Test, self.key());
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }

    pub fn lifetime_scope(&self) -> &LifetimeScope {
        &self.scope
    }
}

impl ResolverCore for TestScope {
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        self.scope.resolve_any(key)
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.scope.push_disposer(f);
    }
}
