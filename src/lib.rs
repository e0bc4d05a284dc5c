//! # ferrous-fixtures
//!
//! Dependency injection for test fixtures, with scopes that follow the
//! fixture and test lifecycle.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient dependencies
//! - **Two-level scopes**: one scope per fixture constructor, one per test method
//! - **Eager execution**: run dependencies during setup and turn their skip
//!   signal into an ignored test instead of a failure
//! - **Pipeline fixtures**: chain fixtures where each consumes the result of
//!   the previous one, with skips propagating down the chain
//! - **Lifecycle bridge**: dispose scopes as the host reports completion
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_fixtures::{
//!     type_keys, DependencyCatalog, FixtureDefinition, HappyPath, Pipeline, Resolver, TestResult,
//!     TestSession,
//! };
//! use std::sync::Arc;
//!
//! struct Ping;
//!
//! impl HappyPath for Ping {
//!     type Output = String;
//!
//!     fn test_happy_path(&self) -> anyhow::Result<String> {
//!         Ok("ping".to_string())
//!     }
//! }
//!
//! struct Pong {
//!     ping: Arc<Pipeline<Ping>>,
//! }
//!
//! impl HappyPath for Pong {
//!     type Output = String;
//!
//!     fn test_happy_path(&self) -> anyhow::Result<String> {
//!         let result = format!("{}pong", self.ping.result()?);
//!         anyhow::ensure!(result == "pingpong", "unexpected {result}");
//!         Ok(result)
//!     }
//! }
//!
//! // Declare the injectable types
//! let mut catalog = DependencyCatalog::new("ping_pong");
//! catalog.add_pipeline(|_| Ping);
//! catalog.add_pipeline(|r| Pong { ping: r.get_required::<Pipeline<Ping>>() });
//!
//! // Describe the fixtures the host would discover
//! let session = TestSession::new(catalog);
//! session.register_fixture(FixtureDefinition::pipeline::<Ping, _>(vec![], |_| Ok(Ping)));
//! session.register_fixture(FixtureDefinition::pipeline::<Pong, _>(
//!     type_keys![Pipeline<Ping>],
//!     |args| Ok(Pong { ping: args.require()? }),
//! ));
//!
//! let reports = session.runner().run(std::any::type_name::<Pong>()).unwrap();
//! assert_eq!(reports[0].result_of("happy_path"), Some(&TestResult::Passed));
//! ```
//!
//! ## Dependency Lifetimes
//!
//! - **Singleton**: created once and shared by the whole session
//! - **Scoped**: created once per fixture scope and once per test scope
//! - **Transient**: created fresh on every resolution

// Module declarations
pub mod builder;
pub mod collection;
pub mod config;
pub mod definition;
pub mod dependant;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod pipeline;
pub mod provider;
pub mod runner;
pub mod scope_tree;
pub mod session;
pub mod traits;

// Internal modules
mod eager;
mod internal;
mod registration;

// Re-export core types
pub use builder::{BuiltFixture, BuiltTest, InjectionBuilder, TestOutcome, SKIP_REASON};
pub use collection::DependencyCatalog;
pub use config::{ConfigSource, EnvironmentConfigSource, MapConfigSource, SessionOptions, ENV_PREFIX};
pub use definition::{Argument, Arguments, ConstructorDefinition, FixtureDefinition, FixtureInstance, TestMethodDefinition};
pub use dependant::{DependantConfig, DependantConfigBuilder, ExecutableTypes};
pub use descriptors::DependencyDescriptor;
pub use error::{DiError, DiResult, ExecuteError, Skip};
pub use key::{key_of_type, member_signature, method_path, signature_of, TypeKey};
pub use lifecycle::{LifecycleBridge, LifecycleEvent, TestEventListener};
pub use lifetime::Lifetime;
pub use observer::{MetricsObserver, ScopeKind, SessionObserver, TracingObserver};
pub use pipeline::{DependencyFixture, HappyPath, Pipeline};
pub use provider::{DependencyRegistry, LifetimeScope, ResolverContext};
pub use runner::{CaseReport, SuiteReport, TestResult, TestRunner};
pub use scope_tree::{FixtureScope, ScopeTree, TestScope};
pub use session::{TestSession, TestSessionBuilder};
pub use traits::{Dispose, Execute, Resolver, ResolverCore};

#[cfg(feature = "async")]
pub use pipeline::{AsyncHappyPath, AsyncPipeline};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(#[allow(dead_code)] usize);

    #[test]
    fn test_singleton_resolution() {
        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_singleton(42usize);

        let session = TestSession::new(catalog);
        let scopes = session.scopes().unwrap();
        let a = scopes.fixture("a", "a").get_required::<usize>();
        let b = scopes.fixture("b", "b").get_required::<usize>();

        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_circular_dependency_is_reported() {
        struct Left(#[allow(dead_code)] Arc<Right>);
        struct Right(#[allow(dead_code)] Arc<Left>);

        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_scoped_factory::<Left, _>(|r| Left(r.get_required::<Right>()));
        catalog.add_scoped_factory::<Right, _>(|r| Right(r.get_required::<Left>()));

        let session = TestSession::new(catalog);
        let scope = session.scopes().unwrap().fixture("cycle", "cycle");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scope.get_required::<Left>()));
        let payload = result.err().unwrap();
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("Circular dependency"), "{message}");
    }

    #[test]
    fn test_registry_is_built_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut catalog = DependencyCatalog::new("unit");
        catalog.add_singleton_factory::<Counter, _>(move |_| Counter(counter.fetch_add(1, Ordering::SeqCst)));

        let session = TestSession::new(catalog);
        let first = session.registry().unwrap() as *const DependencyRegistry;
        let second = session.registry().unwrap() as *const DependencyRegistry;
        assert_eq!(first, second);
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_try_get_required_reports_undeclared_types() {
        let session = TestSession::new(DependencyCatalog::new("unit"));
        let scope = session.scopes().unwrap().fixture("a", "a");
        assert!(matches!(scope.try_get_required::<Counter>(), Err(DiError::NotDeclared(_))));
    }
}
