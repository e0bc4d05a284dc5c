//! Dependency lifetime definitions.

/// Dependency lifetimes controlling instance caching behavior.
///
/// A lifetime decides how often a declared dependency is constructed and which
/// fixtures and tests get to share the instance.
///
/// # Lifetime Characteristics
///
/// - **Singleton**: one instance for the whole test session
/// - **Scoped**: one instance per fixture scope, and a separate one per test scope
/// - **Transient**: a fresh instance every time a parameter asks for it
///
/// # Examples
///
/// ```rust
/// use ferrous_fixtures::{DependencyCatalog, Lifetime};
///
/// struct Database { url: String }
/// struct Repository;
/// struct RequestModel { id: u32 }
///
/// let mut catalog = DependencyCatalog::new("storage_tests");
/// catalog.add_singleton(Database { url: "postgres://localhost".to_string() });
/// catalog.declare::<Repository, _>(Lifetime::default(), |_| Repository);
/// catalog.add_transient_factory::<RequestModel, _>(|_| RequestModel { id: 7 });
///
/// assert_eq!(Lifetime::default(), Lifetime::Scoped);
/// assert_eq!(catalog.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Single instance per session, cached forever.
    ///
    /// Singletons are created the first time any scope asks for them and are
    /// shared by every fixture and test afterwards.
    Singleton,
    /// Single instance per scope.
    ///
    /// All constructor parameters of one fixture share the instance. Each test
    /// method gets its own scope, so it sees a different instance than the
    /// fixture constructor did.
    #[default]
    Scoped,
    /// New instance per resolution, never cached.
    Transient,
}

impl Lifetime {
    /// Short lowercase label used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
