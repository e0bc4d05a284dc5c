//! Resolver context handed to dependency factories.

use crate::error::DiResult;
use crate::key::TypeKey;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// Wraps whichever resolver triggered the construction: the registry root for
/// singletons, or the fixture or test scope for scoped and transient
/// dependencies. Scoped dependencies requested from inside a factory therefore
/// land in the same scope as the dependency being built.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserRepository { db: Arc<Database> }
///
/// let mut catalog = DependencyCatalog::new("repository_tests");
/// catalog.add_singleton(Database { url: "postgres://localhost".to_string() });
/// catalog.add_transient_factory::<UserRepository, _>(|resolver| {
///     UserRepository { db: resolver.get_required::<Database>() }
/// });
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore) -> Self {
        Self { resolver }
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_any(&self, key: &TypeKey) -> DiResult<Option<AnyArc>> {
        self.resolver.resolve_any(key)
    }

    fn push_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver.push_disposer(f);
    }
}
