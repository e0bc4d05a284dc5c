//! Dependency descriptors for introspection and diagnostics.

use crate::key::TypeKey;
use crate::lifetime::Lifetime;

/// Dependency descriptor for introspection and diagnostics.
///
/// Describes one declaration of a [`DependencyCatalog`](crate::DependencyCatalog):
/// which type, with what lifetime, and whether it can be executed eagerly.
/// Useful for checking a catalog before a session starts.
///
/// # Examples
///
/// ```rust
/// use ferrous_fixtures::{DependencyCatalog, Lifetime};
///
/// struct Database;
/// struct Repository;
///
/// let mut catalog = DependencyCatalog::new("storage");
/// catalog.add_singleton(Database);
/// catalog.add_scoped_factory::<Repository, _>(|_| Repository);
///
/// let descriptors = catalog.descriptors();
/// let repository = descriptors
///     .iter()
///     .find(|d| d.type_name().ends_with("Repository"))
///     .unwrap();
/// assert_eq!(repository.lifetime, Lifetime::Scoped);
/// assert!(!repository.executable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    /// The declared type
    pub key: TypeKey,
    /// Declared lifetime
    pub lifetime: Lifetime,
    /// Whether the declaration carries the executable capability
    pub executable: bool,
    /// Name of the catalog holding the declaration
    pub catalog: String,
}

impl DependencyDescriptor {
    /// Full name of the declared type.
    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }
}

impl std::fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}", self.key, self.lifetime)?;
        if self.executable {
            f.write_str(", executable")?;
        }
        write!(f, ") in {}", self.catalog)
    }
}
