//! Declarative eager-execution configuration for fixtures and test methods.

use crate::key::TypeKey;

/// Lookup of the executable capability, used to validate configurations.
///
/// Implemented by catalogs, catalog slices and the test session.
pub trait ExecutableTypes {
    /// Whether `key` was declared together with its [`Execute`](crate::Execute) capability.
    fn is_executable(&self, key: &TypeKey) -> bool;
}

/// Which dependencies a fixture or test method executes eagerly during setup.
///
/// A configuration has four parts:
///
/// - an "execute everything injected" flag: every resolved argument with the
///   executable capability runs before the test,
/// - an explicit list of dependency types to execute, resolved from the scope
///   even when they are not parameters,
/// - an inheritance flag (on by default) deciding whether derived
///   declarations pick up this configuration's type list,
/// - a validation error, set when the configuration is built if a listed
///   type lacks the executable capability.
///
/// A malformed configuration is never an error at construction time. The
/// message is kept and the dependant test becomes not runnable instead.
///
/// ```rust
/// use ferrous_fixtures::{DependantConfig, DependencyCatalog, Execute, ExecuteError, Lifetime};
///
/// struct Warmup;
/// impl Execute for Warmup {
///     fn execute(&self) -> Result<(), ExecuteError> { Ok(()) }
/// }
/// struct Plain;
///
/// let mut catalog = DependencyCatalog::new("warmup");
/// catalog.declare_executable::<Warmup, _>(Lifetime::Scoped, |_| Warmup);
/// catalog.add_singleton(Plain);
///
/// let valid = DependantConfig::builder().execute::<Warmup>().build(&catalog);
/// assert!(valid.is_valid());
///
/// let invalid = DependantConfig::builder().execute::<Plain>().build(&catalog);
/// assert!(invalid.validation_error().unwrap().contains("Plain"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependantConfig {
    execute_injected: bool,
    execute_types: Vec<TypeKey>,
    inherit: bool,
    validation_error: Option<String>,
}

impl Default for DependantConfig {
    fn default() -> Self {
        Self {
            execute_injected: false,
            execute_types: Vec::new(),
            inherit: true,
            validation_error: None,
        }
    }
}

impl DependantConfig {
    /// Plain dependency injection, nothing executed eagerly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes every injected argument that has the executable capability.
    pub fn execute_injected() -> Self {
        Self {
            execute_injected: true,
            ..Self::default()
        }
    }

    pub fn builder() -> DependantConfigBuilder {
        DependantConfigBuilder::default()
    }

    pub fn executes_injected(&self) -> bool {
        self.execute_injected
    }

    /// Types executed eagerly, in declaration order, without duplicates.
    pub fn execute_types(&self) -> &[TypeKey] {
        &self.execute_types
    }

    pub fn inherits(&self) -> bool {
        self.inherit
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.validation_error.is_none()
    }

    /// Merges the configuration of ancestor declarations into this one.
    ///
    /// Ancestors are given nearest first. Only ancestors whose inheritance flag
    /// is set contribute: their eager-execution types are appended after this
    /// configuration's own, skipping duplicates, and their validation errors
    /// carry over. The "execute everything injected" flag is never inherited.
    pub fn merged_with<'a, I>(&self, ancestors: I) -> DependantConfig
    where
        I: IntoIterator<Item = &'a DependantConfig>,
    {
        let mut merged = self.clone();
        let mut errors: Vec<&str> = self.validation_error.iter().map(String::as_str).collect();

        for ancestor in ancestors.into_iter().filter(|a| a.inherit) {
            for key in &ancestor.execute_types {
                if !merged.execute_types.contains(key) {
                    merged.execute_types.push(*key);
                }
            }
            if let Some(error) = ancestor.validation_error.as_deref() {
                if !errors.contains(&error) {
                    errors.push(error);
                }
            }
        }

        merged.validation_error = (!errors.is_empty()).then(|| errors.join("; "));
        merged
    }
}

/// Builder for [`DependantConfig`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct DependantConfigBuilder {
    execute_injected: bool,
    execute_types: Vec<TypeKey>,
    inherit: bool,
}

impl Default for DependantConfigBuilder {
    fn default() -> Self {
        Self {
            execute_injected: false,
            execute_types: Vec::new(),
            inherit: true,
        }
    }
}

impl DependantConfigBuilder {
    pub fn execute_injected(mut self, enabled: bool) -> Self {
        self.execute_injected = enabled;
        self
    }

    /// Adds `T` to the eager-execution list.
    pub fn execute<T: ?Sized + 'static>(self) -> Self {
        self.execute_key(TypeKey::of::<T>())
    }

    pub fn execute_key(mut self, key: TypeKey) -> Self {
        if !self.execute_types.contains(&key) {
            self.execute_types.push(key);
        }
        self
    }

    /// Whether derived declarations inherit the type list. Defaults to `true`.
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Builds the configuration, recording a validation error for every
    /// listed type without the executable capability.
    pub fn build<E: ExecutableTypes + ?Sized>(self, executables: &E) -> DependantConfig {
        let invalid: Vec<&str> = self
            .execute_types
            .iter()
            .filter(|key| !executables.is_executable(key))
            .map(TypeKey::name)
            .collect();

        let validation_error = (!invalid.is_empty()).then(|| {
            format!(
                "Types listed for eager execution are not declared executable: {}",
                invalid.join(", ")
            )
        });

        DependantConfig {
            execute_injected: self.execute_injected,
            execute_types: self.execute_types,
            inherit: self.inherit,
            validation_error,
        }
    }
}
