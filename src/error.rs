//! Error types for dependency resolution, eager execution and skipping.

use thiserror::Error;

/// Dependency injection errors.
///
/// Represents the hard failures that can occur while declaring dependencies,
/// resolving constructor or method arguments, or eagerly executing a
/// dependency. None of these are recovered locally: a test whose build hits
/// one of them is reported as failed, never as skipped.
///
/// An undeclared parameter type is *not* an error. Resolution reports it as
/// absent and the parameter is left out of the argument list.
///
/// # Examples
///
/// ```rust
/// use ferrous_fixtures::DiError;
///
/// let circular = DiError::Circular(vec!["Ping", "Pong", "Ping"]);
/// assert_eq!(circular.to_string(), "Circular dependency: Ping -> Pong -> Ping");
///
/// let duplicate = DiError::DuplicateDeclaration("tests::Ping");
/// assert_eq!(duplicate.to_string(), "Dependency declared more than once: tests::Ping");
/// ```
#[derive(Debug, Error)]
pub enum DiError {
    /// The same type was declared twice across the catalogs of a session
    #[error("Dependency declared more than once: {0}")]
    DuplicateDeclaration(&'static str),
    /// A required dependency was never declared
    #[error("Dependency not declared: {0}")]
    NotDeclared(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g., scoped from the registry root)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Resolution was attempted against a scope that has already been disposed
    #[error("Scope disposed: {0}")]
    ScopeDisposed(String),
    /// Eager execution of a dependency failed with something other than a skip
    #[error("Executing {type_name} failed: {source}")]
    Execution {
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// A fixture constructor returned an error
    #[error("Constructing fixture {fixture} failed: {source}")]
    Construction {
        fixture: String,
        #[source]
        source: anyhow::Error,
    },
    /// A fixture was requested by name but never registered with the session
    #[error("Fixture not registered: {0}")]
    UnknownFixture(String),
    /// Session options could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;

/// The skip signal.
///
/// Raised by a pipeline fixture whose happy path failed, or by any
/// [`Execute`](crate::Execute) implementation that wants the dependant test to
/// be ignored rather than failed. It is the only error kind recovered by the
/// eager-execution step.
///
/// `Skip` implements [`std::error::Error`], so it can travel through
/// `anyhow::Result` inside a happy path and be recognised again further up.
///
/// ```rust
/// use ferrous_fixtures::Skip;
///
/// let skip = Skip::new("upstream not ready");
/// let err: anyhow::Error = skip.clone().into();
/// assert_eq!(Skip::find(&err), Some(&skip));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Skip {
    reason: String,
}

impl Skip {
    /// Creates a skip signal carrying a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Skip raised on behalf of a dependency whose happy path failed.
    pub fn dependant_failed(cause: impl std::fmt::Display) -> Self {
        Self::new(format!("A dependant action failed: {cause}"))
    }

    /// The reason recorded for the skipped test.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Finds a skip signal anywhere in an error chain.
    pub fn find(err: &anyhow::Error) -> Option<&Skip> {
        err.chain().find_map(|cause| cause.downcast_ref::<Skip>())
    }
}

/// Failure of an [`Execute`](crate::Execute) call.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Recoverable: the dependant test becomes ignored
    #[error(transparent)]
    Skip(#[from] Skip),
    /// Anything else: the build step fails
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}
