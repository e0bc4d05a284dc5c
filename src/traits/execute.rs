//! The executable capability.

use crate::error::ExecuteError;

/// A dependency that can be executed eagerly during fixture or test setup.
///
/// Only types declared with
/// [`DependencyCatalog::declare_executable`](crate::DependencyCatalog::declare_executable)
/// (or registered as pipelines) carry this capability in the registry. Listing
/// any other type for eager execution makes the dependant test not runnable.
///
/// Returning [`ExecuteError::Skip`] ignores the dependant test with the skip
/// reason; [`ExecuteError::Failure`] fails the build instead.
///
/// ```
/// use ferrous_fixtures::{Execute, ExecuteError, Skip};
///
/// struct ServerReady {
///     up: bool,
/// }
///
/// impl Execute for ServerReady {
///     fn execute(&self) -> Result<(), ExecuteError> {
///         if self.up {
///             Ok(())
///         } else {
///             Err(Skip::new("server is down").into())
///         }
///     }
/// }
///
/// assert!(ServerReady { up: true }.execute().is_ok());
/// assert!(matches!(ServerReady { up: false }.execute(), Err(ExecuteError::Skip(_))));
/// ```
pub trait Execute: Send + Sync + 'static {
    fn execute(&self) -> Result<(), ExecuteError>;
}
