//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for dependencies that need structured teardown (flushing a
/// temp directory, closing a connection). Factories register the instance with
/// [`Resolver::register_disposer`](crate::Resolver::register_disposer); the hook
/// runs when the owning fixture or test scope is disposed, in LIFO order.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{Dispose, DependencyCatalog, Resolver};
/// use std::sync::Arc;
///
/// struct TempDir {
///     path: String,
/// }
///
/// impl Dispose for TempDir {
///     fn dispose(&self) {
///         println!("removing {}", self.path);
///     }
/// }
///
/// let mut catalog = DependencyCatalog::new("io_tests");
/// catalog.add_scoped_factory::<TempDir, _>(|resolver| {
///     let dir = Arc::new(TempDir { path: "/tmp/fixture".to_string() });
///     resolver.register_disposer(dir.clone());
///     TempDir { path: "/tmp/fixture".to_string() }
/// });
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
