//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

// Thread-local resolution state for circular dependency detection
thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<&'static str>,
}

/// Guard for managing the thread-local resolution stack.
///
/// Entering pushes the type name being resolved; dropping pops it again, also
/// while unwinding out of a panicking factory.
pub(crate) struct StackGuard {
    name: &'static str,
}

impl StackGuard {
    /// Pushes `name`, failing if it is already being resolved on this thread.
    pub(crate) fn enter(name: &'static str, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection BEFORE pushing the new name
            if tls.stack.iter().any(|&n| n == name) {
                let mut path = tls.stack.clone();
                path.push(name);
                return Err(DiError::Circular(path));
            }

            if tls.stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push(name);
            Ok(())
        })?;

        Ok(Self { name })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(last) = tls.stack.pop() {
                debug_assert_eq!(last, self.name);
            }
        });
    }
}

/// Execute a closure with circular dependency detection
pub(crate) fn with_circular_catch<T, F>(name: &'static str, max_depth: usize, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let _guard = StackGuard::enter(name, max_depth)?;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentering_the_same_name_reports_the_path() {
        let result = with_circular_catch("Ping", 16, || {
            with_circular_catch("Pong", 16, || with_circular_catch("Ping", 16, || Ok(())))
        });
        match result {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["Ping", "Pong", "Ping"]),
            other => panic!("expected circular error, got {other:?}"),
        }
    }

    #[test]
    fn stack_is_clean_after_an_error() {
        let _ = with_circular_catch("A", 16, || with_circular_catch("A", 16, || Ok(())));
        assert!(with_circular_catch("A", 16, || Ok(())).is_ok());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let result = with_circular_catch("A", 1, || with_circular_catch("B", 1, || Ok(())));
        assert!(matches!(result, Err(DiError::DepthExceeded(1))));
    }
}
