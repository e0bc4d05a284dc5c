//! Pipeline fixtures: fixtures whose computed result feeds other fixtures.
//!
//! A pipeline wraps a user type implementing [`HappyPath`] (or
//! [`AsyncHappyPath`]). The first access to [`Pipeline::result`] runs the happy
//! path and caches its outcome. A failed happy path turns into a [`Skip`]
//! for every reader, so a consumer fixture that reads an upstream result inside
//! its own happy path fails with a skip too, and skips propagate down the chain.
//!
//! ```rust
//! use ferrous_fixtures::{HappyPath, Pipeline};
//!
//! struct Ping {
//!     param: &'static str,
//! }
//!
//! impl HappyPath for Ping {
//!     type Output = String;
//!
//!     fn test_happy_path(&self) -> anyhow::Result<String> {
//!         anyhow::ensure!(self.param == "ping", "expected ping, got {}", self.param);
//!         Ok(self.param.to_string())
//!     }
//! }
//!
//! let ping = Pipeline::new(Ping { param: "ping" });
//! assert_eq!(ping.result().unwrap(), "ping");
//!
//! let faulty = Pipeline::new(Ping { param: "notping" });
//! let skip = faulty.result().unwrap_err();
//! assert!(skip.reason().starts_with("A dependant action failed: "));
//! assert!(skip.reason().contains("expected ping, got notping"));
//! ```

use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};

use once_cell::sync::OnceCell;

use crate::error::{ExecuteError, Skip};
use crate::internal::panic_message;
use crate::traits::Execute;

#[cfg(feature = "async")]
use async_trait::async_trait;

/// The happy path of a synchronous pipeline fixture.
pub trait HappyPath: Send + Sync + 'static {
    /// Result handed to downstream fixtures.
    type Output: Send + Sync + 'static;

    /// Runs the happy path. Failing assertions may panic or return an error;
    /// both count as a failed happy path.
    fn test_happy_path(&self) -> anyhow::Result<Self::Output>;
}

/// The happy path of an asynchronous pipeline fixture.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncHappyPath: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    async fn test_happy_path(&self) -> anyhow::Result<Self::Output>;
}

/// Shared surface of synchronous and asynchronous pipeline fixtures.
pub trait DependencyFixture: Execute {
    type Output;

    /// The cached happy-path result, or the skip signal if it failed.
    fn result(&self) -> Result<&Self::Output, Skip>;

    /// The pipeline's own test: passes, fails, or skips when the failure came
    /// from upstream.
    fn happy_path(&self) -> anyhow::Result<()>;
}

/// A happy path that did not produce a value.
#[derive(Debug, Clone)]
struct Failure {
    /// Full error text, context chain included
    message: String,
    /// Present when the failure was itself a skip, raised here or upstream
    upstream: Option<Skip>,
}

impl Failure {
    fn from_error(err: anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
            upstream: Skip::find(&err).cloned(),
        }
    }

    fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self {
            message: panic_message(payload.as_ref()),
            upstream: None,
        }
    }

    fn skip(&self) -> Skip {
        Skip::dependant_failed(&self.message)
    }

    fn test_error(&self) -> anyhow::Error {
        match &self.upstream {
            Some(skip) => skip.clone().into(),
            None => anyhow::anyhow!("{}", self.message),
        }
    }
}

fn settle<T>(run: impl FnOnce() -> anyhow::Result<T>) -> Result<T, Failure> {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Failure::from_error(err)),
        Err(payload) => Err(Failure::from_panic(payload)),
    }
}

/// Synchronous pipeline fixture around a [`HappyPath`].
pub struct Pipeline<P: HappyPath> {
    inner: P,
    cache: OnceCell<Result<P::Output, Failure>>,
}

impl<P: HappyPath> Pipeline<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: OnceCell::new(),
        }
    }

    /// Runs the happy path on first access and returns the cached outcome.
    ///
    /// Concurrent first readers compute once; everyone sees the same result.
    pub fn result(&self) -> Result<&P::Output, Skip> {
        self.outcome().as_ref().map_err(Failure::skip)
    }

    /// Runs the happy path as this fixture's own test.
    pub fn happy_path(&self) -> anyhow::Result<()> {
        match self.outcome() {
            Ok(_) => Ok(()),
            Err(failure) => Err(failure.test_error()),
        }
    }

    /// Whether the happy path has already run.
    pub fn is_computed(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn outcome(&self) -> &Result<P::Output, Failure> {
        self.cache.get_or_init(|| {
            let outcome = settle(|| self.inner.test_happy_path());
            if let Err(failure) = &outcome {
                tracing::debug!(
                    pipeline = std::any::type_name::<P>(),
                    error = %failure.message,
                    "happy path failed"
                );
            }
            outcome
        })
    }
}

impl<P: HappyPath> Deref for Pipeline<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.inner
    }
}

impl<P: HappyPath> Execute for Pipeline<P> {
    fn execute(&self) -> Result<(), ExecuteError> {
        self.result().map(|_| ()).map_err(ExecuteError::Skip)
    }
}

impl<P: HappyPath> DependencyFixture for Pipeline<P> {
    type Output = P::Output;

    fn result(&self) -> Result<&P::Output, Skip> {
        Pipeline::result(self)
    }

    fn happy_path(&self) -> anyhow::Result<()> {
        Pipeline::happy_path(self)
    }
}

/// Asynchronous pipeline fixture around an [`AsyncHappyPath`].
///
/// Accessors block the calling thread until the happy path completes. Inside a
/// multi-threaded tokio runtime this uses `block_in_place`; inside a
/// current-thread runtime the future runs on a helper thread with its own
/// runtime; outside any runtime a temporary one is created.
#[cfg(feature = "async")]
pub struct AsyncPipeline<P: AsyncHappyPath> {
    inner: P,
    cache: OnceCell<Result<P::Output, Failure>>,
}

#[cfg(feature = "async")]
impl<P: AsyncHappyPath> AsyncPipeline<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: OnceCell::new(),
        }
    }

    /// Blocks until the happy path has run once and returns its outcome.
    pub fn result(&self) -> Result<&P::Output, Skip> {
        self.outcome().as_ref().map_err(Failure::skip)
    }

    pub fn happy_path(&self) -> anyhow::Result<()> {
        match self.outcome() {
            Ok(_) => Ok(()),
            Err(failure) => Err(failure.test_error()),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.cache.get().is_some()
    }

    fn outcome(&self) -> &Result<P::Output, Failure> {
        self.cache.get_or_init(|| {
            let outcome = settle(|| runtime::block_on(self.inner.test_happy_path()).and_then(|r| r));
            if let Err(failure) = &outcome {
                tracing::debug!(
                    pipeline = std::any::type_name::<P>(),
                    error = %failure.message,
                    "async happy path failed"
                );
            }
            outcome
        })
    }
}

#[cfg(feature = "async")]
impl<P: AsyncHappyPath> Deref for AsyncPipeline<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.inner
    }
}

#[cfg(feature = "async")]
impl<P: AsyncHappyPath> Execute for AsyncPipeline<P> {
    fn execute(&self) -> Result<(), ExecuteError> {
        self.result().map(|_| ()).map_err(ExecuteError::Skip)
    }
}

#[cfg(feature = "async")]
impl<P: AsyncHappyPath> DependencyFixture for AsyncPipeline<P> {
    type Output = P::Output;

    fn result(&self) -> Result<&P::Output, Skip> {
        AsyncPipeline::result(self)
    }

    fn happy_path(&self) -> anyhow::Result<()> {
        AsyncPipeline::happy_path(self)
    }
}

#[cfg(feature = "async")]
mod runtime {
    use std::future::Future;
    use std::panic::resume_unwind;

    use tokio::runtime::{Builder, Handle, RuntimeFlavor};

    /// Drives `future` to completion from synchronous code.
    pub(super) fn block_on<F>(future: F) -> anyhow::Result<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                // The only worker is blocked on us; run on a helper thread.
                std::thread::scope(|s| {
                    match s.spawn(|| standalone(future)).join() {
                        Ok(result) => result,
                        Err(payload) => resume_unwind(payload),
                    }
                })
            }
            Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
            Err(_) => standalone(future),
        }
    }

    fn standalone<F: Future>(future: F) -> anyhow::Result<F::Output> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(runtime.block_on(future))
    }
}
