//! Observers for session events.
//!
//! Observers see scope creation and disposal, eager executions, decided build
//! outcomes and ignored lifecycle events. Register them with
//! [`TestSessionBuilder::add_observer`](crate::TestSessionBuilder::add_observer).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::builder::TestOutcome;
use crate::key::TypeKey;

/// The level of a scope in the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Fixture,
    Test,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScopeKind::Fixture => "fixture",
            ScopeKind::Test => "test",
        })
    }
}

/// Observer trait for session events.
///
/// All methods have empty defaults; implement the ones you care about.
/// Callbacks run synchronously on the thread that triggered the event, so
/// keep them cheap.
///
/// # Examples
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, ScopeKind, SessionObserver, TestSession};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Recorder {
///     created: Mutex<Vec<String>>,
/// }
///
/// impl SessionObserver for Recorder {
///     fn scope_created(&self, kind: ScopeKind, key: &str) {
///         self.created.lock().unwrap().push(format!("{kind}:{key}"));
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let session = TestSession::builder()
///     .catalog(DependencyCatalog::new("observed"))
///     .add_observer(recorder.clone())
///     .build();
///
/// session.scopes().unwrap().fixture("tests::Observed", "tests::Observed");
/// assert_eq!(*recorder.created.lock().unwrap(), vec!["fixture:tests::Observed"]);
/// ```
pub trait SessionObserver: Send + Sync {
    /// A fixture or test scope was created.
    fn scope_created(&self, _kind: ScopeKind, _key: &str) {}

    /// A fixture or test scope was disposed.
    fn scope_disposed(&self, _kind: ScopeKind, _key: &str) {}

    /// A dependency was executed eagerly on behalf of `subject`.
    fn dependency_executed(&self, _subject: &str, _dependency: &TypeKey, _skipped: Option<&str>) {}

    /// The build outcome of a fixture or test was decided.
    fn outcome_decided(&self, _subject: &str, _outcome: &TestOutcome) {}

    /// A lifecycle event named a class or method the session does not know.
    fn event_ignored(&self, _class_name: &str, _reason: &str) {}
}

/// Collection of observers for fan-out notification.
///
/// Designed to cost nothing beyond an empty loop when no observers are
/// registered.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn scope_created(&self, kind: ScopeKind, key: &str) {
        for observer in &self.observers {
            observer.scope_created(kind, key);
        }
    }

    #[inline]
    pub(crate) fn scope_disposed(&self, kind: ScopeKind, key: &str) {
        for observer in &self.observers {
            observer.scope_disposed(kind, key);
        }
    }

    #[inline]
    pub(crate) fn dependency_executed(&self, subject: &str, dependency: &TypeKey, skipped: Option<&str>) {
        for observer in &self.observers {
            observer.dependency_executed(subject, dependency, skipped);
        }
    }

    #[inline]
    pub(crate) fn outcome_decided(&self, subject: &str, outcome: &TestOutcome) {
        for observer in &self.observers {
            observer.outcome_decided(subject, outcome);
        }
    }

    #[inline]
    pub(crate) fn event_ignored(&self, class_name: &str, reason: &str) {
        for observer in &self.observers {
            observer.event_ignored(class_name, reason);
        }
    }
}

/// Observer forwarding every event to `tracing`.
///
/// Scope events are logged at debug level, outcomes at info (warn for
/// ignored or not-runnable builds), ignored lifecycle events at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl SessionObserver for TracingObserver {
    fn scope_created(&self, kind: ScopeKind, key: &str) {
        tracing::debug!(%kind, key, "scope created");
    }

    fn scope_disposed(&self, kind: ScopeKind, key: &str) {
        tracing::debug!(%kind, key, "scope disposed");
    }

    fn dependency_executed(&self, subject: &str, dependency: &TypeKey, skipped: Option<&str>) {
        match skipped {
            Some(reason) => tracing::warn!(subject, dependency = dependency.name(), reason, "dependency skipped"),
            None => tracing::debug!(subject, dependency = dependency.name(), "dependency executed"),
        }
    }

    fn outcome_decided(&self, subject: &str, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Runnable => tracing::info!(subject, "runnable"),
            TestOutcome::Ignored(reason) => tracing::warn!(subject, reason = reason.as_str(), "ignored"),
            TestOutcome::NotRunnable(reason) => tracing::warn!(subject, reason = reason.as_str(), "not runnable"),
        }
    }

    fn event_ignored(&self, class_name: &str, reason: &str) {
        tracing::debug!(class_name, reason, "lifecycle event ignored");
    }
}

/// Observer counting session events.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    scopes_created: AtomicU64,
    scopes_disposed: AtomicU64,
    executions: AtomicU64,
    skips: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes_created(&self) -> u64 {
        self.scopes_created.load(Ordering::Relaxed)
    }

    pub fn scopes_disposed(&self) -> u64 {
        self.scopes_disposed.load(Ordering::Relaxed)
    }

    /// Eager executions observed, skipped ones included.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn skips(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }
}

impl SessionObserver for MetricsObserver {
    fn scope_created(&self, _kind: ScopeKind, _key: &str) {
        self.scopes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn scope_disposed(&self, _kind: ScopeKind, _key: &str) {
        self.scopes_disposed.fetch_add(1, Ordering::Relaxed);
    }

    fn dependency_executed(&self, _subject: &str, _dependency: &TypeKey, skipped: Option<&str>) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if skipped.is_some() {
            self.skips.fetch_add(1, Ordering::Relaxed);
        }
    }
}
