//! Tearing down scopes as the host reports fixture and test completion.

use crate::key::{member_signature, method_path, TypeKey};
use crate::session::TestSession;

/// A completion notification from the test host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Every test of a fixture class has finished.
    SuiteFinished { class_name: String },
    /// One test case has finished.
    ///
    /// Without `parameter_types` the event covers every overload of
    /// `method_name`.
    CaseFinished {
        class_name: String,
        method_name: String,
        parameter_types: Option<Vec<String>>,
    },
}

impl LifecycleEvent {
    pub fn suite_finished(class_name: impl Into<String>) -> Self {
        LifecycleEvent::SuiteFinished {
            class_name: class_name.into(),
        }
    }

    /// Case-finished event matching every overload of the method.
    pub fn case_finished(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        LifecycleEvent::CaseFinished {
            class_name: class_name.into(),
            method_name: method_name.into(),
            parameter_types: None,
        }
    }

    /// Case-finished event for one exact overload.
    pub fn case_finished_with(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        parameter_types: &[TypeKey],
    ) -> Self {
        LifecycleEvent::CaseFinished {
            class_name: class_name.into(),
            method_name: method_name.into(),
            parameter_types: Some(parameter_types.iter().map(|k| k.name().to_string()).collect()),
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            LifecycleEvent::SuiteFinished { class_name } | LifecycleEvent::CaseFinished { class_name, .. } => {
                class_name
            }
        }
    }
}

/// Receiver of host lifecycle events.
pub trait TestEventListener: Send + Sync {
    fn on_test_event(&self, event: &LifecycleEvent);
}

/// Disposes fixture and test scopes in response to [`LifecycleEvent`]s.
///
/// Events may arrive in any order and from any thread. Events naming a class
/// the session does not know, or a scope that no longer exists, are ignored.
///
/// ```
/// use ferrous_fixtures::{DependencyCatalog, LifecycleEvent, TestSession};
///
/// let session = TestSession::new(DependencyCatalog::new("bridge"));
/// let scopes = session.scopes().unwrap();
/// let fixture = scopes.fixture("tests::Suite", "tests::Suite");
/// fixture.test("tests::Suite::first", "tests::Suite::first").unwrap();
///
/// let bridge = session.bridge();
/// assert_eq!(bridge.handle(&LifecycleEvent::case_finished("tests::Suite", "first")), 1);
/// assert_eq!(bridge.handle(&LifecycleEvent::suite_finished("tests::Suite")), 1);
/// assert!(fixture.is_disposed());
/// assert_eq!(bridge.handle(&LifecycleEvent::suite_finished("tests::Unknown")), 0);
/// ```
#[derive(Clone, Debug)]
pub struct LifecycleBridge {
    session: TestSession,
}

impl LifecycleBridge {
    pub fn new(session: TestSession) -> Self {
        Self { session }
    }

    /// Handles one event and returns how many scopes it disposed.
    pub fn handle(&self, event: &LifecycleEvent) -> usize {
        let class_name = event.class_name();
        if !self.session.knows_class(class_name) {
            self.session.observers().event_ignored(class_name, "unknown class");
            return 0;
        }
        // Nothing was ever resolved, so there is nothing to dispose.
        let Some(scopes) = self.session.scopes_if_built() else {
            return 0;
        };

        match event {
            LifecycleEvent::SuiteFinished { class_name } => {
                let disposed = scopes.dispose_class(class_name);
                tracing::debug!(class_name = class_name.as_str(), disposed, "suite finished");
                disposed
            }
            LifecycleEvent::CaseFinished {
                class_name,
                method_name,
                parameter_types,
            } => {
                let path = method_path(class_name, method_name);
                let disposed: usize = scopes
                    .fixtures_of(class_name)
                    .iter()
                    .map(|fixture| match parameter_types {
                        Some(types) => usize::from(fixture.dispose_test(&member_signature(&path, types))),
                        None => fixture.dispose_tests_named(&path),
                    })
                    .sum();
                if disposed == 0 {
                    self.session.observers().event_ignored(class_name, "no matching test scope");
                }
                tracing::debug!(method = path.as_str(), disposed, "case finished");
                disposed
            }
        }
    }

    /// Handles every event of `events` in order.
    pub fn listen<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = LifecycleEvent>,
    {
        events.into_iter().map(|event| self.handle(&event)).sum()
    }

    /// Consumes events from a channel on a tokio task until every sender is
    /// dropped. The task returns how many scopes it disposed.
    #[cfg(feature = "async")]
    pub fn spawn(self, mut events: tokio::sync::mpsc::UnboundedReceiver<LifecycleEvent>) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(async move {
            let mut disposed = 0;
            while let Some(event) = events.recv().await {
                disposed += self.handle(&event);
            }
            disposed
        })
    }
}

impl TestEventListener for LifecycleBridge {
    fn on_test_event(&self, event: &LifecycleEvent) {
        self.handle(event);
    }
}
