//! A small host shim that runs registered fixtures end to end.
//!
//! The runner does what a test framework would do with the crate: build each
//! fixture suite, instantiate runnable fixtures, build and run their tests, and
//! report completion through the [`LifecycleBridge`] so scopes get disposed.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::builder::{BuiltFixture, InjectionBuilder, TestOutcome};
use crate::definition::{FixtureDefinition, FixtureInstance, TestMethodDefinition};
use crate::error::{DiError, DiResult, Skip};
use crate::internal::panic_message;
use crate::lifecycle::{LifecycleBridge, LifecycleEvent};
use crate::session::TestSession;

/// Final result of a fixture setup or a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed(String),
    Skipped(String),
    NotRunnable(String),
}

impl TestResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestResult::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TestResult::Skipped(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            TestResult::Passed => None,
            TestResult::Failed(m) | TestResult::Skipped(m) | TestResult::NotRunnable(m) => Some(m),
        }
    }

    fn from_outcome(outcome: &TestOutcome) -> Option<Self> {
        match outcome {
            TestOutcome::Runnable => None,
            TestOutcome::Ignored(reason) => Some(TestResult::Skipped(reason.clone())),
            TestOutcome::NotRunnable(reason) => Some(TestResult::NotRunnable(reason.clone())),
        }
    }

    fn from_run(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => TestResult::Passed,
            Err(err) => match Skip::find(&err) {
                Some(skip) => TestResult::Skipped(skip.reason().to_string()),
                None => TestResult::Failed(format!("{err:#}")),
            },
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Passed => f.write_str("Passed"),
            TestResult::Failed(m) => write!(f, "Failed: {m}"),
            TestResult::Skipped(m) => write!(f, "Skipped: {m}"),
            TestResult::NotRunnable(m) => write!(f, "NotRunnable: {m}"),
        }
    }
}

/// Result of one test case.
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub method_name: String,
    pub signature: String,
    pub result: TestResult,
}

/// Results of one fixture suite, i.e. one constructor of a fixture.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub fixture_name: String,
    pub signature: String,
    /// Result of building and instantiating the fixture itself
    pub setup: TestResult,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Result of the first case called `method_name`.
    pub fn result_of(&self, method_name: &str) -> Option<&TestResult> {
        self.cases
            .iter()
            .find(|case| case.method_name == method_name)
            .map(|case| &case.result)
    }

    pub fn all_passed(&self) -> bool {
        self.setup.is_passed() && self.cases.iter().all(|case| case.result.is_passed())
    }

    pub fn count(&self, predicate: impl Fn(&TestResult) -> bool) -> usize {
        self.cases.iter().filter(|case| predicate(&case.result)).count()
    }
}

/// Runs registered fixtures against a session.
pub struct TestRunner {
    session: TestSession,
    bridge: LifecycleBridge,
}

impl TestRunner {
    pub fn new(session: TestSession) -> Self {
        let bridge = session.bridge();
        Self { session, bridge }
    }

    /// Runs the fixture registered under `name`.
    pub fn run(&self, name: &str) -> DiResult<Vec<SuiteReport>> {
        let definition = self
            .session
            .fixture(name)
            .ok_or_else(|| DiError::UnknownFixture(name.to_string()))?;
        self.run_definition(&definition)
    }

    /// Runs every constructor suite of `definition`, then reports the whole
    /// class as finished.
    ///
    /// Build failures become failed results; only a broken registry is
    /// returned as an error.
    pub fn run_definition(&self, definition: &FixtureDefinition) -> DiResult<Vec<SuiteReport>> {
        let injector = self.session.injector()?;
        let config = definition.effective_config();

        let reports = definition
            .constructors()
            .iter()
            .map(|constructor| match build(|| injector.build_fixture_with(definition, constructor, &config)) {
                Ok(fixture) => self.run_suite(&injector, definition, &fixture),
                Err(message) => {
                    tracing::warn!(fixture = definition.name(), error = message.as_str(), "fixture build failed");
                    SuiteReport {
                        fixture_name: definition.name().to_string(),
                        signature: definition.signature(constructor),
                        setup: TestResult::Failed(message.clone()),
                        cases: definition
                            .tests()
                            .iter()
                            .map(|method| self.report_without_running(definition, method, TestResult::Failed(message.clone())))
                            .collect(),
                    }
                }
            })
            .collect();

        self.bridge.handle(&LifecycleEvent::suite_finished(definition.name()));
        Ok(reports)
    }

    fn run_suite(&self, injector: &InjectionBuilder<'_>, definition: &FixtureDefinition, fixture: &BuiltFixture) -> SuiteReport {
        let instance = match TestResult::from_outcome(fixture.outcome()) {
            Some(result) => Err(result),
            None => instantiate(fixture).map_err(TestResult::Failed),
        };

        let (setup, cases) = match instance {
            Ok(instance) => {
                let cases = definition
                    .tests()
                    .iter()
                    .map(|method| self.run_case(injector, fixture, method, &instance))
                    .collect();
                (TestResult::Passed, cases)
            }
            Err(result) => {
                tracing::info!(fixture = fixture.signature(), %result, "fixture not run");
                let cases = definition
                    .tests()
                    .iter()
                    .map(|method| self.report_without_running(definition, method, result.clone()))
                    .collect();
                (result, cases)
            }
        };

        SuiteReport {
            fixture_name: definition.name().to_string(),
            signature: fixture.signature().to_string(),
            setup,
            cases,
        }
    }

    fn run_case(
        &self,
        injector: &InjectionBuilder<'_>,
        fixture: &BuiltFixture,
        method: &TestMethodDefinition,
        instance: &FixtureInstance,
    ) -> CaseReport {
        let signature = method.signature(fixture.name());
        let result = match build(|| injector.build_test(fixture, method)) {
            Ok(test) => match TestResult::from_outcome(test.outcome()) {
                Some(result) => result,
                None => match catch_unwind(AssertUnwindSafe(|| test.run(instance))) {
                    Ok(result) => TestResult::from_run(result),
                    Err(payload) => TestResult::Failed(panic_message(payload.as_ref())),
                },
            },
            Err(message) => TestResult::Failed(message),
        };

        tracing::debug!(test = signature.as_str(), %result, "test finished");
        self.bridge.handle(&LifecycleEvent::case_finished_with(
            fixture.name(),
            method.name(),
            method.parameters(),
        ));

        CaseReport {
            method_name: method.name().to_string(),
            signature,
            result,
        }
    }

    fn report_without_running(&self, definition: &FixtureDefinition, method: &TestMethodDefinition, result: TestResult) -> CaseReport {
        CaseReport {
            method_name: method.name().to_string(),
            signature: method.signature(definition.name()),
            result,
        }
    }
}

/// Runs a build step; factories that panic count as failed builds.
fn build<T>(step: impl FnOnce() -> DiResult<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn instantiate(fixture: &BuiltFixture) -> Result<FixtureInstance, String> {
    match catch_unwind(AssertUnwindSafe(|| fixture.instantiate())) {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}
