//! Building fixtures and tests with injected arguments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::SessionOptions;
use crate::dependant::DependantConfig;
use crate::definition::{Argument, Arguments, ConstructorDefinition, FixtureDefinition, FixtureInstance, TestMethodDefinition};
use crate::eager::EagerExecutor;
use crate::error::{DiError, DiResult};
use crate::key::{method_path, TypeKey};
use crate::observer::Observers;
use crate::scope_tree::{FixtureScope, ScopeTree, TestScope};
use crate::traits::ResolverCore;

/// Well-known property key holding the skip or not-runnable reason.
pub const SKIP_REASON: &str = "_SKIPREASON";

/// Build outcome of a fixture or test, decided once during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Runnable,
    /// An eagerly executed dependency raised the skip signal
    Ignored(String),
    /// The configuration is malformed
    NotRunnable(String),
}

impl TestOutcome {
    pub fn is_runnable(&self) -> bool {
        matches!(self, TestOutcome::Runnable)
    }

    /// The skip or not-runnable reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            TestOutcome::Runnable => None,
            TestOutcome::Ignored(reason) | TestOutcome::NotRunnable(reason) => Some(reason),
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Runnable => f.write_str("Runnable"),
            TestOutcome::Ignored(reason) => write!(f, "Ignored: {reason}"),
            TestOutcome::NotRunnable(reason) => write!(f, "NotRunnable: {reason}"),
        }
    }
}

/// A fixture suite built from one constructor, with its resolved arguments.
pub struct BuiltFixture {
    name: String,
    signature: String,
    scope: Arc<FixtureScope>,
    constructor: ConstructorDefinition,
    arguments: Arguments,
    outcome: TestOutcome,
    properties: HashMap<String, String>,
}

impl BuiltFixture {
    /// The fixture's full name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construction signature, also the fixture scope key.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn scope(&self) -> &Arc<FixtureScope> {
        &self.scope
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn outcome(&self) -> &TestOutcome {
        &self.outcome
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Runs the constructor with the resolved arguments.
    pub fn instantiate(&self) -> DiResult<FixtureInstance> {
        self.constructor
            .construct(&self.arguments)
            .map_err(|source| DiError::Construction {
                fixture: self.signature.clone(),
                source,
            })
    }
}

impl fmt::Debug for BuiltFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltFixture")
            .field("signature", &self.signature)
            .field("arguments", &self.arguments)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// A test method built against a fixture, with its resolved arguments.
pub struct BuiltTest {
    fixture_name: String,
    method: TestMethodDefinition,
    signature: String,
    scope: Arc<TestScope>,
    arguments: Arguments,
    outcome: TestOutcome,
    properties: HashMap<String, String>,
}

impl BuiltTest {
    pub fn fixture_name(&self) -> &str {
        &self.fixture_name
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// Method signature, also the test scope key.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Declared parameter types, including ones left out of the arguments.
    pub fn parameters(&self) -> &[TypeKey] {
        self.method.parameters()
    }

    pub fn scope(&self) -> &Arc<TestScope> {
        &self.scope
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn outcome(&self) -> &TestOutcome {
        &self.outcome
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Runs the test body against an instantiated fixture.
    pub fn run(&self, fixture: &FixtureInstance) -> anyhow::Result<()> {
        self.method.run(fixture, &self.arguments)
    }
}

impl fmt::Debug for BuiltTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltTest")
            .field("signature", &self.signature)
            .field("arguments", &self.arguments)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Resolves constructor and method arguments and decides build outcomes.
///
/// Obtained from [`TestSession::injector`](crate::TestSession::injector).
pub struct InjectionBuilder<'s> {
    scopes: &'s ScopeTree,
    options: &'s SessionOptions,
    observers: &'s Observers,
}

impl<'s> InjectionBuilder<'s> {
    pub(crate) fn new(scopes: &'s ScopeTree, options: &'s SessionOptions, observers: &'s Observers) -> Self {
        Self {
            scopes,
            options,
            observers,
        }
    }

    /// Resolves each parameter type through `scope`, in order.
    ///
    /// Types that were never declared are left out of the result.
    pub fn resolve_arguments(&self, parameters: &[TypeKey], scope: &dyn ResolverCore) -> DiResult<Arguments> {
        let mut arguments = Arguments::new();
        for key in parameters {
            match scope.resolve_any(key)? {
                Some(value) => arguments.push(Argument::new(*key, value)),
                None => tracing::trace!(parameter = key.name(), "parameter type not declared, omitted"),
            }
        }
        Ok(arguments)
    }

    /// Builds one fixture per constructor of `definition`.
    ///
    /// Each one is resolved, validated and given an outcome independently.
    pub fn build_fixtures(&self, definition: &FixtureDefinition) -> DiResult<Vec<BuiltFixture>> {
        let config = definition.effective_config();
        definition
            .constructors()
            .iter()
            .map(|constructor| self.build_fixture_with(definition, constructor, &config))
            .collect()
    }

    /// Builds the fixture for one constructor under an explicit configuration.
    pub fn build_fixture_with(
        &self,
        definition: &FixtureDefinition,
        constructor: &ConstructorDefinition,
        config: &DependantConfig,
    ) -> DiResult<BuiltFixture> {
        let signature = definition.signature(constructor);
        let scope = self.scopes.fixture(definition.name(), &signature);

        // A malformed configuration is terminal; nothing gets resolved.
        let arguments = if config.is_valid() {
            self.resolve_arguments(constructor.parameters(), &*scope)?
        } else {
            Arguments::new()
        };
        let outcome = self.executor(&signature).apply(config, &arguments, &*scope)?;

        self.observers.outcome_decided(&signature, &outcome);
        let properties = self.properties_for(&outcome);

        Ok(BuiltFixture {
            name: definition.name().to_string(),
            signature,
            scope,
            constructor: constructor.clone(),
            arguments,
            outcome,
            properties,
        })
    }

    /// Builds `method` against `fixture` using the method's own configuration.
    ///
    /// Methods without a configuration get plain injection and are runnable.
    pub fn build_test(&self, fixture: &BuiltFixture, method: &TestMethodDefinition) -> DiResult<BuiltTest> {
        let config = method.effective_config();
        self.build_test_with(fixture, method, config.as_ref())
    }

    pub fn build_test_with(
        &self,
        fixture: &BuiltFixture,
        method: &TestMethodDefinition,
        config: Option<&DependantConfig>,
    ) -> DiResult<BuiltTest> {
        let signature = method.signature(fixture.name());
        let path = method_path(fixture.name(), method.name());
        let scope = fixture.scope().test(&path, &signature)?;

        let arguments = if config.map_or(true, DependantConfig::is_valid) {
            self.resolve_arguments(method.parameters(), &*scope)?
        } else {
            Arguments::new()
        };
        let outcome = match config {
            Some(config) => self.executor(&signature).apply(config, &arguments, &*scope)?,
            None => TestOutcome::Runnable,
        };

        self.observers.outcome_decided(&signature, &outcome);
        let properties = self.properties_for(&outcome);

        Ok(BuiltTest {
            fixture_name: fixture.name().to_string(),
            method: method.clone(),
            signature,
            scope,
            arguments,
            outcome,
            properties,
        })
    }

    fn executor<'a>(&'a self, subject: &'a str) -> EagerExecutor<'a> {
        EagerExecutor {
            registry: self.scopes.registry(),
            observers: self.observers,
            continue_after_skip: self.options.continue_after_skip,
            subject,
        }
    }

    fn properties_for(&self, outcome: &TestOutcome) -> HashMap<String, String> {
        let mut properties = HashMap::new();
        if let Some(reason) = outcome.reason() {
            properties.insert(self.options.skip_reason_key.clone(), reason.to_string());
        }
        properties
    }
}
