//! Eager execution of dependencies and skip propagation.

use crate::builder::TestOutcome;
use crate::dependant::DependantConfig;
use crate::definition::Arguments;
use crate::error::{DiError, DiResult, ExecuteError, Skip};
use crate::key::TypeKey;
use crate::observer::Observers;
use crate::provider::DependencyRegistry;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Whether processing continues after an execution.
enum Flow {
    Continue,
    Stop,
}

/// Runs the eager-execution step for one fixture or test build.
///
/// The step decides the build outcome:
///
/// 1. A configuration with a validation error yields
///    [`TestOutcome::NotRunnable`] and nothing is executed.
/// 2. With "execute everything injected", every resolved argument whose type
///    is executable runs.
/// 3. Every explicitly listed type runs next, unless an argument of that type
///    already ran in step 2. Listed types are resolved from `scope`.
///
/// A [`Skip`] turns the outcome into [`TestOutcome::Ignored`]; the last reason
/// wins. Any other failure aborts the build with [`DiError::Execution`].
pub(crate) struct EagerExecutor<'a> {
    pub(crate) registry: &'a DependencyRegistry,
    pub(crate) observers: &'a Observers,
    pub(crate) continue_after_skip: bool,
    /// Name of the fixture or test being built, for diagnostics
    pub(crate) subject: &'a str,
}

impl<'a> EagerExecutor<'a> {
    pub(crate) fn apply(
        &self,
        config: &DependantConfig,
        args: &Arguments,
        scope: &dyn ResolverCore,
    ) -> DiResult<TestOutcome> {
        if let Some(message) = config.validation_error() {
            return Ok(TestOutcome::NotRunnable(message.to_string()));
        }

        let mut outcome = TestOutcome::Runnable;
        let mut executed: Vec<TypeKey> = Vec::new();

        if config.executes_injected() {
            for arg in args {
                let key = arg.key();
                if !self.registry.is_executable(&key) {
                    continue;
                }
                executed.push(key);
                if let Flow::Stop = self.run(&key, arg.value(), &mut outcome)? {
                    return Ok(outcome);
                }
            }
        }

        for key in config.execute_types() {
            if executed.contains(key) {
                continue;
            }
            let instance = scope
                .resolve_any(key)?
                .ok_or(DiError::NotDeclared(key.name()))?;
            executed.push(*key);
            if let Flow::Stop = self.run(key, &instance, &mut outcome)? {
                return Ok(outcome);
            }
        }

        Ok(outcome)
    }

    fn run(&self, key: &TypeKey, instance: &AnyArc, outcome: &mut TestOutcome) -> DiResult<Flow> {
        let result = self
            .registry
            .execute(key, instance)
            .ok_or(DiError::NotDeclared(key.name()))?;

        let skip = match result {
            Ok(()) => None,
            Err(ExecuteError::Skip(skip)) => Some(skip),
            Err(ExecuteError::Failure(err)) => {
                let found = Skip::find(&err).cloned();
                if found.is_none() {
                    tracing::error!(subject = self.subject, dependency = key.name(), error = %err, "eager execution failed");
                    return Err(DiError::Execution {
                        type_name: key.name(),
                        source: err,
                    });
                }
                found
            }
        };

        self.observers
            .dependency_executed(self.subject, key, skip.as_ref().map(Skip::reason));

        match skip {
            None => Ok(Flow::Continue),
            Some(skip) => {
                *outcome = TestOutcome::Ignored(skip.reason().to_string());
                if self.continue_after_skip {
                    Ok(Flow::Continue)
                } else {
                    Ok(Flow::Stop)
                }
            }
        }
    }
}
