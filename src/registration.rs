//! Dependency registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult, ExecuteError};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;

// ResolverContext is defined in provider module
pub(crate) use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Erased call into a dependency's [`Execute`](crate::Execute) implementation.
pub(crate) type Executor = Arc<dyn Fn(&AnyArc) -> Result<(), ExecuteError> + Send + Sync>;

/// One declared dependency as recorded in a catalog.
#[derive(Clone)]
pub(crate) struct Declaration {
    pub(crate) key: TypeKey,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) executor: Option<Executor>,
}

/// Dependency registration with lifetime, constructor and optional executor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) executor: Option<Executor>,
    /// Singleton cache, initialized exactly once
    pub(crate) singleton: Option<OnceCell<AnyArc>>,
}

impl Registration {
    pub(crate) fn new(declaration: &Declaration) -> Self {
        let singleton = match declaration.lifetime {
            Lifetime::Singleton => Some(OnceCell::new()),
            _ => None,
        };

        Self {
            lifetime: declaration.lifetime,
            ctor: declaration.ctor.clone(),
            executor: declaration.executor.clone(),
            singleton,
        }
    }
}

/// Registry holding all registrations, immutable once built
pub(crate) struct Registry {
    entries: HashMap<TypeKey, Registration>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts a registration; declaring one type twice is a build error.
    pub(crate) fn insert(&mut self, declaration: &Declaration) -> DiResult<()> {
        if self.entries.contains_key(&declaration.key) {
            return Err(DiError::DuplicateDeclaration(declaration.key.name()));
        }
        self.entries
            .insert(declaration.key, Registration::new(declaration));
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &TypeKey) -> Option<&Registration> {
        self.entries.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
