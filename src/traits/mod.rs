//! Core traits for the dependency injection container.

mod dispose;
mod execute;
mod resolver;

pub use dispose::Dispose;
pub use execute::Execute;
pub use resolver::{Resolver, ResolverCore};
