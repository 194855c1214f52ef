//! Concurrent resolution of independent record fields.
//!
//! A [`TaskSet`] holds one [`Task`] per record field. [`Resolver::resolve`]
//! runs them all at once, writes each value into the record from a single
//! collection loop, and applies a [`FailurePolicy`] to task errors.

mod error;
mod field;
mod resolver;
mod task;

pub use error::{ResolveError, TaskError};
pub use field::{FieldErrors, FieldKey};
pub use resolver::{FailurePolicy, Resolver, ResolverConfig};
pub use task::{Task, TaskSet};
