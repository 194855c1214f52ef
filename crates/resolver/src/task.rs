use std::future::Future;
use std::pin::Pin;

use crate::error::{ResolveError, TaskError};
use crate::field::FieldKey;

/// Writes a resolved value into the record. Only ever invoked by the
/// resolver's collection loop.
pub(crate) type Apply<R> = Box<dyn FnOnce(&mut R) + Send>;

pub(crate) type TaskFuture<R> = Pin<Box<dyn Future<Output = Result<Apply<R>, TaskError>> + Send>>;

type Run<R> = Box<dyn FnOnce() -> TaskFuture<R> + Send>;

/// One unit of concurrent work producing the value of a single record field.
///
/// The operation does not see the record. It yields a value and the resolver
/// applies `write` on its own context once the value arrives.
pub struct Task<R> {
    key: FieldKey,
    name: String,
    run: Run<R>,
}

impl<R: 'static> Task<R> {
    pub fn new<V, F, Fut, W>(key: FieldKey, name: impl Into<String>, run: F, write: W) -> Self
    where
        V: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
        W: FnOnce(&mut R, V) + Send + 'static,
    {
        let run: Run<R> = Box::new(move || {
            Box::pin(async move {
                let value = run().await?;
                let apply: Apply<R> = Box::new(move |record: &mut R| write(record, value));
                Ok(apply)
            })
        });

        Self {
            key,
            name: name.into(),
            run,
        }
    }
}

impl<R> Task<R> {
    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (FieldKey, String, Run<R>) {
        (self.key, self.name, self.run)
    }
}

impl<R> std::fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The tasks for one resolution run, one per record field.
pub struct TaskSet<R> {
    tasks: Vec<Task<R>>,
}

impl<R: 'static> TaskSet<R> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a task for `key`. See [`Task::new`].
    pub fn field<V, F, Fut, W>(
        &mut self,
        key: FieldKey,
        name: impl Into<String>,
        run: F,
        write: W,
    ) -> &mut Self
    where
        V: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
        W: FnOnce(&mut R, V) + Send + 'static,
    {
        self.tasks.push(Task::new(key, name, run, write));
        self
    }
}

impl<R> TaskSet<R> {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.tasks.iter().map(Task::key)
    }

    /// Reject empty sets and duplicate field keys.
    pub(crate) fn validate(&self) -> Result<(), ResolveError> {
        if self.tasks.is_empty() {
            return Err(ResolveError::EmptyTaskSet);
        }

        let mut seen = std::collections::HashSet::new();
        for key in self.keys() {
            if !seen.insert(key) {
                return Err(ResolveError::DuplicateField(key));
            }
        }
        Ok(())
    }

    pub(crate) fn into_tasks(self) -> Vec<Task<R>> {
        self.tasks
    }
}

impl<R: 'static> Default for TaskSet<R> {
    fn default() -> Self {
        Self::new()
    }
}
