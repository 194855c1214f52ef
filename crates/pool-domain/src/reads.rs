use std::sync::Arc;

use poolctl_ledger::{ContractCaller, ContractRef, Decode, Value, call};
use poolctl_resolver::{FieldKey, TaskError, TaskSet};

/// Builds a task set whose tasks are single contract reads against a shared
/// caller handle.
pub(crate) struct Reads<R> {
    caller: Arc<dyn ContractCaller>,
    set: TaskSet<R>,
}

impl<R: 'static> Reads<R> {
    pub(crate) fn new(caller: Arc<dyn ContractCaller>) -> Self {
        Self {
            caller,
            set: TaskSet::new(),
        }
    }

    /// Read `contract.method(args)` as `T` and store it with `write`.
    /// `context` names the value in error messages, e.g. "minipool status".
    pub(crate) fn read<T, W>(
        &mut self,
        key: FieldKey,
        contract: &ContractRef,
        method: &'static str,
        args: Vec<Value>,
        context: &'static str,
        write: W,
    ) -> &mut Self
    where
        T: Decode + Send + 'static,
        W: FnOnce(&mut R, T) + Send + 'static,
    {
        self.read_map(key, contract, method, args, context, Ok::<T, TaskError>, write)
    }

    /// Like [`read`](Self::read), but post-processes the decoded reply on the
    /// worker before it is written.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read_map<T, V, M, W>(
        &mut self,
        key: FieldKey,
        contract: &ContractRef,
        method: &'static str,
        args: Vec<Value>,
        context: &'static str,
        map: M,
        write: W,
    ) -> &mut Self
    where
        T: Decode + Send + 'static,
        V: Send + 'static,
        M: FnOnce(T) -> Result<V, TaskError> + Send + 'static,
        W: FnOnce(&mut R, V) + Send + 'static,
    {
        let caller = self.caller.clone();
        let contract = contract.clone();
        self.set.field(
            key,
            format!("{contract}.{method}"),
            move || async move {
                let raw: T = call(caller.as_ref(), &contract, method, &args)
                    .await
                    .map_err(|e| TaskError::call(format!("retrieving {context}"), e))?;
                map(raw)
            },
            write,
        );
        self
    }

    pub(crate) fn into_set(self) -> TaskSet<R> {
        self.set
    }
}
