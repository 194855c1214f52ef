use async_trait::async_trait;

use crate::address::Address;
use crate::error::CallError;
use crate::value::{Decode, Value};

/// Identifies the contract a call is issued against: a network contract
/// looked up by name, or a per-instance contract (e.g. one minipool) of a
/// named ABI deployed at a specific address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractRef {
    name: String,
    address: Option<Address>,
}

impl ContractRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
        }
    }

    pub fn at(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address: Some(address),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }
}

impl std::fmt::Display for ContractRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.address {
            Some(a) => write!(f, "{}@{a}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Issues one read against the ledger and returns the decoded reply.
///
/// Implementations must tolerate concurrent calls through a shared handle.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: &[Value],
    ) -> Result<Value, CallError>;

    async fn ping(&self) -> Result<bool, CallError>;
}

/// Call `method` and decode the reply into `T`.
///
/// # Errors
/// Propagates the caller's error, or a decode error if the reply does not
/// have the shape of `T`.
pub async fn call<T: Decode>(
    caller: &dyn ContractCaller,
    contract: &ContractRef,
    method: &str,
    args: &[Value],
) -> Result<T, CallError> {
    let value = caller.call(contract, method, args).await?;
    T::decode(value)
}
