use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::address::Address;
use crate::caller::{ContractCaller, ContractRef};
use crate::error::CallError;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerConfig {
    /// Artificial latency applied to every call, to exercise concurrency.
    pub call_latency: Option<Duration>,
}

/// One recorded call and its reply. Exactly one of `value` / `revert` is set.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SnapshotEntry {
    pub contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert: Option<String>,
}

/// Recorded ledger state: the replies the in-memory ledger serves.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub calls: Vec<SnapshotEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn with(
        mut self,
        contract: &ContractRef,
        method: &str,
        args: Vec<Value>,
        value: impl Into<Value>,
    ) -> Self {
        self.calls.push(SnapshotEntry {
            contract: contract.name().to_string(),
            address: contract.address(),
            method: method.to_string(),
            args,
            value: Some(value.into()),
            revert: None,
        });
        self
    }

    #[must_use]
    pub fn with_revert(
        mut self,
        contract: &ContractRef,
        method: &str,
        args: Vec<Value>,
        reason: impl Into<String>,
    ) -> Self {
        self.calls.push(SnapshotEntry {
            contract: contract.name().to_string(),
            address: contract.address(),
            method: method.to_string(),
            args,
            value: None,
            revert: Some(reason.into()),
        });
        self
    }

    /// # Errors
    /// Returns `CallError::Snapshot` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, CallError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns `CallError::Snapshot` if serialization fails.
    pub fn to_json(&self) -> Result<String, CallError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    contract: ContractRef,
    method: String,
    args: Vec<Value>,
}

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Revert(String),
}

#[derive(Default)]
struct LedgerState {
    replies: HashMap<CallKey, Reply>,
    contracts: HashSet<String>,
    method_latency: HashMap<String, Duration>,
}

/// Ledger backed by a recorded snapshot. Serves tests and offline CLI use.
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
    config: MemoryLedgerConfig,
    calls: AtomicU64,
    closed: AtomicBool,
}

impl MemoryLedger {
    #[must_use]
    pub fn new(config: MemoryLedgerConfig) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            config,
            calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// # Errors
    /// Returns `CallError::Other` if an entry has neither or both of
    /// `value` and `revert`.
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: MemoryLedgerConfig,
    ) -> Result<Self, CallError> {
        let mut state = LedgerState::default();
        for entry in snapshot.calls {
            let reply = match (entry.value, entry.revert) {
                (Some(value), None) => Reply::Value(value),
                (None, Some(reason)) => Reply::Revert(reason),
                _ => {
                    return Err(CallError::Other(format!(
                        "snapshot entry {}.{} must have exactly one of value/revert",
                        entry.contract, entry.method
                    )));
                }
            };
            let contract = match entry.address {
                Some(a) => ContractRef::at(entry.contract, a),
                None => ContractRef::named(entry.contract),
            };
            state.contracts.insert(contract.name().to_string());
            state.replies.insert(
                CallKey {
                    contract,
                    method: entry.method,
                    args: entry.args,
                },
                reply,
            );
        }

        tracing::debug!(replies = state.replies.len(), "loaded ledger snapshot");

        Ok(Self {
            state: RwLock::new(state),
            config,
            calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Load a JSON snapshot file.
    ///
    /// # Errors
    /// Returns `CallError::Io` if the file cannot be read and
    /// `CallError::Snapshot` if it is not a valid snapshot.
    pub async fn load(path: &Path, config: MemoryLedgerConfig) -> Result<Self, CallError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_snapshot(Snapshot::from_json(&json)?, config)
    }

    pub async fn set(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<Value>,
        value: impl Into<Value>,
    ) {
        let mut state = self.state.write().await;
        state.contracts.insert(contract.name().to_string());
        state.replies.insert(
            CallKey {
                contract: contract.clone(),
                method: method.to_string(),
                args,
            },
            Reply::Value(value.into()),
        );
    }

    pub async fn revert(
        &self,
        contract: &ContractRef,
        method: &str,
        args: Vec<Value>,
        reason: impl Into<String>,
    ) {
        let mut state = self.state.write().await;
        state.contracts.insert(contract.name().to_string());
        state.replies.insert(
            CallKey {
                contract: contract.clone(),
                method: method.to_string(),
                args,
            },
            Reply::Revert(reason.into()),
        );
    }

    /// Latency for one method, overriding `call_latency`.
    pub async fn set_latency(&self, method: &str, latency: Duration) {
        self.state
            .write()
            .await
            .method_latency
            .insert(method.to_string(), latency);
    }

    /// Number of calls served so far, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn check_closed(&self) -> Result<(), CallError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CallError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl ContractCaller for MemoryLedger {
    async fn call(
        &self,
        contract: &ContractRef,
        method: &str,
        args: &[Value],
    ) -> Result<Value, CallError> {
        self.check_closed()?;
        self.calls.fetch_add(1, Ordering::AcqRel);

        let key = CallKey {
            contract: contract.clone(),
            method: method.to_string(),
            args: args.to_vec(),
        };

        // Copy out under the lock; never hold it across the latency sleep.
        let (reply, latency, known) = {
            let state = self.state.read().await;
            (
                state.replies.get(&key).cloned(),
                state
                    .method_latency
                    .get(method)
                    .copied()
                    .or(self.config.call_latency),
                state.contracts.contains(contract.name()),
            )
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Revert(reason)) => Err(CallError::Reverted {
                contract: contract.to_string(),
                method: method.to_string(),
                reason,
            }),
            None if !known => Err(CallError::UnknownContract(contract.name().to_string())),
            None => Err(CallError::Reverted {
                contract: contract.to_string(),
                method: method.to_string(),
                reason: "no recorded reply".to_string(),
            }),
        }
    }

    async fn ping(&self) -> Result<bool, CallError> {
        Ok(!self.closed.load(Ordering::Acquire))
    }
}
