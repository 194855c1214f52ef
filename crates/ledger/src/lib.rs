mod address;
mod caller;
mod error;
mod memory;
mod value;

pub use address::Address;
pub use caller::{ContractCaller, ContractRef, call};
pub use error::CallError;
pub use memory::{MemoryLedger, MemoryLedgerConfig, Snapshot, SnapshotEntry};
pub use value::{Decode, Value};
