use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("no contract named {0}")]
    UnknownContract(String),

    #[error("call {contract}.{method} reverted: {reason}")]
    Reverted {
        contract: String,
        method: String,
        reason: String,
    },

    #[error("cannot decode {found} as {expected}")]
    Decode {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value out of range for {0}")]
    Overflow(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}
