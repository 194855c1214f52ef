use poolctl_ledger::CallError;
use poolctl_resolver::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("deposit input is {len} bytes, need at least {min}")]
    ShortDepositInput { len: usize, min: usize },

    #[error("no compatible consensus client available")]
    NoCompatibleClient,

    #[error("unknown consensus client: {0}")]
    UnknownClient(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
