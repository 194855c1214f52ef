use std::sync::Arc;

use bytes::Bytes;
use poolctl_ledger::{Address, ContractCaller, ContractRef, Value};
use poolctl_resolver::{FailurePolicy, Resolver, TaskError};
use tracing::instrument;

use crate::error::DomainError;
use crate::reads::Reads;
use crate::units::wei_string;

pub const MINIPOOL_CONTRACT: &str = "rocketMinipool";
pub const TOKEN_CONTRACT: &str = "rocketPoolToken";

/// Byte range of the validator pubkey inside a minipool's deposit input.
const PUBKEY_START: usize = 4;
const PUBKEY_END: usize = 52;
pub const PUBKEY_LEN: usize = PUBKEY_END - PUBKEY_START;

/// Minipool lifecycle status as reported by the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MinipoolStatus {
    #[default]
    Initialized,
    PreLaunch,
    Staking,
    LoggedOut,
    Withdrawn,
    Closed,
    TimedOut,
}

impl MinipoolStatus {
    /// Unknown codes map to `Initialized`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::PreLaunch,
            2 => Self::Staking,
            3 => Self::LoggedOut,
            4 => Self::Withdrawn,
            5 => Self::Closed,
            6 => Self::TimedOut,
            _ => Self::Initialized,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::PreLaunch => "pre-launch",
            Self::Staking => "staking",
            Self::LoggedOut => "logged out",
            Self::Withdrawn => "withdrawn",
            Self::Closed => "closed",
            Self::TimedOut => "timed out",
        }
    }
}

impl std::fmt::Display for MinipoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized with the same labels as `Display` and the TSV export.
impl serde::Serialize for MinipoolStatus {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// BLS public key of the validator backing a minipool.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ValidatorPubkey([u8; PUBKEY_LEN]);

impl ValidatorPubkey {
    pub fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    /// Extract the pubkey from a deposit input payload (bytes 4..52).
    ///
    /// # Errors
    /// Returns `DomainError::ShortDepositInput` for payloads under 52 bytes.
    pub fn from_deposit_input(input: &[u8]) -> Result<Self, DomainError> {
        let slice = input
            .get(PUBKEY_START..PUBKEY_END)
            .ok_or(DomainError::ShortDepositInput {
                len: input.len(),
                min: PUBKEY_END,
            })?;
        let mut key = [0u8; PUBKEY_LEN];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }
}

impl Default for ValidatorPubkey {
    fn default() -> Self {
        Self([0u8; PUBKEY_LEN])
    }
}

impl std::fmt::Display for ValidatorPubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Debug for ValidatorPubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValidatorPubkey({self})")
    }
}

impl serde::Serialize for ValidatorPubkey {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

/// Full details of one minipool.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MinipoolDetails {
    pub address: Address,
    pub status: u8,
    pub status_type: MinipoolStatus,
    /// Unix seconds of the last status change.
    pub status_changed_at: u64,
    pub staking_duration_id: String,
    #[serde(with = "wei_string")]
    pub node_ether_balance_wei: u128,
    #[serde(with = "wei_string")]
    pub node_rpl_balance_wei: u128,
    pub user_count: u64,
    #[serde(with = "wei_string")]
    pub user_deposit_capacity_wei: u128,
    #[serde(with = "wei_string")]
    pub user_deposit_total_wei: u128,
}

pub mod details_fields {
    use poolctl_resolver::FieldKey;

    pub const STATUS: FieldKey = FieldKey::new("status");
    pub const STATUS_TIME: FieldKey = FieldKey::new("status_changed_at");
    pub const STAKING_DURATION_ID: FieldKey = FieldKey::new("staking_duration_id");
    pub const NODE_ETHER_BALANCE: FieldKey = FieldKey::new("node_ether_balance");
    pub const NODE_RPL_BALANCE: FieldKey = FieldKey::new("node_rpl_balance");
    pub const USER_COUNT: FieldKey = FieldKey::new("user_count");
    pub const USER_DEPOSIT_CAPACITY: FieldKey = FieldKey::new("user_deposit_capacity");
    pub const USER_DEPOSIT_TOTAL: FieldKey = FieldKey::new("user_deposit_total");
}

/// Get a minipool's details. Any failed read invalidates the whole snapshot.
///
/// # Errors
/// Returns the first failing read as `DomainError::Resolve`.
#[instrument(skip(caller, resolver), fields(minipool = %minipool))]
pub async fn get_details(
    caller: Arc<dyn ContractCaller>,
    resolver: &Resolver,
    minipool: Address,
) -> Result<MinipoolDetails, DomainError> {
    use details_fields::{
        NODE_ETHER_BALANCE, NODE_RPL_BALANCE, STAKING_DURATION_ID, STATUS, STATUS_TIME,
        USER_COUNT, USER_DEPOSIT_CAPACITY, USER_DEPOSIT_TOTAL,
    };

    let contract = ContractRef::at(MINIPOOL_CONTRACT, minipool);
    let token = ContractRef::named(TOKEN_CONTRACT);

    let mut reads: Reads<MinipoolDetails> = Reads::new(caller);
    reads
        .read(
            STATUS,
            &contract,
            "getStatus",
            vec![],
            "minipool status",
            |d: &mut MinipoolDetails, v: u8| {
                d.status = v;
                d.status_type = MinipoolStatus::from_code(v);
            },
        )
        .read(
            STATUS_TIME,
            &contract,
            "getStatusChangedTime",
            vec![],
            "minipool status changed time",
            |d: &mut MinipoolDetails, v| d.status_changed_at = v,
        )
        .read(
            STAKING_DURATION_ID,
            &contract,
            "getStakingDurationID",
            vec![],
            "minipool staking duration ID",
            |d: &mut MinipoolDetails, v| d.staking_duration_id = v,
        )
        .read(
            NODE_ETHER_BALANCE,
            &contract,
            "getNodeBalance",
            vec![],
            "minipool node ETH balance",
            |d: &mut MinipoolDetails, v| d.node_ether_balance_wei = v,
        )
        .read(
            NODE_RPL_BALANCE,
            &token,
            "balanceOf",
            vec![Value::from(minipool)],
            "minipool node RPL balance",
            |d: &mut MinipoolDetails, v| d.node_rpl_balance_wei = v,
        )
        .read(
            USER_COUNT,
            &contract,
            "getUserCount",
            vec![],
            "minipool user count",
            |d: &mut MinipoolDetails, v| d.user_count = v,
        )
        .read(
            USER_DEPOSIT_CAPACITY,
            &contract,
            "getUserDepositCapacity",
            vec![],
            "minipool user deposit capacity",
            |d: &mut MinipoolDetails, v| d.user_deposit_capacity_wei = v,
        )
        .read(
            USER_DEPOSIT_TOTAL,
            &contract,
            "getUserDepositTotal",
            vec![],
            "minipool user deposit total",
            |d: &mut MinipoolDetails, v| d.user_deposit_total_wei = v,
        );

    let mut details = MinipoolDetails {
        address: minipool,
        ..MinipoolDetails::default()
    };
    resolver
        .resolve(reads.into_set(), &mut details, FailurePolicy::FailFast)
        .await?;
    Ok(details)
}

/// Status snapshot of one minipool, including its validator key.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MinipoolStatusInfo {
    pub status: u8,
    pub status_type: MinipoolStatus,
    pub status_changed_block: u64,
    pub staking_duration: u64,
    pub validator_pubkey: ValidatorPubkey,
}

pub mod status_fields {
    use poolctl_resolver::FieldKey;

    pub const STATUS: FieldKey = FieldKey::new("status");
    pub const STATUS_BLOCK: FieldKey = FieldKey::new("status_changed_block");
    pub const STAKING_DURATION: FieldKey = FieldKey::new("staking_duration");
    pub const VALIDATOR_PUBKEY: FieldKey = FieldKey::new("validator_pubkey");
}

/// Get a minipool's status, block of last change, staking duration and
/// validator pubkey.
///
/// # Errors
/// Returns the first failing read as `DomainError::Resolve`. A deposit input
/// shorter than 52 bytes fails the pubkey field.
#[instrument(skip(caller, resolver), fields(minipool = %minipool))]
pub async fn get_status(
    caller: Arc<dyn ContractCaller>,
    resolver: &Resolver,
    minipool: Address,
) -> Result<MinipoolStatusInfo, DomainError> {
    use status_fields::{STAKING_DURATION, STATUS, STATUS_BLOCK, VALIDATOR_PUBKEY};

    let contract = ContractRef::at(MINIPOOL_CONTRACT, minipool);

    let mut reads: Reads<MinipoolStatusInfo> = Reads::new(caller);
    reads
        .read(
            STATUS,
            &contract,
            "getStatus",
            vec![],
            "minipool status",
            |s: &mut MinipoolStatusInfo, v: u8| {
                s.status = v;
                s.status_type = MinipoolStatus::from_code(v);
            },
        )
        .read(
            STATUS_BLOCK,
            &contract,
            "getStatusChangedBlock",
            vec![],
            "minipool status changed block",
            |s: &mut MinipoolStatusInfo, v| s.status_changed_block = v,
        )
        .read(
            STAKING_DURATION,
            &contract,
            "getStakingDuration",
            vec![],
            "minipool staking duration",
            |s: &mut MinipoolStatusInfo, v| s.staking_duration = v,
        )
        .read_map(
            VALIDATOR_PUBKEY,
            &contract,
            "getDepositInput",
            vec![],
            "minipool deposit input",
            |input: Bytes| {
                ValidatorPubkey::from_deposit_input(&input)
                    .map_err(|e| TaskError::call("decoding validator pubkey", e))
            },
            |s: &mut MinipoolStatusInfo, v| s.validator_pubkey = v,
        );

    let mut status = MinipoolStatusInfo::default();
    resolver
        .resolve(reads.into_set(), &mut status, FailurePolicy::FailFast)
        .await?;
    Ok(status)
}
