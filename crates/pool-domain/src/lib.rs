//! Call-site assemblers for poolctl.
//!
//! Each assembler builds one task set of contract reads, hands it to the
//! [`Resolver`](poolctl_resolver::Resolver) with the failure policy its
//! record needs, and returns a plain DTO.

pub mod consensus;
pub mod error;
pub mod export;
pub mod minipool;
mod reads;
pub mod rewards;
pub mod units;

pub use consensus::{ConsensusClient, HardwareProfile, compatible, select_random};
pub use error::DomainError;
pub use export::{ValidatorRow, export_validators, write_tsv};
pub use minipool::{
    MinipoolDetails, MinipoolStatus, MinipoolStatusInfo, ValidatorPubkey, get_details, get_status,
};
pub use rewards::{NodeRewards, RewardInputs, estimate, get_reward_inputs, get_rewards};
pub use units::wei_to_eth;
