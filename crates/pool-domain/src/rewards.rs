use std::sync::Arc;

use poolctl_ledger::{Address, ContractCaller, ContractRef, Value};
use poolctl_resolver::{FailurePolicy, Resolver};
use tracing::instrument;

use crate::error::DomainError;
use crate::reads::Reads;
use crate::units::{SECONDS_PER_DAY, wei_to_eth};

pub const TRUSTED_NODES_CONTRACT: &str = "rocketDAONodeTrusted";
pub const REWARDS_POOL_CONTRACT: &str = "rocketRewardsPool";
pub const NODE_STAKING_CONTRACT: &str = "rocketNodeStaking";
pub const RPL_TOKEN_CONTRACT: &str = "rocketTokenRPL";

const NODE_CLAIM_CONTRACT: &str = "rocketClaimNode";
const TRUSTED_NODE_CLAIM_CONTRACT: &str = "rocketClaimTrustedNode";

/// Raw on-chain inputs to the rewards estimate. Amounts and shares are in wei
/// (shares are fractions scaled by 1e18).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardInputs {
    pub trusted: bool,
    pub cumulative_rewards: u128,
    pub cumulative_trusted_rewards: u128,
    /// Unix seconds at which the current claim interval started.
    pub period_start: u64,
    pub interval_secs: u64,
    pub effective_stake: u128,
    pub total_effective_stake: u128,
    pub total_supply: u128,
    /// Per-day RPL inflation factor, e.g. 1.000133680617113500e18.
    pub inflation_interval_rate: u128,
    pub odao_size: u64,
    pub node_operator_share: u128,
    pub trusted_operator_share: u128,
}

/// Rewards summary for one node, in whole RPL.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct NodeRewards {
    pub trusted: bool,
    pub cumulative_rewards: f64,
    pub cumulative_trusted_rewards: f64,
    /// Seconds until the next rewards checkpoint. Negative once it has passed.
    /// Upstream reports `now - checkpoint` (elapsed since the checkpoint);
    /// this field counts down instead.
    pub time_to_checkpoint_secs: i64,
    pub estimated_rewards: f64,
    pub estimated_trusted_rewards: f64,
}

pub mod rewards_fields {
    use poolctl_resolver::FieldKey;

    pub const TRUSTED: FieldKey = FieldKey::new("trusted");
    pub const CUMULATIVE_REWARDS: FieldKey = FieldKey::new("cumulative_rewards");
    pub const CUMULATIVE_TRUSTED_REWARDS: FieldKey = FieldKey::new("cumulative_trusted_rewards");
    pub const PERIOD_START: FieldKey = FieldKey::new("period_start");
    pub const INTERVAL: FieldKey = FieldKey::new("interval");
    pub const EFFECTIVE_STAKE: FieldKey = FieldKey::new("effective_stake");
    pub const TOTAL_EFFECTIVE_STAKE: FieldKey = FieldKey::new("total_effective_stake");
    pub const TOTAL_SUPPLY: FieldKey = FieldKey::new("total_supply");
    pub const INFLATION_RATE: FieldKey = FieldKey::new("inflation_interval_rate");
    pub const ODAO_SIZE: FieldKey = FieldKey::new("odao_size");
    pub const NODE_OPERATOR_SHARE: FieldKey = FieldKey::new("node_operator_share");
    pub const TRUSTED_OPERATOR_SHARE: FieldKey = FieldKey::new("trusted_operator_share");
}

/// Fetch the twelve rewards inputs for `node` concurrently.
///
/// Every read runs to completion; if any failed, all failures are reported
/// together as `ResolveError::Partial`.
///
/// # Errors
/// Returns `DomainError::Resolve` on any failed read or on timeout.
#[instrument(skip(caller, resolver), fields(node = %node))]
pub async fn get_reward_inputs(
    caller: Arc<dyn ContractCaller>,
    resolver: &Resolver,
    node: Address,
) -> Result<RewardInputs, DomainError> {
    use rewards_fields::{
        CUMULATIVE_REWARDS, CUMULATIVE_TRUSTED_REWARDS, EFFECTIVE_STAKE, INFLATION_RATE, INTERVAL,
        NODE_OPERATOR_SHARE, ODAO_SIZE, PERIOD_START, TOTAL_EFFECTIVE_STAKE, TOTAL_SUPPLY,
        TRUSTED, TRUSTED_OPERATOR_SHARE,
    };

    let trusted_nodes = ContractRef::named(TRUSTED_NODES_CONTRACT);
    let rewards_pool = ContractRef::named(REWARDS_POOL_CONTRACT);
    let staking = ContractRef::named(NODE_STAKING_CONTRACT);
    let token = ContractRef::named(RPL_TOKEN_CONTRACT);
    let node_arg = || vec![Value::from(node)];

    let mut reads: Reads<RewardInputs> = Reads::new(caller);
    reads
        .read(
            TRUSTED,
            &trusted_nodes,
            "getMemberExists",
            node_arg(),
            "node trusted status",
            |r: &mut RewardInputs, v| r.trusted = v,
        )
        .read(
            CUMULATIVE_REWARDS,
            &rewards_pool,
            "getNodeLifetimeRewards",
            node_arg(),
            "node lifetime rewards",
            |r: &mut RewardInputs, v| r.cumulative_rewards = v,
        )
        .read(
            CUMULATIVE_TRUSTED_REWARDS,
            &rewards_pool,
            "getTrustedNodeLifetimeRewards",
            node_arg(),
            "trusted node lifetime rewards",
            |r: &mut RewardInputs, v| r.cumulative_trusted_rewards = v,
        )
        .read(
            PERIOD_START,
            &rewards_pool,
            "getClaimIntervalTimeStart",
            vec![],
            "claim interval start",
            |r: &mut RewardInputs, v| r.period_start = v,
        )
        .read(
            INTERVAL,
            &rewards_pool,
            "getClaimIntervalTime",
            vec![],
            "claim interval time",
            |r: &mut RewardInputs, v| r.interval_secs = v,
        )
        .read(
            EFFECTIVE_STAKE,
            &staking,
            "getNodeEffectiveRPLStake",
            node_arg(),
            "node effective RPL stake",
            |r: &mut RewardInputs, v| r.effective_stake = v,
        )
        .read(
            TOTAL_EFFECTIVE_STAKE,
            &staking,
            "getTotalEffectiveRPLStake",
            vec![],
            "total effective RPL stake",
            |r: &mut RewardInputs, v| r.total_effective_stake = v,
        )
        .read(
            TOTAL_SUPPLY,
            &token,
            "totalSupply",
            vec![],
            "RPL total supply",
            |r: &mut RewardInputs, v| r.total_supply = v,
        )
        .read(
            INFLATION_RATE,
            &token,
            "getInflationIntervalRate",
            vec![],
            "RPL inflation interval rate",
            |r: &mut RewardInputs, v| r.inflation_interval_rate = v,
        )
        .read(
            ODAO_SIZE,
            &trusted_nodes,
            "getMemberCount",
            vec![],
            "oracle DAO member count",
            |r: &mut RewardInputs, v| r.odao_size = v,
        )
        .read(
            NODE_OPERATOR_SHARE,
            &rewards_pool,
            "getClaimingContractPerc",
            vec![Value::from(NODE_CLAIM_CONTRACT)],
            "node operator rewards percent",
            |r: &mut RewardInputs, v| r.node_operator_share = v,
        )
        .read(
            TRUSTED_OPERATOR_SHARE,
            &rewards_pool,
            "getClaimingContractPerc",
            vec![Value::from(TRUSTED_NODE_CLAIM_CONTRACT)],
            "trusted node operator rewards percent",
            |r: &mut RewardInputs, v| r.trusted_operator_share = v,
        );

    let mut inputs = RewardInputs::default();
    resolver
        .resolve(reads.into_set(), &mut inputs, FailurePolicy::CollectAll)
        .await?
        .into_result()?;
    Ok(inputs)
}

/// Fetch the rewards inputs for `node` and derive the estimate at `now_unix`.
///
/// # Errors
/// See [`get_reward_inputs`].
pub async fn get_rewards(
    caller: Arc<dyn ContractCaller>,
    resolver: &Resolver,
    node: Address,
    now_unix: u64,
) -> Result<NodeRewards, DomainError> {
    let inputs = get_reward_inputs(caller, resolver, node).await?;
    let rewards = estimate(&inputs, now_unix);
    tracing::debug!(
        estimated = rewards.estimated_rewards,
        estimated_trusted = rewards.estimated_trusted_rewards,
        "estimated node rewards"
    );
    Ok(rewards)
}

/// Derive the rewards summary from fetched inputs.
///
/// The next-checkpoint pool is `(rate ^ interval_days - 1) * supply`: the
/// per-day inflation factor compounded over the interval.
#[allow(clippy::cast_precision_loss)]
pub fn estimate(inputs: &RewardInputs, now_unix: u64) -> NodeRewards {
    let checkpoint = inputs.period_start.saturating_add(inputs.interval_secs);
    let time_to_checkpoint_secs = signed(checkpoint).saturating_sub(signed(now_unix));

    let interval_days = inputs.interval_secs as f64 / SECONDS_PER_DAY;
    let inflation_per_day = wei_to_eth(inputs.inflation_interval_rate);
    let pool = (inflation_per_day.powf(interval_days) - 1.0) * wei_to_eth(inputs.total_supply);

    let estimated_rewards = if inputs.total_effective_stake > 0 {
        wei_to_eth(inputs.effective_stake) / wei_to_eth(inputs.total_effective_stake)
            * pool
            * wei_to_eth(inputs.node_operator_share)
    } else {
        0.0
    };

    let estimated_trusted_rewards = if inputs.trusted && inputs.odao_size > 0 {
        pool * wei_to_eth(inputs.trusted_operator_share) / inputs.odao_size as f64
    } else {
        0.0
    };

    NodeRewards {
        trusted: inputs.trusted,
        cumulative_rewards: wei_to_eth(inputs.cumulative_rewards),
        cumulative_trusted_rewards: wei_to_eth(inputs.cumulative_trusted_rewards),
        time_to_checkpoint_secs,
        estimated_rewards,
        estimated_trusted_rewards,
    }
}

fn signed(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
