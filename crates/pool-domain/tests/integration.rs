use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use poolctl_domain::minipool::{MINIPOOL_CONTRACT, TOKEN_CONTRACT, details_fields, status_fields};
use poolctl_domain::rewards::{
    NODE_STAKING_CONTRACT, REWARDS_POOL_CONTRACT, RPL_TOKEN_CONTRACT, TRUSTED_NODES_CONTRACT,
    rewards_fields,
};
use poolctl_domain::{
    DomainError, MinipoolStatus, export::MINIPOOL_MANAGER_CONTRACT, export_validators,
    get_details, get_reward_inputs, get_rewards, get_status,
};
use poolctl_ledger::{Address, ContractCaller, ContractRef, MemoryLedger, MemoryLedgerConfig, Value};
use poolctl_resolver::{ResolveError, Resolver, ResolverConfig};

const ETH: u128 = 1_000_000_000_000_000_000;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn deposit_input(fill: u8) -> Value {
    let mut input = vec![0u8; 4];
    input.extend(std::iter::repeat_n(fill, 48));
    input.extend([0u8; 8]);
    Value::Bytes(Bytes::from(input))
}

async fn seed_minipool(ledger: &MemoryLedger, minipool: Address, fill: u8) {
    let contract = ContractRef::at(MINIPOOL_CONTRACT, minipool);
    let token = ContractRef::named(TOKEN_CONTRACT);
    ledger.set(&contract, "getStatus", vec![], 2u64).await;
    ledger.set(&contract, "getStatusChangedTime", vec![], 1_600_000_000u64).await;
    ledger.set(&contract, "getStatusChangedBlock", vec![], 11_000_000u64).await;
    ledger.set(&contract, "getStakingDurationID", vec![], "6m").await;
    ledger.set(&contract, "getStakingDuration", vec![], 1_036_800u64).await;
    ledger.set(&contract, "getNodeBalance", vec![], 16 * ETH).await;
    ledger.set(&token, "balanceOf", vec![minipool.into()], 2 * ETH).await;
    ledger.set(&contract, "getUserCount", vec![], 3u64).await;
    ledger.set(&contract, "getUserDepositCapacity", vec![], 16 * ETH).await;
    ledger.set(&contract, "getUserDepositTotal", vec![], 12 * ETH).await;
    ledger.set(&contract, "getDepositInput", vec![], deposit_input(fill)).await;
}

async fn seed_rewards(ledger: &MemoryLedger, node: Address) {
    let trusted = ContractRef::named(TRUSTED_NODES_CONTRACT);
    let pool = ContractRef::named(REWARDS_POOL_CONTRACT);
    let staking = ContractRef::named(NODE_STAKING_CONTRACT);
    let token = ContractRef::named(RPL_TOKEN_CONTRACT);
    let n = || vec![Value::from(node)];

    ledger.set(&trusted, "getMemberExists", n(), true).await;
    ledger.set(&pool, "getNodeLifetimeRewards", n(), 40 * ETH).await;
    ledger.set(&pool, "getTrustedNodeLifetimeRewards", n(), 10 * ETH).await;
    ledger.set(&pool, "getClaimIntervalTimeStart", vec![], 1_000u64).await;
    ledger.set(&pool, "getClaimIntervalTime", vec![], 86_400u64).await;
    ledger.set(&staking, "getNodeEffectiveRPLStake", n(), 25 * ETH).await;
    ledger.set(&staking, "getTotalEffectiveRPLStake", vec![], 100 * ETH).await;
    ledger.set(&token, "totalSupply", vec![], 100 * ETH).await;
    ledger.set(&token, "getInflationIntervalRate", vec![], 2 * ETH).await;
    ledger.set(&trusted, "getMemberCount", vec![], 4u64).await;
    ledger
        .set(
            &pool,
            "getClaimingContractPerc",
            vec!["rocketClaimNode".into()],
            700_000_000_000_000_000u128,
        )
        .await;
    ledger
        .set(
            &pool,
            "getClaimingContractPerc",
            vec!["rocketClaimTrustedNode".into()],
            200_000_000_000_000_000u128,
        )
        .await;
}

fn as_caller(ledger: &Arc<MemoryLedger>) -> Arc<dyn ContractCaller> {
    ledger.clone()
}

async fn wait_for_quiescence(resolver: &Resolver, grace: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < grace {
        if resolver.live_workers() == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    resolver.live_workers() == 0
}

// --- Tests ---

#[tokio::test]
async fn minipool_details_resolve_every_field() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_minipool(&ledger, addr(0xaa), 0x11).await;
    let resolver = Resolver::default();

    let details = get_details(as_caller(&ledger), &resolver, addr(0xaa))
        .await
        .unwrap();

    assert_eq!(details.address, addr(0xaa));
    assert_eq!(details.status, 2);
    assert_eq!(details.status_type, MinipoolStatus::Staking);
    assert_eq!(details.status_changed_at, 1_600_000_000);
    assert_eq!(details.staking_duration_id, "6m");
    assert_eq!(details.node_ether_balance_wei, 16 * ETH);
    assert_eq!(details.node_rpl_balance_wei, 2 * ETH);
    assert_eq!(details.user_count, 3);
    assert_eq!(details.user_deposit_capacity_wei, 16 * ETH);
    assert_eq!(details.user_deposit_total_wei, 12 * ETH);
    assert_eq!(ledger.call_count(), 8);
}

#[tokio::test]
async fn minipool_details_fail_on_any_revert() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_minipool(&ledger, addr(0xaa), 0x11).await;
    ledger
        .revert(
            &ContractRef::at(MINIPOOL_CONTRACT, addr(0xaa)),
            "getUserCount",
            vec![],
            "execution reverted",
        )
        .await;
    let resolver = Resolver::default();

    let err = get_details(as_caller(&ledger), &resolver, addr(0xaa))
        .await
        .unwrap_err();

    match &err {
        DomainError::Resolve(e) => assert_eq!(e.field(), Some(details_fields::USER_COUNT)),
        other => panic!("expected resolve error, got {other:?}"),
    }
    let chain = format!("{:?}", error_chain(&err));
    assert!(chain.contains("retrieving minipool user count"));
    assert!(chain.contains("execution reverted"));
}

#[tokio::test]
async fn fail_fast_returns_before_slow_reads() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
        call_latency: Some(Duration::from_millis(200)),
    }));
    seed_minipool(&ledger, addr(0xaa), 0x11).await;
    ledger
        .revert(
            &ContractRef::at(MINIPOOL_CONTRACT, addr(0xaa)),
            "getStatus",
            vec![],
            "bad minipool",
        )
        .await;
    ledger.set_latency("getStatus", Duration::ZERO).await;
    let resolver = Resolver::default();

    let start = Instant::now();
    let err = get_details(as_caller(&ledger), &resolver, addr(0xaa))
        .await
        .unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(150));
    assert!(matches!(
        err,
        DomainError::Resolve(ResolveError::Task { field, .. }) if field == details_fields::STATUS
    ));
    assert!(wait_for_quiescence(&resolver, Duration::from_millis(150)).await);
}

#[tokio::test]
async fn minipool_status_extracts_pubkey() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_minipool(&ledger, addr(0xbb), 0x42).await;
    let resolver = Resolver::default();

    let status = get_status(as_caller(&ledger), &resolver, addr(0xbb))
        .await
        .unwrap();

    assert_eq!(status.status_type, MinipoolStatus::Staking);
    assert_eq!(status.status_changed_block, 11_000_000);
    assert_eq!(status.staking_duration, 1_036_800);
    assert_eq!(status.validator_pubkey.to_string(), "42".repeat(48));
}

#[tokio::test]
async fn short_deposit_input_fails_pubkey_field() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_minipool(&ledger, addr(0xbb), 0x42).await;
    ledger
        .set(
            &ContractRef::at(MINIPOOL_CONTRACT, addr(0xbb)),
            "getDepositInput",
            vec![],
            Value::Bytes(Bytes::from(vec![0u8; 51])),
        )
        .await;
    let resolver = Resolver::default();

    let err = get_status(as_caller(&ledger), &resolver, addr(0xbb))
        .await
        .unwrap_err();
    match err {
        DomainError::Resolve(e) => {
            assert_eq!(e.field(), Some(status_fields::VALIDATOR_PUBKEY));
        }
        other => panic!("expected resolve error, got {other:?}"),
    }
}

#[tokio::test]
async fn rewards_estimate_from_ledger() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_rewards(&ledger, addr(0x01)).await;
    let resolver = Resolver::default();

    let rewards = get_rewards(as_caller(&ledger), &resolver, addr(0x01), 2_000)
        .await
        .unwrap();

    assert!(rewards.trusted);
    assert!((rewards.cumulative_rewards - 40.0).abs() < 1e-9);
    assert!((rewards.cumulative_trusted_rewards - 10.0).abs() < 1e-9);
    assert_eq!(rewards.time_to_checkpoint_secs, 85_400);
    // pool = (2^1 - 1) * 100 = 100
    assert!((rewards.estimated_rewards - 17.5).abs() < 1e-9);
    assert!((rewards.estimated_trusted_rewards - 5.0).abs() < 1e-9);
    assert_eq!(ledger.call_count(), 12);
}

#[tokio::test]
async fn rewards_report_every_failed_read() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_rewards(&ledger, addr(0x01)).await;
    ledger
        .revert(
            &ContractRef::named(RPL_TOKEN_CONTRACT),
            "totalSupply",
            vec![],
            "paused",
        )
        .await;
    ledger
        .revert(
            &ContractRef::named(TRUSTED_NODES_CONTRACT),
            "getMemberCount",
            vec![],
            "paused",
        )
        .await;
    let resolver = Resolver::default();

    let err = get_reward_inputs(as_caller(&ledger), &resolver, addr(0x01))
        .await
        .unwrap_err();

    match err {
        DomainError::Resolve(ResolveError::Partial(errors)) => {
            let keys: Vec<_> = errors.keys().collect();
            assert_eq!(keys.len(), 2);
            assert!(errors.contains(rewards_fields::TOTAL_SUPPLY));
            assert!(errors.contains(rewards_fields::ODAO_SIZE));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    // Collect-all still ran every read.
    assert_eq!(ledger.call_count(), 12);
}

#[tokio::test]
async fn rewards_with_zero_total_stake() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_rewards(&ledger, addr(0x01)).await;
    let staking = ContractRef::named(NODE_STAKING_CONTRACT);
    ledger
        .set(&staking, "getNodeEffectiveRPLStake", vec![addr(0x01).into()], 0u128)
        .await;
    ledger
        .set(&staking, "getTotalEffectiveRPLStake", vec![], 0u128)
        .await;
    let resolver = Resolver::default();

    let rewards = get_rewards(as_caller(&ledger), &resolver, addr(0x01), 2_000)
        .await
        .unwrap();
    assert!(rewards.estimated_rewards.abs() < f64::EPSILON);
}

#[tokio::test]
async fn rewards_time_out_on_stalled_read() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    seed_rewards(&ledger, addr(0x01)).await;
    ledger
        .set_latency("getInflationIntervalRate", Duration::from_secs(5))
        .await;
    let resolver = Resolver::new(ResolverConfig {
        deadline: Some(Duration::from_millis(50)),
    });

    let start = Instant::now();
    let err = get_reward_inputs(as_caller(&ledger), &resolver, addr(0x01))
        .await
        .unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(1));

    match err {
        DomainError::Resolve(ResolveError::Timeout { pending, .. }) => {
            assert_eq!(pending, vec![rewards_fields::INFLATION_RATE]);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(wait_for_quiescence(&resolver, Duration::from_millis(200)).await);
}

#[tokio::test]
async fn export_lists_every_minipool() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig {
        call_latency: Some(Duration::from_millis(5)),
    }));
    let node = addr(0x01);
    ledger
        .set(
            &ContractRef::named(MINIPOOL_MANAGER_CONTRACT),
            "getNodeMinipools",
            vec![node.into()],
            Value::Array(vec![addr(0xaa).into(), addr(0xbb).into()]),
        )
        .await;
    seed_minipool(&ledger, addr(0xaa), 0x11).await;
    seed_minipool(&ledger, addr(0xbb), 0x22).await;
    let resolver = Resolver::default();

    let rows = export_validators(as_caller(&ledger), &resolver, node)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].minipool, addr(0xaa));
    assert_eq!(rows[0].validator_pubkey.to_string(), "11".repeat(48));
    assert_eq!(rows[1].minipool, addr(0xbb));
    assert_eq!(rows[1].validator_pubkey.to_string(), "22".repeat(48));

    let mut tsv = Vec::new();
    poolctl_domain::write_tsv(&rows, &mut tsv).unwrap();
    assert_eq!(String::from_utf8(tsv).unwrap().lines().count(), 3);
}

#[tokio::test]
async fn export_aborts_on_failing_minipool() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    let node = addr(0x01);
    ledger
        .set(
            &ContractRef::named(MINIPOOL_MANAGER_CONTRACT),
            "getNodeMinipools",
            vec![node.into()],
            Value::Array(vec![addr(0xaa).into(), addr(0xbb).into()]),
        )
        .await;
    seed_minipool(&ledger, addr(0xaa), 0x11).await;
    seed_minipool(&ledger, addr(0xbb), 0x22).await;
    ledger
        .revert(
            &ContractRef::at(MINIPOOL_CONTRACT, addr(0xbb)),
            "getStakingDuration",
            vec![],
            "gone",
        )
        .await;
    let resolver = Resolver::default();

    let err = export_validators(as_caller(&ledger), &resolver, node)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Resolve(ResolveError::Task { .. })));
}

#[tokio::test]
async fn export_with_unknown_manager_fails() {
    let ledger = Arc::new(MemoryLedger::new(MemoryLedgerConfig::default()));
    let resolver = Resolver::default();
    let err = export_validators(as_caller(&ledger), &resolver, addr(0x01))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Call(_)));
}

/// Render an error and its sources, outermost first.
fn error_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(e) = source {
        chain.push(e.to_string());
        source = e.source();
    }
    chain
}
