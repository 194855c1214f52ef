use std::io::Write;
use std::sync::Arc;

use futures::future::try_join_all;
use poolctl_ledger::{Address, ContractCaller, ContractRef, Value, call};
use poolctl_resolver::Resolver;
use tracing::instrument;

use crate::error::DomainError;
use crate::minipool::{MinipoolStatus, ValidatorPubkey, get_status};

pub const MINIPOOL_MANAGER_CONTRACT: &str = "rocketMinipoolManager";

/// One line of the validator export.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidatorRow {
    pub minipool: Address,
    pub status: MinipoolStatus,
    pub validator_pubkey: ValidatorPubkey,
}

/// List the node's minipools and resolve each one's validator key.
/// Minipools are resolved concurrently; the first failure aborts the export.
///
/// # Errors
/// Returns the minipool listing error or the first failing minipool's error.
#[instrument(skip(caller, resolver), fields(node = %node))]
pub async fn export_validators(
    caller: Arc<dyn ContractCaller>,
    resolver: &Resolver,
    node: Address,
) -> Result<Vec<ValidatorRow>, DomainError> {
    let manager = ContractRef::named(MINIPOOL_MANAGER_CONTRACT);
    let minipools: Vec<Address> = call(
        caller.as_ref(),
        &manager,
        "getNodeMinipools",
        &[Value::from(node)],
    )
    .await?;

    tracing::debug!(count = minipools.len(), "listed node minipools");

    let rows = try_join_all(minipools.into_iter().map(|minipool| {
        let caller = caller.clone();
        async move {
            let status = get_status(caller, resolver, minipool).await?;
            Ok::<_, DomainError>(ValidatorRow {
                minipool,
                status: status.status_type,
                validator_pubkey: status.validator_pubkey,
            })
        }
    }))
    .await?;

    tracing::info!(validators = rows.len(), "exported validators");
    Ok(rows)
}

/// Write rows as tab-separated `minipool`, `status`, `validator_pubkey`
/// with a header line.
///
/// # Errors
/// Propagates write errors.
pub fn write_tsv<W: Write>(rows: &[ValidatorRow], mut out: W) -> Result<(), DomainError> {
    writeln!(out, "minipool\tstatus\tvalidator_pubkey")?;
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}",
            row.minipool, row.status, row.validator_pubkey
        )?;
    }
    out.flush()?;
    Ok(())
}
