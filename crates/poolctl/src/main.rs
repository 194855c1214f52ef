use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use poolctl_domain::consensus::incompatibility_note;
use poolctl_domain::{ConsensusClient, HardwareProfile, compatible, select_random};
use poolctl_ledger::{Address, ContractCaller, MemoryLedger};
use poolctl_resolver::Resolver;

mod config;
mod logging;

use config::{Overrides, PoolctlConfig};
use logging::LogLevel;

/// poolctl - operator client for staking-pool minipools and node rewards
#[derive(Parser)]
#[command(name = "poolctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.poolctl/config.json)
    #[arg(long, global = true, env = "POOLCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger snapshot to serve contract reads from
    #[arg(long, global = true, env = "POOLCTL_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Abort a resolution run after this many milliseconds
    #[arg(long, global = true, env = "POOLCTL_DEADLINE_MS")]
    deadline_ms: Option<u64>,

    /// Latency added to every ledger call, in milliseconds
    #[arg(long, global = true, env = "POOLCTL_CALL_LATENCY_MS")]
    call_latency_ms: Option<u64>,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Minipool queries
    Minipool {
        #[command(subcommand)]
        command: MinipoolCommand,
    },

    /// Node queries
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },

    /// Debugging and troubleshooting commands
    Debug {
        #[command(subcommand)]
        command: DebugCommand,
    },

    /// Client configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum MinipoolCommand {
    /// Full details of one minipool
    Details { address: Address },

    /// Status and validator pubkey of one minipool
    Status { address: Address },
}

#[derive(Subcommand)]
enum NodeCommand {
    /// Lifetime rewards and the estimate for the next checkpoint
    Rewards {
        /// Node address (default: node_address from config)
        #[arg(long)]
        node: Option<Address>,
    },
}

#[derive(Subcommand)]
enum DebugCommand {
    /// Export a TSV of the node's validators
    #[command(alias = "x")]
    ExportValidators {
        /// Node address (default: node_address from config)
        #[arg(long)]
        node: Option<Address>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// List consensus clients compatible with this machine
    ConsensusClients {
        /// Client ruled out by the execution client (repeatable)
        #[arg(long = "exclude")]
        excluded: Vec<ConsensusClient>,

        /// Client ruled out by the fallback execution client (repeatable)
        #[arg(long = "exclude-fallback")]
        excluded_fallback: Vec<ConsensusClient>,

        /// Pick one client at random instead of listing them
        #[arg(long)]
        random: bool,

        /// Seed for --random
        #[arg(long, requires = "random")]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct ClientEntry {
    id: &'static str,
    name: &'static str,
    description: String,
}

#[derive(Serialize)]
struct ClientListing {
    hardware: HardwareProfile,
    clients: Vec<ClientEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Serialize)]
struct ClientSelection {
    hardware: HardwareProfile,
    selected: ClientEntry,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PoolctlConfig::load(cli.config.as_deref())?.merge(Overrides {
        snapshot: cli.snapshot,
        deadline_ms: cli.deadline_ms,
        call_latency_ms: cli.call_latency_ms,
    });

    match cli.command {
        Commands::Minipool { command } => {
            let (caller, resolver) = connect(&config).await?;
            match command {
                MinipoolCommand::Details { address } => {
                    let details = poolctl_domain::get_details(caller, &resolver, address)
                        .await
                        .with_context(|| format!("failed to get details for minipool {address}"))?;
                    print_json(&details)
                }
                MinipoolCommand::Status { address } => {
                    let status = poolctl_domain::get_status(caller, &resolver, address)
                        .await
                        .with_context(|| format!("failed to get status for minipool {address}"))?;
                    print_json(&status)
                }
            }
        }
        Commands::Node {
            command: NodeCommand::Rewards { node },
        } => {
            let node = config.node(node)?;
            let (caller, resolver) = connect(&config).await?;
            let rewards = poolctl_domain::get_rewards(caller, &resolver, node, now_unix()?)
                .await
                .with_context(|| format!("failed to get rewards for node {node}"))?;
            print_json(&rewards)
        }
        Commands::Debug {
            command: DebugCommand::ExportValidators { node },
        } => {
            let node = config.node(node)?;
            let (caller, resolver) = connect(&config).await?;
            let rows = poolctl_domain::export_validators(caller, &resolver, node)
                .await
                .context("failed to export validators")?;
            poolctl_domain::write_tsv(&rows, std::io::stdout().lock())?;
            Ok(())
        }
        Commands::Config {
            command:
                ConfigCommand::ConsensusClients {
                    excluded,
                    excluded_fallback,
                    random,
                    seed,
                },
        } => consensus_clients(&excluded, &excluded_fallback, random, seed),
    }
}

/// Open the snapshot-backed ledger and a resolver configured from `config`.
async fn connect(config: &PoolctlConfig) -> Result<(Arc<dyn ContractCaller>, Resolver)> {
    let path = config.snapshot_path()?;
    let ledger = MemoryLedger::load(path, config.ledger_config())
        .await
        .with_context(|| format!("failed to load ledger snapshot: {}", path.display()))?;
    tracing::info!(snapshot = %path.display(), "ledger ready");
    Ok((Arc::new(ledger), Resolver::new(config.resolver_config())))
}

fn consensus_clients(
    excluded: &[ConsensusClient],
    excluded_fallback: &[ConsensusClient],
    random: bool,
    seed: Option<u64>,
) -> Result<()> {
    let hardware = HardwareProfile::detect();
    let ruled_out: Vec<ConsensusClient> =
        excluded.iter().chain(excluded_fallback).copied().collect();
    let options = compatible(&ruled_out);
    let entry = |client: ConsensusClient| ClientEntry {
        id: client.id(),
        name: client.name(),
        description: client.augmented_description(&hardware),
    };

    if random {
        let client = match seed {
            Some(seed) => select_random(&options, &hardware, &mut StdRng::seed_from_u64(seed)),
            None => select_random(&options, &hardware, &mut rand::rng()),
        }?;
        return print_json(&ClientSelection {
            selected: entry(client),
            hardware: hardware.clone(),
        });
    }

    print_json(&ClientListing {
        clients: options.into_iter().map(entry).collect(),
        note: incompatibility_note(excluded, excluded_fallback),
        hardware: hardware.clone(),
    })
}

fn now_unix() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_secs())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
