use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use poolctl_ledger::{Address, MemoryLedgerConfig};
use poolctl_resolver::ResolverConfig;

const CONFIG_DIR: &str = ".poolctl";
const CONFIG_FILE: &str = "config.json";

/// On-disk configuration. Every field is optional; flags override it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolctlConfig {
    /// Ledger snapshot the in-memory backend serves.
    pub snapshot: Option<PathBuf>,
    /// Node account used by node-scoped commands.
    pub node_address: Option<Address>,
    /// Deadline for one resolution run, in milliseconds.
    pub deadline_ms: Option<u64>,
    /// Latency injected into every ledger call, in milliseconds.
    pub call_latency_ms: Option<u64>,
}

impl PoolctlConfig {
    /// `~/.poolctl/config.json`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path` if given, else from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the empty
    /// configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply command-line overrides on top of the file values.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if overrides.snapshot.is_some() {
            self.snapshot = overrides.snapshot;
        }
        if overrides.deadline_ms.is_some() {
            self.deadline_ms = overrides.deadline_ms;
        }
        if overrides.call_latency_ms.is_some() {
            self.call_latency_ms = overrides.call_latency_ms;
        }
        self
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn ledger_config(&self) -> MemoryLedgerConfig {
        MemoryLedgerConfig {
            call_latency: self.call_latency_ms.map(Duration::from_millis),
        }
    }

    pub fn snapshot_path(&self) -> Result<&Path> {
        self.snapshot
            .as_deref()
            .context("no ledger snapshot configured; pass --snapshot or set \"snapshot\" in the config file")
    }

    /// The node to query: an explicit address, else the configured one.
    pub fn node(&self, explicit: Option<Address>) -> Result<Address> {
        explicit
            .or(self.node_address)
            .context("no node address; pass --node or set \"node_address\" in the config file")
    }
}

/// Values given on the command line or through `POOLCTL_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub snapshot: Option<PathBuf>,
    pub deadline_ms: Option<u64>,
    pub call_latency_ms: Option<u64>,
}
