use rand::Rng;
use rand::seq::IndexedRandom;
use sysinfo::System;

use crate::error::DomainError;

/// Machines under this much RAM are treated as low-power.
pub const LOW_POWER_MEMORY_GB: u64 = 15;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Consensus (beacon chain) clients a node can run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusClient {
    Lighthouse,
    Lodestar,
    Nimbus,
    Prysm,
    Teku,
}

struct ClientInfo {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    resource_warning: Option<&'static str>,
}

impl ConsensusClient {
    pub const ALL: [Self; 5] = [
        Self::Lighthouse,
        Self::Lodestar,
        Self::Nimbus,
        Self::Prysm,
        Self::Teku,
    ];

    fn info(self) -> &'static ClientInfo {
        match self {
            Self::Lighthouse => &ClientInfo {
                id: "lighthouse",
                name: "Lighthouse",
                description: "Lighthouse is a consensus client with a heavy focus on speed and security, written in Rust by Sigma Prime.",
                resource_warning: None,
            },
            Self::Lodestar => &ClientInfo {
                id: "lodestar",
                name: "Lodestar",
                description: "Lodestar is a TypeScript consensus client maintained by ChainSafe, aimed at accessibility and light clients.",
                resource_warning: None,
            },
            Self::Nimbus => &ClientInfo {
                id: "nimbus",
                name: "Nimbus",
                description: "Nimbus is a consensus client written in Nim, built to run well on small devices with minimal resource use.",
                resource_warning: None,
            },
            Self::Prysm => &ClientInfo {
                id: "prysm",
                name: "Prysm",
                description: "Prysm is a Go consensus client developed by Prysmatic Labs, focused on usability and reliability.",
                resource_warning: None,
            },
            Self::Teku => &ClientInfo {
                id: "teku",
                name: "Teku",
                description: "Teku is a Java consensus client built by ConsenSys for institutional staking, with a rich feature set.",
                resource_warning: Some(
                    "WARNING: Teku is a resource-heavy client and will likely not perform well on your system given your CPU power or amount of available RAM. We recommend you pick a lighter client instead.",
                ),
            },
        }
    }

    pub fn id(self) -> &'static str {
        self.info().id
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn description(self) -> &'static str {
        self.info().description
    }

    /// True for clients that should not be picked on low-power hardware.
    pub fn is_resource_heavy(self) -> bool {
        self.info().resource_warning.is_some()
    }

    /// Description including the resource warning when it applies to
    /// `hardware`.
    pub fn augmented_description(self, hardware: &HardwareProfile) -> String {
        let info = self.info();
        match info.resource_warning {
            Some(warning) if hardware.is_low_power() => {
                format!("{}\n\n{warning}", info.description)
            }
            _ => info.description.to_string(),
        }
    }
}

impl std::fmt::Display for ConsensusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ConsensusClient {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownClient(s.to_string()))
    }
}

/// The host facts client selection depends on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HardwareProfile {
    pub total_memory_gb: u64,
    pub arch: String,
}

impl HardwareProfile {
    /// Probe the current machine.
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        let profile = Self {
            total_memory_gb: system.total_memory() / BYTES_PER_GB,
            arch: std::env::consts::ARCH.to_string(),
        };
        tracing::debug!(
            memory_gb = profile.total_memory_gb,
            arch = %profile.arch,
            "detected hardware"
        );
        profile
    }

    pub fn is_low_power(&self) -> bool {
        self.total_memory_gb < LOW_POWER_MEMORY_GB || self.arch == "aarch64"
    }
}

/// All clients not listed in `incompatible`, in catalog order.
pub fn compatible(incompatible: &[ConsensusClient]) -> Vec<ConsensusClient> {
    ConsensusClient::ALL
        .into_iter()
        .filter(|c| !incompatible.contains(c))
        .collect()
}

/// User-facing note naming the clients ruled out by the execution client,
/// or failing that, by the fallback execution client.
pub fn incompatibility_note(
    incompatible: &[ConsensusClient],
    incompatible_fallback: &[ConsensusClient],
) -> Option<String> {
    let (clients, which) = if !incompatible.is_empty() {
        (incompatible, "Execution client")
    } else if !incompatible_fallback.is_empty() {
        (incompatible_fallback, "fallback Execution client")
    } else {
        return None;
    };
    let names: Vec<&str> = clients.iter().map(|c| c.name()).collect();
    Some(format!(
        "NOTE: The following clients are incompatible with your choice of {which}: {}",
        names.join(", ")
    ))
}

/// Pick one of `options` uniformly at random, skipping resource-heavy
/// clients on low-power hardware.
///
/// # Errors
/// Returns `DomainError::NoCompatibleClient` if nothing is left to pick from.
pub fn select_random<R: Rng + ?Sized>(
    options: &[ConsensusClient],
    hardware: &HardwareProfile,
    rng: &mut R,
) -> Result<ConsensusClient, DomainError> {
    let low_power = hardware.is_low_power();
    let candidates: Vec<ConsensusClient> = options
        .iter()
        .copied()
        .filter(|c| !(low_power && c.is_resource_heavy()))
        .collect();

    let choice = candidates
        .choose(rng)
        .copied()
        .ok_or(DomainError::NoCompatibleClient)?;
    tracing::debug!(client = %choice, candidates = candidates.len(), "selected random client");
    Ok(choice)
}
