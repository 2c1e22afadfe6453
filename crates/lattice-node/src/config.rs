use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use lattice_admission::LimiterConfig;
use lattice_consensus::VoteSchemeKind;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Members sampled per block
    pub committee_size: usize,

    /// Distinct votes required; capped at the sampled committee size
    pub quorum_threshold: usize,

    /// Signing scheme committee members vote with
    #[serde(default)]
    pub vote_scheme: VoteSchemeKind,

    /// Per-account admission limiter
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Accounts registered at startup
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub initial_balances: Vec<BalanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account_id: String,
    pub balance: u128,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            committee_size: 7,
            quorum_threshold: 5,
            vote_scheme: VoteSchemeKind::Hash,
            limiter: LimiterConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.committee_size == 0 {
            return Err(ConfigError::Invalid("committee_size must be at least 1".into()));
        }
        if self.quorum_threshold == 0 {
            return Err(ConfigError::Invalid("quorum_threshold must be at least 1".into()));
        }
        if self.limiter.enabled {
            let LimiterConfig {
                capacity,
                refill_rate,
                ..
            } = self.limiter;
            if !capacity.is_finite() || capacity < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "limiter capacity must be finite and at least 1, got {}",
                    capacity
                )));
            }
            if !refill_rate.is_finite() || refill_rate < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "limiter refill_rate must be finite and non-negative, got {}",
                    refill_rate
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for entry in &self.genesis.initial_balances {
            if !seen.insert(entry.account_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate genesis account {}",
                    entry.account_id
                )));
            }
        }
        Ok(())
    }

    /// Builder-style genesis helper
    pub fn with_account(mut self, account_id: &str, balance: u128) -> Self {
        self.genesis.initial_balances.push(BalanceEntry {
            account_id: account_id.to_string(),
            balance,
        });
        self
    }
}

/// Generate a sample configuration for local simulation
pub fn generate_sample_config() -> NodeConfig {
    let names = [
        "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy",
    ];

    NodeConfig {
        genesis: GenesisConfig {
            initial_balances: names
                .iter()
                .map(|name| BalanceEntry {
                    account_id: name.to_string(),
                    balance: 1_000_000,
                })
                .collect(),
        },
        ..NodeConfig::default()
    }
}
