//! Configuration management for the settlement service
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use alloy_primitives::Address;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use crate::pool::DomainParams;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub relayers: Vec<Address>,
    #[serde(default)]
    pub service: ServiceConfig,
    pub domain: DomainConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
    #[serde(default)]
    pub collateral: CollateralConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            health_check_interval_secs: default_health_check_interval(),
            sweep_interval_secs: default_sweep_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// The chain this process runs
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub chain_id: u64,
    pub deployment_address: Address,
    pub is_hub: bool,
    pub hub_chain_id: u64,
    pub owner: Address,
    pub collateral_token: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_min_sync_interval")]
    pub min_sync_interval_secs: u64,
    #[serde(default = "default_message_expiry")]
    pub message_expiry_secs: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_sync_interval_secs: default_min_sync_interval(),
            message_expiry_secs: default_message_expiry(),
        }
    }
}

/// A remote deployment registered at boot
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub deployment_address: Address,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollateralConfig {
    /// Opening balances of the in-process token, by holder address
    #[serde(default)]
    pub genesis_balances: HashMap<String, u128>,
}

impl CollateralConfig {
    pub fn parsed_balances(&self) -> Result<Vec<(Address, u128)>> {
        self.genesis_balances
            .iter()
            .map(|(holder, amount)| {
                let address: Address = holder
                    .parse()
                    .with_context(|| format!("Invalid genesis holder address: {}", holder))?;
                Ok((address, *amount))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    10_000
}

fn default_min_sync_interval() -> u64 {
    300
}

fn default_message_expiry() -> u64 {
    3_600
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("TESSERACT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(raw: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(raw);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let domain = &self.domain;

        if domain.is_hub && domain.hub_chain_id != domain.chain_id {
            anyhow::bail!(
                "Hub chain {} must set hub_chain_id to itself (got {})",
                domain.chain_id,
                domain.hub_chain_id
            );
        }
        if !domain.is_hub && domain.hub_chain_id == domain.chain_id {
            anyhow::bail!("Spoke chain {} cannot be its own hub", domain.chain_id);
        }
        if domain.owner.is_zero() || domain.deployment_address.is_zero() {
            anyhow::bail!("Domain owner and deployment address must be set");
        }
        if self.protocol.min_sync_interval_secs == 0 {
            anyhow::bail!("min_sync_interval_secs must be greater than zero");
        }
        if self.protocol.message_expiry_secs == 0 {
            anyhow::bail!("message_expiry_secs must be greater than zero");
        }
        self.collateral.parsed_balances()?;

        let mut seen = HashSet::from([domain.chain_id]);
        for (name, chain) in &self.chains {
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain {} reuses chain id {}", name, chain.chain_id);
            }
            if chain.deployment_address.is_zero() {
                anyhow::bail!("Chain {} has no deployment address configured", name);
            }
        }

        if !domain.is_hub && self.get_chain_by_id(domain.hub_chain_id).is_none() {
            tracing::warn!(
                "Hub chain {} is not configured - spoke syncs will be rejected until it is registered",
                domain.hub_chain_id
            );
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }

    pub fn domain_params(&self) -> DomainParams {
        DomainParams {
            chain_id: self.domain.chain_id,
            deployment_address: self.domain.deployment_address,
            is_hub: self.domain.is_hub,
            hub_chain_id: self.domain.hub_chain_id,
            owner: self.domain.owner,
            min_sync_interval_secs: self.protocol.min_sync_interval_secs,
            message_expiry_secs: self.protocol.message_expiry_secs,
        }
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern");
    }

    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HUB_CONFIG: &str = r#"
relayers = ["0x2222222222222222222222222222222222222222"]

[domain]
chain_id = 1
deployment_address = "0x1111111111111111111111111111111111111111"
is_hub = true
hub_chain_id = 1
owner = "${TESSERACT_TEST_OWNER}"
collateral_token = "0xcccccccccccccccccccccccccccccccccccccccc"

[chains.arbitrum]
chain_id = 42161
name = "Arbitrum One"
deployment_address = "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
enabled = true

[chains.optimism]
chain_id = 10
name = "OP Mainnet"
deployment_address = "0xa2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2"
enabled = false

[collateral.genesis_balances]
"0x3333333333333333333333333333333333333333" = 1000000

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_hub_config_from_file() {
        env::set_var(
            "TESSERACT_TEST_OWNER",
            "0x0101010101010101010101010101010101010101",
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HUB_CONFIG.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.domain.owner, Address::repeat_byte(0x01));
        assert_eq!(settings.protocol.min_sync_interval_secs, 300);
        assert_eq!(settings.protocol.message_expiry_secs, 3_600);
        assert_eq!(settings.enabled_chains().len(), 1);
        assert_eq!(settings.relayers, vec![Address::repeat_byte(0x22)]);
        assert_eq!(
            settings.collateral.parsed_balances().unwrap(),
            vec![(Address::repeat_byte(0x33), 1_000_000)]
        );
        assert!(settings.database.is_none());

        let params = settings.domain_params();
        assert!(params.is_hub);
        assert_eq!(params.hub_chain_id, 1);
    }

    #[test]
    fn test_hub_naming_other_hub_rejected() {
        let raw = HUB_CONFIG
            .replace("${TESSERACT_TEST_OWNER}", "0x0101010101010101010101010101010101010101")
            .replace("hub_chain_id = 1", "hub_chain_id = 10");
        assert!(Settings::parse(&raw).is_err());
    }

    #[test]
    fn test_duplicate_chain_id_rejected() {
        let raw = HUB_CONFIG
            .replace("${TESSERACT_TEST_OWNER}", "0x0101010101010101010101010101010101010101")
            .replace("chain_id = 10\n", "chain_id = 42161\n");
        assert!(Settings::parse(&raw).is_err());
    }
}
