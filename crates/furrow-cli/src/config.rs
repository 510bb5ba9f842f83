// crates/furrow-cli/src/config.rs
//
// Runtime configuration for the Furrow CLI.
// Loaded from a TOML file or populated with the reference deployment's
// defaults.

use serde::Deserialize;
use std::fs;

use furrow_core::{AccountKey, FurrowError};
use furrow_economics::emission::{
    DEFAULT_GENESIS_BLOCK, DEFAULT_HALVING_COUNT, DEFAULT_HALVING_INTERVAL,
};
use furrow_economics::{parse_token_amount, EmissionConfig};

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FurrowConfig {
    /// Label of the admin account (hashed into an `AccountKey`).
    #[serde(default = "default_admin")]
    pub admin: String,

    /// Labels of accounts allowed to list, delist, and allocate.
    #[serde(default)]
    pub executors: Vec<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub emission: EmissionSection,
}

/// `[emission]` table. Token amounts are decimal strings in whole tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct EmissionSection {
    #[serde(default = "default_genesis_block")]
    pub genesis_block: u64,

    #[serde(default = "default_halving_interval_blocks")]
    pub halving_interval_blocks: u64,

    #[serde(default = "default_halving_count")]
    pub halving_count: u32,

    #[serde(default = "default_initial_reward_per_block")]
    pub initial_reward_per_block: String,

    #[serde(default = "default_total_supply_cap")]
    pub total_supply_cap: String,
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_genesis_block() -> u64 {
    DEFAULT_GENESIS_BLOCK
}

fn default_halving_interval_blocks() -> u64 {
    DEFAULT_HALVING_INTERVAL
}

fn default_halving_count() -> u32 {
    DEFAULT_HALVING_COUNT
}

fn default_initial_reward_per_block() -> String {
    "300000".to_string()
}

fn default_total_supply_cap() -> String {
    "9550000000".to_string()
}

impl Default for EmissionSection {
    fn default() -> Self {
        Self {
            genesis_block: default_genesis_block(),
            halving_interval_blocks: default_halving_interval_blocks(),
            halving_count: default_halving_count(),
            initial_reward_per_block: default_initial_reward_per_block(),
            total_supply_cap: default_total_supply_cap(),
        }
    }
}

impl Default for FurrowConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            executors: Vec::new(),
            log_level: default_log_level(),
            emission: EmissionSection::default(),
        }
    }
}

impl FurrowConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: FurrowConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Convert the `[emission]` table into validated engine parameters.
    pub fn emission_config(&self) -> Result<EmissionConfig, FurrowError> {
        let config = EmissionConfig {
            genesis_block: self.emission.genesis_block,
            halving_interval_blocks: self.emission.halving_interval_blocks,
            halving_count: self.emission.halving_count,
            initial_reward_per_block: parse_token_amount(&self.emission.initial_reward_per_block)?,
            total_supply_cap: parse_token_amount(&self.emission.total_supply_cap)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn admin_key(&self) -> AccountKey {
        AccountKey::from_label(&self.admin)
    }

    pub fn executor_keys(&self) -> Vec<AccountKey> {
        self.executors.iter().map(|l| AccountKey::from_label(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = FurrowConfig::default();
        assert_eq!(config.emission_config().unwrap(), EmissionConfig::default());
        assert_eq!(config.admin_key(), AccountKey::from_label("admin"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: FurrowConfig = toml::from_str(
            r#"
            admin = "ops"
            executors = ["keeper"]

            [emission]
            halving_count = 3
            initial_reward_per_block = "12.5"
            "#,
        )
        .unwrap();
        let emission = config.emission_config().unwrap();
        assert_eq!(emission.halving_count, 3);
        assert_eq!(emission.genesis_block, DEFAULT_GENESIS_BLOCK);
        assert_eq!(emission.initial_reward_per_block, 12_500_000_000_000_000_000);
        assert_eq!(config.executor_keys(), vec![AccountKey::from_label("keeper")]);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_emission_rejected() {
        let config: FurrowConfig = toml::from_str(
            r#"
            [emission]
            halving_interval_blocks = 0
            "#,
        )
        .unwrap();
        assert!(config.emission_config().is_err());

        let config: FurrowConfig = toml::from_str(
            r#"
            [emission]
            total_supply_cap = "lots"
            "#,
        )
        .unwrap();
        assert!(config.emission_config().is_err());
    }
}
