//! Configuration module for blockchain parameters.
//!
//! This module provides a centralized configuration system that supports:
//! - Hardcoded defaults (for educational simplicity)
//! - Environment variable overrides (for flexibility)
//! - Multiple network profiles (mainnet, testnet, devnet)
//!
//! Configuration priority (highest to lowest):
//! 1. Environment variables
//! 2. .env file
//! 3. Hardcoded defaults

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<BlockchainConfig> = OnceLock::new();

/// Complete blockchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub network: NetworkConfig,
    pub node: NodeConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
}

/// Network consensus parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier (mainnet, testnet, devnet)
    pub network_id: String,

    /// Initial block reward, in whole coins
    pub initial_reward: u64,

    /// Number of blocks between reward halvings
    pub halving_interval: u64,

    /// Target time between blocks, in seconds
    pub block_generation_interval: i64,

    /// Number of blocks between difficulty adjustments
    pub difficulty_adjustment_interval: u64,

    /// Maximum age of mempool transactions, in seconds
    pub max_mempool_transaction_age: u64,
}

/// Node operation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub port: u16,
    pub blockchain_file: String,
    pub initial_peers: Vec<String>,
    pub mempool_cleanup_interval_secs: u64,
    pub blockchain_save_interval_secs: u64,
    pub max_peers: usize,
}

/// Mining configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub template_fetch_interval_secs: u64,
    pub node_address: String,
    pub public_key_file: String,
}

/// Wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub utxo_update_interval_secs: u64,
    pub balance_display_update_interval_ms: u64,
    pub node_address: String,
    pub config_file: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: "mainnet".to_string(),
            initial_reward: crate::INITIAL_REWARD,
            halving_interval: crate::HALVING_INTERVAL,
            block_generation_interval: crate::BLOCK_GENERATION_INTERVAL,
            difficulty_adjustment_interval: crate::DIFFICULTY_ADJUSTMENT_INTERVAL,
            max_mempool_transaction_age: crate::MAX_MEMPOOL_TRANSACTION_AGE,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            blockchain_file: "./blockchain.cbor".to_string(),
            initial_peers: vec![],
            mempool_cleanup_interval_secs: 30,
            blockchain_save_interval_secs: 15,
            max_peers: 50,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            template_fetch_interval_secs: 5,
            node_address: "127.0.0.1:9000".to_string(),
            public_key_file: "miner.pub.pem".to_string(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            utxo_update_interval_secs: 20,
            balance_display_update_interval_ms: 500,
            node_address: "127.0.0.1:9000".to_string(),
            config_file: "wallet_config.toml".to_string(),
        }
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            node: NodeConfig::default(),
            mining: MiningConfig::default(),
            wallet: WalletConfig::default(),
        }
    }
}

impl BlockchainConfig {
    /// Load configuration with the following priority:
    /// 1. Environment variables (highest priority)
    /// 2. .env file
    /// 3. Hardcoded defaults (lowest priority)
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let mut config = BlockchainConfig::default();
        config.network = NetworkConfig::from_env();
        config.node = NodeConfig::from_env();
        config.mining = MiningConfig::from_env();
        config.wallet = WalletConfig::from_env();
        config
    }

    /// Get or initialize the global configuration
    pub fn global() -> &'static BlockchainConfig {
        CONFIG.get_or_init(BlockchainConfig::load)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl NetworkConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            network_id: env_var("NETWORK_ID").unwrap_or(defaults.network_id),
            initial_reward: parse_env("INITIAL_REWARD").unwrap_or(defaults.initial_reward),
            halving_interval: parse_env("HALVING_INTERVAL").unwrap_or(defaults.halving_interval),
            block_generation_interval: parse_env("BLOCK_GENERATION_INTERVAL")
                .unwrap_or(defaults.block_generation_interval),
            difficulty_adjustment_interval: parse_env("DIFFICULTY_ADJUSTMENT_INTERVAL")
                .unwrap_or(defaults.difficulty_adjustment_interval),
            max_mempool_transaction_age: parse_env("MAX_MEMPOOL_TX_AGE")
                .unwrap_or(defaults.max_mempool_transaction_age),
        }
    }
}

impl NodeConfig {
    fn from_env() -> Self {
        let initial_peers_str = env_var("INITIAL_PEERS").unwrap_or_default();
        let initial_peers = if initial_peers_str.is_empty() {
            vec![]
        } else {
            initial_peers_str.split(',').map(|s| s.trim().to_string()).collect()
        };

        Self {
            port: parse_env("NODE_PORT").unwrap_or(9000),
            blockchain_file: env_var("BLOCKCHAIN_FILE").unwrap_or_else(|| "./blockchain.cbor".to_string()),
            initial_peers,
            mempool_cleanup_interval_secs: parse_env("MEMPOOL_CLEANUP_INTERVAL").unwrap_or(30),
            blockchain_save_interval_secs: parse_env("BLOCKCHAIN_SAVE_INTERVAL").unwrap_or(15),
            max_peers: parse_env("MAX_PEERS").unwrap_or(50),
        }
    }
}

impl MiningConfig {
    fn from_env() -> Self {
        Self {
            template_fetch_interval_secs: parse_env("TEMPLATE_FETCH_INTERVAL").unwrap_or(5),
            node_address: env_var("MINER_NODE_ADDRESS").unwrap_or_else(|| "127.0.0.1:9000".to_string()),
            public_key_file: env_var("MINER_PUBLIC_KEY").unwrap_or_else(|| "miner.pub.pem".to_string()),
        }
    }
}

impl WalletConfig {
    fn from_env() -> Self {
        Self {
            utxo_update_interval_secs: parse_env("UTXO_UPDATE_INTERVAL").unwrap_or(20),
            balance_display_update_interval_ms: parse_env("BALANCE_UPDATE_INTERVAL_MS").unwrap_or(500),
            node_address: env_var("WALLET_NODE_ADDRESS").unwrap_or_else(|| "127.0.0.1:9000".to_string()),
            config_file: env_var("WALLET_CONFIG_FILE").unwrap_or_else(|| "wallet_config.toml".to_string()),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_consensus_constants() {
        let config = BlockchainConfig::default();
        assert_eq!(config.network.initial_reward, crate::INITIAL_REWARD);
        assert_eq!(config.node.port, 9000);
    }

    #[test]
    fn env_override_takes_priority() {
        std::env::set_var("TEST_CONFIG_ONLY_VAR", "42");
        assert_eq!(parse_env::<u64>("TEST_CONFIG_ONLY_VAR"), Some(42));
        std::env::remove_var("TEST_CONFIG_ONLY_VAR");
    }
}
