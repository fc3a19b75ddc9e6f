use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use predict_crypto::{key_address, secret_key_from_label, SecretKey};
use predict_rpc::HeaderValue;
use predict_types::{parse_ether, Address, U256};

/// Complete node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    /// What to deploy when the data directory is empty
    pub deployment: DeploymentConfig,
    pub rpc: RpcConfig,
    /// Built-in fulfiller
    pub bridge: BridgeConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name
    pub name: String,
    /// Data directory
    pub datadir: PathBuf,
    /// Keep all state in memory; nothing survives a restart
    pub in_memory: bool,
    /// Depth of the command queue in front of the ledger
    pub command_buffer: usize,
    /// Events buffered per subscriber before it starts lagging
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Network name recorded in the deployment file
    pub network: String,
    pub chain_id: u64,
    /// Owner of both components
    pub owner: Address,
    pub model_name: String,
    /// Fee per request, in ether (e.g. "0.001")
    pub prediction_fee: String,
    /// Fulfillers authorized right after deployment
    pub fulfillers: Vec<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Enable HTTP RPC
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the server; empty disables CORS
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    /// Identity the bridge fulfills as; must be authorized
    pub fulfiller: Address,
    /// Logistic model weights, one per feature
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: String,
    /// Enable JSON logging
    pub json: bool,
}

/// Key of the well-known owner of development deployments. Public by
/// construction; never use it outside development.
pub fn dev_owner_key() -> SecretKey {
    secret_key_from_label("prediction-oracle/dev/owner")
}

pub fn dev_owner() -> Address {
    key_address(&dev_owner_key())
}

/// Key of the well-known fulfiller of development deployments.
pub fn dev_fulfiller_key() -> SecretKey {
    secret_key_from_label("prediction-oracle/dev/fulfiller")
}

pub fn dev_fulfiller() -> Address {
    key_address(&dev_fulfiller_key())
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "prediction-oracle".to_string(),
            datadir: PathBuf::from("./data"),
            in_memory: false,
            command_buffer: 256,
            event_buffer: 1024,
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            network: "development".to_string(),
            chain_id: 1337,
            owner: dev_owner(),
            model_name: "AI Prediction Model v1.0".to_string(),
            prediction_fee: "0.001".to_string(),
            fulfillers: vec![dev_fulfiller()],
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8545,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fulfiller: dev_fulfiller(),
            weights: vec![0.8, -0.4, 0.3],
            bias: -0.1,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DeploymentConfig {
    /// Configured fee in wei.
    pub fn fee_wei(&self) -> Result<U256> {
        parse_ether(&self.prediction_fee)
            .with_context(|| format!("Invalid prediction fee '{}'", self.prediction_fee))
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read configuration file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, content)
            .context("Failed to write configuration file")?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.node.command_buffer == 0 || self.node.event_buffer == 0 {
            anyhow::bail!("command_buffer and event_buffer must be greater than 0");
        }

        if self.deployment.owner.is_zero() {
            anyhow::bail!("deployment.owner must not be the zero address");
        }
        if self.deployment.model_name.trim().is_empty() {
            anyhow::bail!("deployment.model_name must not be empty");
        }
        self.deployment.fee_wei()?;

        for origin in &self.rpc.cors_origins {
            if origin.trim() == "*" || HeaderValue::from_str(origin).is_err() {
                anyhow::bail!("rpc.cors_origins: '{}' is not an allowed origin", origin);
            }
        }

        if self.bridge.enabled {
            if self.bridge.weights.is_empty() {
                anyhow::bail!("bridge.weights must not be empty when the bridge is enabled");
            }
            if self.bridge.weights.iter().chain([&self.bridge.bias]).any(|w| !w.is_finite()) {
                anyhow::bail!("bridge weights and bias must be finite");
            }
        }

        Ok(())
    }

    /// Get configuration for specific network
    pub fn for_network(network: &str) -> Result<Self> {
        let mut config = Config::default();

        match network.to_lowercase().as_str() {
            "development" | "dev" => {}
            "ganache" => {
                config.deployment.network = "ganache".to_string();
                config.deployment.chain_id = 5777;
                config.rpc.port = 7545;
            }
            "sepolia" => {
                config.deployment.network = "sepolia".to_string();
                config.deployment.chain_id = 11155111;
            }
            "bsc-testnet" | "bsctestnet" => {
                config.deployment.network = "bsc-testnet".to_string();
                config.deployment.chain_id = 97;
            }
            _ => anyhow::bail!("Unknown network: {}", network),
        }

        Ok(config)
    }
}
