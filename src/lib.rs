// Node modules
pub mod bridge;
pub mod config;
pub mod deployment;
pub mod error;
pub mod node;

// Re-export commonly used types
pub use bridge::{Bridge, LogisticPredictor, Prediction, Predictor};
pub use config::{BridgeConfig, Config, DeploymentConfig, LogConfig, NodeConfig, RpcConfig};
pub use deployment::{write_deployment_file, Deployment};
pub use error::{NodeError, Result};
pub use node::{Node, NodeHandle, Origin};

// Re-export crate modules
pub use predict_core as core;
pub use predict_crypto as crypto;
pub use predict_ledger as ledger;
pub use predict_rpc as rpc;
pub use predict_storage as storage;
pub use predict_types as types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get client version string
pub fn client_version() -> String {
    format!("prediction-oracle/v{}/rust", VERSION)
}
