use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use predict_core::{CallContext, Clock, DeploymentInfo, Receipt};
use predict_crypto::component_address;
use predict_ledger::{link, OracleAuthority, PredictionLedger};
use tracing::info;

use crate::config::DeploymentConfig;
use crate::error::{NodeError, Result};

/// File written next to the database after a fresh deployment.
pub const DEPLOYMENT_FILE: &str = "deployment.json";

/// A freshly created and linked ledger/authority pair.
pub struct Deployment {
    pub ledger: PredictionLedger,
    pub authority: OracleAuthority,
    /// Every event emitted while deploying, in order.
    pub receipt: Receipt,
    pub info: DeploymentInfo,
}

impl Deployment {
    /// Create the authority, then the ledger, authorize the configured
    /// fulfillers and link the two.
    pub fn deploy(config: &DeploymentConfig, clock: &dyn Clock) -> Result<Self> {
        let fee = config
            .fee_wei()
            .map_err(|e| NodeError::Config(format!("{:#}", e)))?;
        if config.owner.is_zero() {
            return Err(NodeError::Config("owner must not be the zero address".to_string()));
        }

        let owner = config.owner;
        let deployed_at = clock.now();
        let ctx = CallContext::new(owner, deployed_at);

        let mut authority = OracleAuthority::new(component_address(&owner, 1), owner);
        let mut ledger = PredictionLedger::new(
            component_address(&owner, 0),
            owner,
            config.model_name.clone(),
            fee,
        );

        let mut receipt = Receipt::new();
        for fulfiller in &config.fulfillers {
            receipt.append(ledger.authorize_oracle(&ctx, *fulfiller)?);
        }
        receipt.append(link(&ctx, &mut ledger, &mut authority)?);

        let info = DeploymentInfo {
            network: config.network.clone(),
            chain_id: config.chain_id,
            ledger: ledger.address(),
            authority: authority.address(),
            owner,
            model_name: config.model_name.clone(),
            deployed_at,
        };

        info!(
            "Deployed ledger {} and authority {} on {} (chain {})",
            info.ledger, info.authority, info.network, info.chain_id
        );

        Ok(Self {
            ledger,
            authority,
            receipt,
            info,
        })
    }
}

/// Write `info` as pretty JSON into `datadir`, returning the file path.
pub fn write_deployment_file(datadir: &Path, info: &DeploymentInfo) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(datadir)
        .with_context(|| format!("Failed to create {}", datadir.display()))?;

    let path = datadir.join(DEPLOYMENT_FILE);
    let content = serde_json::to_string_pretty(info)
        .context("Failed to serialize deployment info")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

pub fn read_deployment_file(datadir: &Path) -> anyhow::Result<DeploymentInfo> {
    let path = datadir.join(DEPLOYMENT_FILE);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse deployment info")
}
