use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prediction_oracle::config::dev_fulfiller;
use prediction_oracle::core::{LedgerEvent, SystemClock};
use prediction_oracle::crypto::{key_address, SecretKey};
use prediction_oracle::rpc::{sign_call, HeaderValue, RpcHandler, RpcServer};
use prediction_oracle::storage::{Database, MemoryDatabase, OracleStore, RocksDatabase};
use prediction_oracle::types::{format_ether, Bytes, U256};
use prediction_oracle::{
    client_version, write_deployment_file, Bridge, Config, LogisticPredictor, Node,
};

/// Database directory under the data directory.
const DB_DIR: &str = "oracledb";

#[derive(Parser)]
#[command(name = "prediction-oracle")]
#[command(about = "Prediction request/fulfillment oracle node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level; RUST_LOG takes precedence
    #[arg(short, long)]
    log_level: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the oracle node
    Run {
        /// Network preset, used when no configuration file is given
        #[arg(short, long, default_value = "development")]
        network: String,

        /// Data directory
        #[arg(short, long)]
        datadir: Option<PathBuf>,

        /// HTTP RPC port
        #[arg(long)]
        http_port: Option<u16>,

        /// Keep all state in memory
        #[arg(long)]
        in_memory: bool,

        /// Start the built-in fulfiller
        #[arg(long)]
        bridge: bool,
    },

    /// Write a configuration file for a network preset
    InitConfig {
        /// Network preset
        #[arg(short, long, default_value = "development")]
        network: String,

        /// Output path
        #[arg(short, long, default_value = "oracle.toml")]
        output: PathBuf,
    },

    /// Run the request/fulfill round trip against an in-memory node
    Demo,

    /// Append the auth parameter to the params of a mutating RPC call
    SignCall {
        /// Method, e.g. oracle_withdraw
        method: String,

        /// Params as a JSON array, without the auth parameter
        params: String,

        /// File holding the caller's hex private key
        #[arg(long)]
        key_file: PathBuf,

        /// Must exceed the last nonce the node saw from this key
        #[arg(long)]
        nonce: u64,

        #[arg(long, default_value = "1337")]
        chain_id: u64,
    },

    /// Print the state persisted in a data directory
    Inspect {
        /// Data directory
        #[arg(short, long, default_value = "./data")]
        datadir: PathBuf,

        /// Number of most recent events to print
        #[arg(long, default_value = "20")]
        events: u64,
    },
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }
}

fn load_config(path: Option<&Path>, network: &str) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => Config::for_network(network),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            network,
            datadir,
            http_port,
            in_memory,
            bridge,
        } => {
            let mut config = load_config(cli.config.as_deref(), &network)?;
            if let Some(datadir) = datadir {
                config.node.datadir = datadir;
            }
            if let Some(port) = http_port {
                config.rpc.port = port;
            }
            config.node.in_memory |= in_memory;
            config.bridge.enabled |= bridge;
            config.validate()?;

            let level = cli.log_level.clone().unwrap_or_else(|| config.log.level.clone());
            init_logging(&level, config.log.json);

            run_node(config).await?;
        }

        Commands::InitConfig { network, output } => {
            let config = Config::for_network(&network)?;
            config.to_file(&output)?;
            println!("Wrote {} configuration to {}", network, output.display());
        }

        Commands::Demo => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), false);
            run_demo().await?;
        }

        Commands::SignCall {
            method,
            params,
            key_file,
            nonce,
            chain_id,
        } => {
            let params: Vec<serde_json::Value> =
                serde_json::from_str(&params).context("params must be a JSON array")?;
            let key = read_key(&key_file)?;
            let signed = sign_call(chain_id, &method, params, nonce, &key)?;
            eprintln!("Signed by {}", key_address(&key));
            println!("{}", serde_json::Value::Array(signed));
        }

        Commands::Inspect { datadir, events } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), false);
            inspect(&datadir, events)?;
        }
    }

    Ok(())
}

fn read_key(path: &Path) -> Result<SecretKey> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let bytes = Bytes::from_hex(text.trim()).map_err(|_| anyhow::anyhow!("Key file must hold hex"))?;
    SecretKey::from_slice(&bytes).context("Invalid private key")
}

fn open_store(config: &Config) -> Result<OracleStore> {
    let db: Arc<dyn Database> = if config.node.in_memory {
        info!("Using in-memory database; state will not survive a restart");
        Arc::new(MemoryDatabase::new())
    } else {
        let path = config.node.datadir.join(DB_DIR);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!("Opening database at {}", path.display());
        Arc::new(RocksDatabase::open(&path)?)
    };
    Ok(OracleStore::new(db))
}

async fn run_node(config: Config) -> Result<()> {
    info!("Starting {} on {} network", config.node.name, config.deployment.network);

    let store = open_store(&config)?;
    let node = Node::spawn(&config, store, Arc::new(SystemClock))?;
    let handle = node.handle();
    let info = node.deployment().clone();

    if node.is_fresh() && !config.node.in_memory {
        let path = write_deployment_file(&config.node.datadir, &info)?;
        info!("Deployment info saved to {}", path.display());
    }
    info!("Ledger: {}", info.ledger);
    info!("Authority: {}", info.authority);
    info!("Owner: {}", info.owner);

    let mut tasks = Vec::new();

    if config.rpc.enabled {
        let addr: SocketAddr = format!("{}:{}", config.rpc.host, config.rpc.port)
            .parse()
            .context("Invalid RPC listen address")?;
        let rpc_handler = Arc::new(RpcHandler::new(
            Arc::new(handle.clone()),
            info.chain_id,
            client_version(),
        ));
        let origins = config
            .rpc
            .cors_origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin '{}'", origin)))
            .collect::<Result<Vec<_>>>()?;
        let server = RpcServer::new(addr, rpc_handler).with_cors_origins(origins);
        let mut shutdown = handle.shutdown_signal();

        tasks.push(tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown.recv().await;
            };
            if let Err(e) = server.run(signal).await {
                tracing::error!("HTTP-RPC server error: {}", e);
            }
        }));
        info!("HTTP-RPC: http://{}", addr);
    }

    if config.bridge.enabled {
        let fulfiller = config.bridge.fulfiller;
        if !handle.is_authorized(fulfiller).await? {
            warn!("Bridge fulfiller {} is not authorized; its answers will be rejected", fulfiller);
        }
        let bridge = Bridge::new(handle.clone(), fulfiller, LogisticPredictor::from_config(&config.bridge));
        tasks.push(tokio::spawn(bridge.run()));
    }

    info!("Node started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    node.stop().await;
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

async fn run_demo() -> Result<()> {
    let mut config = Config::default();
    config.node.in_memory = true;

    let node = Node::spawn(&config, open_store(&config)?, Arc::new(SystemClock))?;
    let handle = node.handle();
    let info = node.deployment().clone();
    println!("Deployed ledger {} and authority {}", info.ledger, info.authority);

    let owner = info.owner;
    let consumer = prediction_oracle::crypto::address_from_label("prediction-oracle/demo/consumer");
    let fulfiller = dev_fulfiller();

    let model = handle.train_model(owner).await?;
    println!("Trained '{}'", model.name);

    let fee = handle.prediction_fee().await?;
    let request_id = handle
        .request_prediction(consumer, fee, Bytes::from("[1.0,2.0,3.0]"))
        .await?;
    println!("Requested prediction {:?} for {} ether", request_id, format_ether(fee));

    handle
        .fulfill_prediction(fulfiller, request_id, U256::from(1250), 85)
        .await?;
    let request = handle.get_prediction(request_id).await?;
    println!(
        "Fulfilled: result={} confidence={}%",
        request.result.unwrap_or_default(),
        request.confidence.unwrap_or_default()
    );

    let withdrawn = handle.withdraw(owner).await?;
    println!("Owner withdrew {} ether", format_ether(withdrawn));

    for record in handle.events_since(0, 100).await? {
        println!("  #{:<3} {:<20} {}", record.sequence, record.event.name(), record.emitter);
    }

    node.stop().await;
    Ok(())
}

fn inspect(datadir: &Path, events: u64) -> Result<()> {
    let path = datadir.join(DB_DIR);
    if !path.exists() {
        anyhow::bail!("No database at {}", path.display());
    }
    let store = OracleStore::new(Arc::new(RocksDatabase::open(&path)?));

    let deployment = store
        .deployment()?
        .context("Database holds no deployment")?;
    let state = store.load()?.context("Database holds no ledger state")?;
    let ledger = &state.ledger;

    println!("{}", serde_json::to_string_pretty(&deployment)?);
    println!("Prediction fee:  {} ether", format_ether(ledger.prediction_fee()));
    println!("Treasury:        {} ether", format_ether(ledger.treasury()));
    println!("Model:           {} (trained: {})", ledger.model_state().name, ledger.model_state().trained);
    println!("Requests:        {} ({} open)", ledger.request_count(), ledger.pending_requests().len());
    println!("Authorized:      {}", ledger.authorized_oracles().len());
    for oracle in ledger.authorized_oracles() {
        println!("  {}", oracle);
    }

    let from = state.next_sequence.saturating_sub(events);
    println!("Events {}..{}:", from, state.next_sequence);
    for record in store.events_since(from, events as usize)? {
        let detail = match &record.event {
            LedgerEvent::RequestCreated { request_id, .. }
            | LedgerEvent::Fulfilled { request_id, .. }
            | LedgerEvent::FulfillmentRelayed { request_id, .. } => format!("{:?}", request_id),
            other => serde_json::to_string(other)?,
        };
        println!("  #{:<5} {:<20} {}", record.sequence, record.event.name(), detail);
    }

    Ok(())
}
