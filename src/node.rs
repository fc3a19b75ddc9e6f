use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use predict_core::{
    CallContext, Clock, DeploymentInfo, EventRecord, ModelState, PredictionRequest, Receipt,
};
use predict_ledger::{OracleAuthority, PredictionLedger};
use predict_rpc::{OracleBackend, Signer};
use predict_storage::{OracleStore, StorageError};
use predict_types::{Address, Bytes, RequestId, U256};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::deployment::Deployment;
use crate::error::{NodeError, Result};

type Job = Box<dyn FnOnce(&mut Actor) + Send>;

/// Who a mutating call acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// In-process caller, taken as named.
    Local(Address),
    /// Caller recovered from a signature; its nonce must be fresh.
    Signed(Signer),
}

impl From<Address> for Origin {
    fn from(address: Address) -> Self {
        Origin::Local(address)
    }
}

impl From<Signer> for Origin {
    fn from(signer: Signer) -> Self {
        Origin::Signed(signer)
    }
}

/// Owns the ledger and the authority. Every call is applied here, one at a
/// time, and committed before the next one starts.
struct Actor {
    ledger: PredictionLedger,
    authority: OracleAuthority,
    next_sequence: u64,
    /// Last nonce of every signer, as committed.
    nonces: HashMap<Address, u64>,
    /// Set when memory may hold state the store does not; the actor stops.
    halted: bool,
    store: OracleStore,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<EventRecord>,
}

impl Actor {
    /// Run `op` against both components and persist its receipt.
    ///
    /// A rejected call changes nothing but the signer's nonce. If the commit
    /// fails the in-memory state is reloaded from the store so it never runs
    /// ahead of disk; if that fails too the actor halts.
    fn apply<T>(
        &mut self,
        origin: Origin,
        value: U256,
        op: impl FnOnce(&CallContext, &mut PredictionLedger, &mut OracleAuthority) -> predict_core::Result<(T, Receipt)>,
    ) -> Result<T> {
        let (caller, nonce) = match origin {
            Origin::Local(address) => (address, None),
            Origin::Signed(signer) => {
                self.check_nonce(&signer)?;
                (signer.address, Some(signer.nonce))
            }
        };

        let ctx = CallContext::new(caller, self.clock.now()).with_value(value);
        let (output, receipt) = match op(&ctx, &mut self.ledger, &mut self.authority) {
            Ok(done) => done,
            Err(err) => {
                if let Some(nonce) = nonce {
                    self.use_nonce(caller, nonce);
                }
                return Err(err.into());
            }
        };

        let signed = nonce.map(|nonce| (caller, nonce));
        match self
            .store
            .commit_signed(&self.ledger, &self.authority, &receipt, self.next_sequence, signed)
        {
            Ok(records) => {
                if let Some(nonce) = nonce {
                    self.nonces.insert(caller, nonce);
                }
                self.next_sequence += records.len() as u64;
                for record in records {
                    debug!("#{} {} from {}", record.sequence, record.event.name(), record.emitter);
                    // No subscribers is fine.
                    let _ = self.events.send(record);
                }
                Ok(output)
            }
            Err(err) => {
                error!("Commit failed, reloading committed state: {}", err);
                if let Err(reload) = self.restore() {
                    error!("Reloading committed state failed: {}", reload);
                    self.halted = true;
                }
                Err(err.into())
            }
        }
    }

    fn check_nonce(&self, signer: &Signer) -> Result<()> {
        match self.nonces.get(&signer.address) {
            Some(&last) if signer.nonce <= last => Err(NodeError::StaleNonce {
                signer: signer.address,
                nonce: signer.nonce,
                last,
            }),
            _ => Ok(()),
        }
    }

    /// Rejected signed calls use up their nonce too.
    fn use_nonce(&mut self, signer: Address, nonce: u64) {
        match self.store.record_nonce(&signer, nonce) {
            Ok(()) => {
                self.nonces.insert(signer, nonce);
            }
            Err(err) => warn!("Could not record nonce {} of {}: {}", nonce, signer, err),
        }
    }

    fn restore(&mut self) -> Result<()> {
        let state = self
            .store
            .load()?
            .ok_or_else(|| StorageError::InvalidData("store no longer holds a deployment".to_string()))?;
        self.ledger = state.ledger;
        self.authority = state.authority;
        self.next_sequence = state.next_sequence;
        Ok(())
    }

    async fn run(mut self, mut jobs: mpsc::Receiver<Job>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => {
                        job(&mut self);
                        if self.halted {
                            error!("Ledger state no longer matches the store; refusing further calls");
                            break;
                        }
                    }
                    None => break,
                },
                _ = shutdown.recv() => {
                    info!("Oracle node shutting down");
                    break;
                }
            }
        }
        debug!("Ledger actor stopped at sequence {}", self.next_sequence);
    }
}

/// A running oracle node.
pub struct Node {
    handle: NodeHandle,
    task: JoinHandle<()>,
    fresh: bool,
}

impl Node {
    /// Restore the deployment held by `store`, or deploy a new one from the
    /// configuration if the store is empty, then start serving calls.
    pub fn spawn(config: &Config, store: OracleStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let (ledger, authority, next_sequence, info, fresh) = match store.load()? {
            Some(state) => {
                let info = store
                    .deployment()?
                    .ok_or_else(|| StorageError::InvalidData("missing deployment record".to_string()))?;
                if info.chain_id != config.deployment.chain_id || info.network != config.deployment.network {
                    warn!(
                        "Store holds a {} (chain {}) deployment; ignoring configured {} (chain {})",
                        info.network, info.chain_id, config.deployment.network, config.deployment.chain_id
                    );
                }
                info!(
                    "Restored ledger {} with {} requests",
                    state.ledger.address(),
                    state.ledger.request_count()
                );
                (state.ledger, state.authority, state.next_sequence, info, false)
            }
            None => {
                let deployment = Deployment::deploy(&config.deployment, clock.as_ref())?;
                let records = store.initialize(
                    &deployment.info,
                    &deployment.ledger,
                    &deployment.authority,
                    &deployment.receipt,
                )?;
                (
                    deployment.ledger,
                    deployment.authority,
                    records.len() as u64,
                    deployment.info,
                    true,
                )
            }
        };

        let nonces = store.nonces()?;
        let (jobs_tx, jobs_rx) = mpsc::channel(config.node.command_buffer);
        let (events, _) = broadcast::channel(config.node.event_buffer);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let actor = Actor {
            ledger,
            authority,
            next_sequence,
            nonces,
            halted: false,
            store: store.clone(),
            clock,
            events: events.clone(),
        };
        let task = tokio::spawn(actor.run(jobs_rx, shutdown_rx));

        Ok(Self {
            handle: NodeHandle {
                jobs: jobs_tx,
                events,
                shutdown: shutdown_tx,
                info: Arc::new(info),
            },
            task,
            fresh,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Whether this start created the deployment.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn deployment(&self) -> &DeploymentInfo {
        &self.handle.info
    }

    /// Stop the actor and wait for it to finish the call in progress.
    pub async fn stop(self) {
        self.handle.shutdown();
        if let Err(e) = self.task.await {
            error!("Ledger actor panicked: {}", e);
        }
    }
}

/// Cheap, cloneable access to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<EventRecord>,
    shutdown: broadcast::Sender<()>,
    info: Arc<DeploymentInfo>,
}

impl NodeHandle {
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Actor) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |actor| {
            let _ = tx.send(f(actor));
        });
        self.jobs.send(job).await.map_err(|_| NodeError::Stopped)?;
        rx.await.map_err(|_| NodeError::Stopped)?
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PredictionLedger) -> T + Send + 'static,
    {
        self.call(move |actor| Ok(f(&actor.ledger))).await
    }

    pub fn deployment(&self) -> DeploymentInfo {
        self.info.as_ref().clone()
    }

    /// Committed events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Receives once `shutdown` is called on any handle.
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    async fn mutate<T, F>(&self, origin: Origin, value: U256, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CallContext, &mut PredictionLedger, &mut OracleAuthority) -> predict_core::Result<(T, Receipt)>
            + Send
            + 'static,
    {
        self.call(move |actor| actor.apply(origin, value, op)).await
    }

    pub async fn request_prediction(
        &self,
        from: impl Into<Origin>,
        value: U256,
        input: Bytes,
    ) -> Result<RequestId> {
        self.mutate(from.into(), value, move |ctx, ledger, _| ledger.request_prediction(ctx, input))
            .await
    }

    pub async fn get_prediction(&self, request_id: RequestId) -> Result<PredictionRequest> {
        self.read(move |ledger| ledger.get_prediction(&request_id)).await?.map_err(Into::into)
    }

    /// Submit a fulfillment through the authority.
    pub async fn fulfill_prediction(
        &self,
        from: impl Into<Origin>,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<()> {
        self.mutate(from.into(), U256::zero(), move |ctx, ledger, authority| {
            let receipt = authority.fulfill_prediction(ctx, ledger, request_id, result, confidence)?;
            Ok(((), receipt))
        })
        .await
    }

    pub async fn train_model(&self, from: impl Into<Origin>) -> Result<ModelState> {
        self.mutate(from.into(), U256::zero(), |ctx, ledger, _| {
            let receipt = ledger.train_model(ctx)?;
            Ok((ledger.model_state().clone(), receipt))
        })
        .await
    }

    /// Grant fulfillment rights, relayed through the authority.
    pub async fn authorize_oracle(&self, from: impl Into<Origin>, oracle: Address) -> Result<()> {
        self.mutate(from.into(), U256::zero(), move |ctx, ledger, authority| {
            Ok(((), authority.authorize_oracle(ctx, ledger, oracle)?))
        })
        .await
    }

    pub async fn revoke_oracle(&self, from: impl Into<Origin>, oracle: Address) -> Result<()> {
        self.mutate(from.into(), U256::zero(), move |ctx, ledger, authority| {
            Ok(((), authority.revoke_oracle(ctx, ledger, oracle)?))
        })
        .await
    }

    pub async fn set_prediction_fee(&self, from: impl Into<Origin>, fee: U256) -> Result<()> {
        self.mutate(from.into(), U256::zero(), move |ctx, ledger, _| {
            Ok(((), ledger.set_prediction_fee(ctx, fee)?))
        })
        .await
    }

    /// Move the whole treasury to the owner. Returns the amount paid out.
    pub async fn withdraw(&self, from: impl Into<Origin>) -> Result<U256> {
        self.mutate(from.into(), U256::zero(), |ctx, ledger, _| ledger.withdraw(ctx))
            .await
    }

    pub async fn prediction_fee(&self) -> Result<U256> {
        self.read(|ledger| ledger.prediction_fee()).await
    }

    pub async fn owner(&self) -> Result<Address> {
        self.read(|ledger| ledger.owner()).await
    }

    pub async fn model_state(&self) -> Result<ModelState> {
        self.read(|ledger| ledger.model_state().clone()).await
    }

    pub async fn treasury(&self) -> Result<U256> {
        self.read(|ledger| ledger.treasury()).await
    }

    pub async fn is_authorized(&self, oracle: Address) -> Result<bool> {
        self.read(move |ledger| ledger.is_authorized(&oracle)).await
    }

    pub async fn authorized_oracles(&self) -> Result<BTreeSet<Address>> {
        self.read(|ledger| ledger.authorized_oracles().clone()).await
    }

    /// Open requests, oldest first.
    pub async fn pending_requests(&self) -> Result<Vec<PredictionRequest>> {
        self.read(|ledger| ledger.pending_requests()).await
    }

    pub async fn request_count(&self) -> Result<u64> {
        self.read(|ledger| ledger.request_count()).await
    }

    /// Journal entries from `sequence` on, at most `limit`.
    pub async fn events_since(&self, sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
        self.call(move |actor| Ok(actor.store.events_since(sequence, limit)?)).await
    }

    /// Sequence the next committed event will get.
    pub async fn next_sequence(&self) -> Result<u64> {
        self.call(|actor| Ok(actor.next_sequence)).await
    }
}

#[async_trait]
impl OracleBackend for NodeHandle {
    async fn request_prediction(&self, caller: Signer, value: U256, input: Bytes) -> predict_rpc::Result<RequestId> {
        Ok(NodeHandle::request_prediction(self, caller, value, input).await?)
    }

    async fn get_prediction(&self, request_id: RequestId) -> predict_rpc::Result<PredictionRequest> {
        Ok(NodeHandle::get_prediction(self, request_id).await?)
    }

    async fn fulfill_prediction(
        &self,
        caller: Signer,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> predict_rpc::Result<()> {
        Ok(NodeHandle::fulfill_prediction(self, caller, request_id, result, confidence).await?)
    }

    async fn train_model(&self, caller: Signer) -> predict_rpc::Result<ModelState> {
        Ok(NodeHandle::train_model(self, caller).await?)
    }

    async fn authorize_oracle(&self, caller: Signer, oracle: Address) -> predict_rpc::Result<()> {
        Ok(NodeHandle::authorize_oracle(self, caller, oracle).await?)
    }

    async fn revoke_oracle(&self, caller: Signer, oracle: Address) -> predict_rpc::Result<()> {
        Ok(NodeHandle::revoke_oracle(self, caller, oracle).await?)
    }

    async fn set_prediction_fee(&self, caller: Signer, fee: U256) -> predict_rpc::Result<()> {
        Ok(NodeHandle::set_prediction_fee(self, caller, fee).await?)
    }

    async fn withdraw(&self, caller: Signer) -> predict_rpc::Result<U256> {
        Ok(NodeHandle::withdraw(self, caller).await?)
    }

    async fn prediction_fee(&self) -> predict_rpc::Result<U256> {
        Ok(NodeHandle::prediction_fee(self).await?)
    }

    async fn owner(&self) -> predict_rpc::Result<Address> {
        Ok(NodeHandle::owner(self).await?)
    }

    async fn model_state(&self) -> predict_rpc::Result<ModelState> {
        Ok(NodeHandle::model_state(self).await?)
    }

    async fn treasury(&self) -> predict_rpc::Result<U256> {
        Ok(NodeHandle::treasury(self).await?)
    }

    async fn is_authorized(&self, oracle: Address) -> predict_rpc::Result<bool> {
        Ok(NodeHandle::is_authorized(self, oracle).await?)
    }

    async fn events_since(&self, sequence: u64, limit: usize) -> predict_rpc::Result<Vec<EventRecord>> {
        Ok(NodeHandle::events_since(self, sequence, limit).await?)
    }

    async fn deployment(&self) -> predict_rpc::Result<DeploymentInfo> {
        Ok(NodeHandle::deployment(self))
    }
}
