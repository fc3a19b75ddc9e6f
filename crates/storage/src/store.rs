use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use predict_core::{DeploymentInfo, EventRecord, FeeConfig, ModelState, PredictionRequest, Receipt};
use predict_ledger::{AuthorityState, LedgerMeta, OracleAuthority, PredictionLedger};
use predict_types::{Address, RequestId, U256};
use tracing::debug;

use crate::traits::{decode, TypedBatch, WriteBatch};
use crate::{keys, Database, KeyPrefix, Result, StorageError, TypedDatabase};

/// Ledger and authority as last committed.
pub struct StoredState {
    pub ledger: PredictionLedger,
    pub authority: OracleAuthority,
    /// Sequence the next journal entry will get.
    pub next_sequence: u64,
}

/// Record-level persistence for one ledger/authority pair.
#[derive(Clone)]
pub struct OracleStore {
    db: Arc<dyn Database>,
}

impl OracleStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Restore the committed state, or `None` for a fresh store.
    pub fn load(&self) -> Result<Option<StoredState>> {
        let meta: LedgerMeta = match self.db.get_typed(&keys::ledger_meta_key())? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let authority: AuthorityState = self.required(&keys::authority_key(), "authority")?;
        let model: ModelState = self.required(&keys::model_key(&meta.address), "model state")?;
        let fees: FeeConfig = self.required(&keys::fee_key(&meta.address), "fee config")?;
        let treasury: U256 = self.required(&keys::treasury_key(&meta.address), "treasury")?;
        let authorized: BTreeSet<Address> =
            self.required(&keys::authorized_key(&meta.address), "authorized set")?;

        let mut requests = Vec::new();
        let prefix = [KeyPrefix::Request.as_byte()];
        let mut iter = self.db.iter_prefix(&prefix);
        while let Some(entry) = iter.next() {
            let (_, value) = entry?;
            requests.push(decode::<PredictionRequest>(&value)?);
        }
        if requests.len() as u64 > meta.nonce {
            return Err(StorageError::InvalidData(format!(
                "{} request records but nonce is {}",
                requests.len(),
                meta.nonce
            )));
        }

        let next_sequence = self.last_sequence()?.map_or(0, |seq| seq + 1);
        debug!("Loaded ledger {} with {} requests", meta.address, requests.len());

        Ok(Some(StoredState {
            ledger: PredictionLedger::from_parts(meta, model, fees, treasury, authorized, requests),
            authority: OracleAuthority::from_state(authority),
            next_sequence,
        }))
    }

    fn required<T: serde::de::DeserializeOwned>(&self, key: &[u8], what: &str) -> Result<T> {
        self.db
            .get_typed(key)?
            .ok_or_else(|| StorageError::InvalidData(format!("missing {} record", what)))
    }

    fn last_sequence(&self) -> Result<Option<u64>> {
        let prefix = [KeyPrefix::Event.as_byte()];
        let mut last = None;
        let mut iter = self.db.iter_prefix(&prefix);
        while let Some(entry) = iter.next() {
            let (key, _) = entry?;
            last = keys::sequence_from_event_key(&key);
        }
        Ok(last)
    }

    /// Persist a fresh deployment: its record, both components and the
    /// journal entries of the bootstrap, in one batch.
    pub fn initialize(
        &self,
        info: &DeploymentInfo,
        ledger: &PredictionLedger,
        authority: &OracleAuthority,
        receipt: &Receipt,
    ) -> Result<Vec<EventRecord>> {
        if self.db.contains(&keys::deployment_key())? {
            return Err(StorageError::InvalidData("store already holds a deployment".to_string()));
        }
        let mut batch = self.db.batch();
        batch.put_typed(&keys::deployment_key(), info)?;
        let records = Self::stage(&mut batch, ledger, authority, receipt, 0)?;
        self.db.write_batch(batch)?;
        Ok(records)
    }

    pub fn deployment(&self) -> Result<Option<DeploymentInfo>> {
        self.db.get_typed(&keys::deployment_key())
    }

    /// Write the full state of both components plus the journal entries for
    /// `receipt` in one atomic batch.
    pub fn commit(
        &self,
        ledger: &PredictionLedger,
        authority: &OracleAuthority,
        receipt: &Receipt,
        first_sequence: u64,
    ) -> Result<Vec<EventRecord>> {
        self.commit_signed(ledger, authority, receipt, first_sequence, None)
    }

    /// Like [`commit`](Self::commit), recording the nonce of the signer that
    /// made the call in the same batch.
    pub fn commit_signed(
        &self,
        ledger: &PredictionLedger,
        authority: &OracleAuthority,
        receipt: &Receipt,
        first_sequence: u64,
        signer: Option<(Address, u64)>,
    ) -> Result<Vec<EventRecord>> {
        let mut batch = self.db.batch();
        let records = Self::stage(&mut batch, ledger, authority, receipt, first_sequence)?;
        if let Some((signer, nonce)) = signer {
            batch.put_typed(&keys::nonce_key(&signer), &nonce)?;
        }
        self.db.write_batch(batch)?;
        Ok(records)
    }

    /// Record a nonce used by a call that changed nothing.
    pub fn record_nonce(&self, signer: &Address, nonce: u64) -> Result<()> {
        let mut batch = self.db.batch();
        batch.put_typed(&keys::nonce_key(signer), &nonce)?;
        self.db.write_batch(batch)
    }

    /// Last nonce of every signer seen so far.
    pub fn nonces(&self) -> Result<HashMap<Address, u64>> {
        let mut nonces = HashMap::new();
        let prefix = [KeyPrefix::Nonce.as_byte()];
        let mut iter = self.db.iter_prefix(&prefix);
        while let Some(entry) = iter.next() {
            let (key, value) = entry?;
            let signer = Address::from_slice(&key[1..])
                .map_err(|e| StorageError::InvalidData(format!("nonce key: {}", e)))?;
            nonces.insert(signer, decode::<u64>(&value)?);
        }
        Ok(nonces)
    }

    /// Only request records named by an event in the receipt are rewritten;
    /// no other operation touches requests.
    fn stage(
        batch: &mut Box<dyn WriteBatch>,
        ledger: &PredictionLedger,
        authority: &OracleAuthority,
        receipt: &Receipt,
        first_sequence: u64,
    ) -> Result<Vec<EventRecord>> {
        let address = ledger.address();

        batch.put_typed(&keys::ledger_meta_key(), ledger.meta())?;
        batch.put_typed(&keys::authority_key(), &authority.state())?;
        batch.put_typed(&keys::model_key(&address), ledger.model_state())?;
        batch.put_typed(&keys::fee_key(&address), &ledger.fee_config())?;
        batch.put_typed(&keys::treasury_key(&address), &ledger.treasury())?;
        batch.put_typed(&keys::authorized_key(&address), ledger.authorized_oracles())?;

        let touched: BTreeSet<RequestId> = receipt
            .events
            .iter()
            .filter_map(|(_, event)| event.request_id())
            .collect();
        for id in &touched {
            if let Ok(request) = ledger.get_prediction(id) {
                batch.put_typed(&keys::request_key(id), &request)?;
            }
        }

        let records: Vec<EventRecord> = receipt
            .events
            .iter()
            .zip(first_sequence..)
            .map(|((emitter, event), sequence)| EventRecord {
                sequence,
                emitter: *emitter,
                event: event.clone(),
            })
            .collect();
        for record in &records {
            batch.put_typed(&keys::event_key(record.sequence), record)?;
        }

        Ok(records)
    }

    /// Journal entries with `sequence >= from`, at most `limit` of them.
    pub fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        let mut iter = self.db.iter_from(&keys::event_key(from));
        while records.len() < limit {
            let Some(entry) = iter.next() else { break };
            let (key, value) = entry?;
            if keys::sequence_from_event_key(&key).is_none() {
                break;
            }
            records.push(decode::<EventRecord>(&value)?);
        }
        Ok(records)
    }
}
