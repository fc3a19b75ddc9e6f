use std::collections::{BTreeSet, HashMap};

use predict_core::{
    fulfill, CallContext, FeeConfig, LedgerEvent, ModelState, OracleError, PredictionRequest,
    Receipt, Result, Role,
};
use predict_types::{Address, Bytes, RequestId, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Identity and bookkeeping of a ledger that is not part of any single
/// record family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMeta {
    pub address: Address,
    pub owner: Address,
    pub authority: Option<Address>,
    /// Number of requests accepted so far; the next request id is derived
    /// from this value.
    pub nonce: u64,
}

/// Request records, model status, fee schedule, treasury and the
/// authorized fulfiller set.
#[derive(Debug, Clone)]
pub struct PredictionLedger {
    meta: LedgerMeta,
    model: ModelState,
    fees: FeeConfig,
    treasury: U256,
    authorized: BTreeSet<Address>,
    requests: HashMap<RequestId, PredictionRequest>,
}

impl PredictionLedger {
    /// Create an unlinked ledger owned by `owner`.
    pub fn new(address: Address, owner: Address, model_name: impl Into<String>, prediction_fee: U256) -> Self {
        Self {
            meta: LedgerMeta {
                address,
                owner,
                authority: None,
                nonce: 0,
            },
            model: ModelState::new(model_name),
            fees: FeeConfig::new(prediction_fee),
            treasury: U256::zero(),
            authorized: BTreeSet::new(),
            requests: HashMap::new(),
        }
    }

    /// Reassemble a ledger from persisted parts.
    pub fn from_parts(
        meta: LedgerMeta,
        model: ModelState,
        fees: FeeConfig,
        treasury: U256,
        authorized: BTreeSet<Address>,
        requests: impl IntoIterator<Item = PredictionRequest>,
    ) -> Self {
        Self {
            meta,
            model,
            fees,
            treasury,
            authorized,
            requests: requests.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn address(&self) -> Address {
        self.meta.address
    }

    pub fn owner(&self) -> Address {
        self.meta.owner
    }

    pub fn authority(&self) -> Option<Address> {
        self.meta.authority
    }

    pub fn meta(&self) -> &LedgerMeta {
        &self.meta
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn fee_config(&self) -> FeeConfig {
        self.fees
    }

    pub fn prediction_fee(&self) -> U256 {
        self.fees.prediction_fee
    }

    pub fn treasury(&self) -> U256 {
        self.treasury
    }

    pub fn is_authorized(&self, oracle: &Address) -> bool {
        self.authorized.contains(oracle)
    }

    pub fn authorized_oracles(&self) -> &BTreeSet<Address> {
        &self.authorized
    }

    pub fn request_count(&self) -> u64 {
        self.meta.nonce
    }

    /// Open requests, oldest first.
    pub fn pending_requests(&self) -> Vec<PredictionRequest> {
        let mut pending: Vec<_> = self.requests.values().filter(|r| !r.fulfilled).cloned().collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        pending
    }

    pub fn requests(&self) -> impl Iterator<Item = &PredictionRequest> {
        self.requests.values()
    }

    fn ensure_owner(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller != self.meta.owner {
            warn!("Rejected owner-only call from {}", ctx.caller);
            return Err(OracleError::Unauthorized {
                caller: ctx.caller,
                required: Role::Owner,
            });
        }
        Ok(())
    }

    fn emit(&self, event: LedgerEvent) -> Receipt {
        Receipt::single(self.meta.address, event)
    }

    /// Record the authority this ledger accepts fulfillments from. Set once.
    pub fn link_authority(&mut self, ctx: &CallContext, authority: Address) -> Result<Receipt> {
        self.ensure_owner(ctx)?;
        if self.meta.authority.is_some() {
            return Err(OracleError::AlreadyLinked);
        }
        if authority.is_zero() {
            return Err(OracleError::NotLinked);
        }

        self.meta.authority = Some(authority);
        info!("Ledger {} linked to authority {}", self.meta.address, authority);
        Ok(self.emit(LedgerEvent::AuthorityLinked { authority }))
    }

    /// Mark the model trained. Calling again re-trains and moves the
    /// timestamp forward.
    pub fn train_model(&mut self, ctx: &CallContext) -> Result<Receipt> {
        self.ensure_owner(ctx)?;

        self.model.mark_trained(ctx.timestamp);
        info!("Model '{}' trained at {}", self.model.name, ctx.timestamp);
        Ok(self.emit(LedgerEvent::ModelTrained {
            model_name: self.model.name.clone(),
            timestamp: ctx.timestamp,
        }))
    }

    /// Accept a request, escrowing `ctx.value` into the treasury.
    pub fn request_prediction(&mut self, ctx: &CallContext, input_data: Bytes) -> Result<(RequestId, Receipt)> {
        if self.meta.authority.is_none() {
            return Err(OracleError::NotLinked);
        }
        if !self.fees.covers(ctx.value) {
            warn!(
                "Rejected request from {}: paid {} wei, fee is {} wei",
                ctx.caller, ctx.value, self.fees.prediction_fee
            );
            return Err(OracleError::InsufficientFee {
                required: self.fees.prediction_fee,
                paid: ctx.value,
            });
        }

        let request_id = predict_crypto::request_id(
            &self.meta.address,
            &ctx.caller,
            &input_data,
            self.meta.nonce,
            ctx.timestamp,
        );
        if self.requests.contains_key(&request_id) {
            return Err(OracleError::RequestIdCollision(request_id));
        }
        let treasury = self
            .treasury
            .checked_add(ctx.value)
            .ok_or(OracleError::TreasuryOverflow)?;

        // All checks passed; commit.
        self.treasury = treasury;
        self.meta.nonce += 1;
        self.requests.insert(
            request_id,
            PredictionRequest::new(request_id, ctx.caller, input_data.clone(), ctx.value, ctx.timestamp),
        );

        info!("Prediction requested: id={:?} requester={} fee={}", request_id, ctx.caller, ctx.value);
        let receipt = self.emit(LedgerEvent::RequestCreated {
            request_id,
            requester: ctx.caller,
            input_data,
            fee_paid: ctx.value,
            timestamp: ctx.timestamp,
        });
        Ok((request_id, receipt))
    }

    pub fn get_prediction(&self, request_id: &RequestId) -> Result<PredictionRequest> {
        debug!("Looking up prediction {:?}", request_id);
        self.requests
            .get(request_id)
            .cloned()
            .ok_or(OracleError::NotFound(*request_id))
    }

    /// Add `oracle` to the authorized set. Re-authorizing is a no-op that
    /// still emits the event.
    pub fn authorize_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt> {
        self.ensure_owner(ctx)?;

        if self.authorized.insert(oracle) {
            info!("Oracle {} authorized", oracle);
        }
        Ok(self.emit(LedgerEvent::OracleAuthorized { oracle }))
    }

    pub fn revoke_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt> {
        self.ensure_owner(ctx)?;

        if self.authorized.remove(&oracle) {
            info!("Oracle {} revoked", oracle);
        }
        Ok(self.emit(LedgerEvent::OracleRevoked { oracle }))
    }

    /// Replace the fee for subsequent requests. Existing requests keep what
    /// they paid.
    pub fn set_prediction_fee(&mut self, ctx: &CallContext, new_fee: U256) -> Result<Receipt> {
        self.ensure_owner(ctx)?;

        let old_fee = self.fees.prediction_fee;
        self.fees.prediction_fee = new_fee;
        info!("Prediction fee changed from {} to {} wei", old_fee, new_fee);
        Ok(self.emit(LedgerEvent::FeeUpdated { old_fee, new_fee }))
    }

    /// Pay the whole treasury out to the owner.
    pub fn withdraw(&mut self, ctx: &CallContext) -> Result<(U256, Receipt)> {
        self.ensure_owner(ctx)?;
        if self.treasury.is_zero() {
            return Err(OracleError::NothingToWithdraw);
        }

        let amount = std::mem::replace(&mut self.treasury, U256::zero());
        info!("Withdrew {} wei to {}", amount, self.meta.owner);
        let receipt = self.emit(LedgerEvent::Withdrawn {
            to: self.meta.owner,
            amount,
        });
        Ok((amount, receipt))
    }

    /// Store a result. Only the linked authority may call this, on behalf
    /// of `fulfiller`.
    pub fn fulfill_prediction(
        &mut self,
        ctx: &CallContext,
        fulfiller: Address,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<Receipt> {
        let authority = self.meta.authority.ok_or(OracleError::NotLinked)?;
        if ctx.caller != authority {
            warn!("Rejected fulfillment relayed by untrusted {}", ctx.caller);
            return Err(OracleError::Unauthorized {
                caller: ctx.caller,
                required: Role::Relay,
            });
        }
        if !self.authorized.contains(&fulfiller) {
            return Err(OracleError::Unauthorized {
                caller: fulfiller,
                required: Role::Fulfiller,
            });
        }

        let request = self
            .requests
            .get_mut(&request_id)
            .ok_or(OracleError::NotFound(request_id))?;
        let confidence = fulfill(request, result, confidence)?;

        info!(
            "Prediction fulfilled: id={:?} result={} confidence={} by {}",
            request_id, result, confidence, fulfiller
        );
        Ok(self.emit(LedgerEvent::Fulfilled {
            request_id,
            result,
            confidence,
        }))
    }
}
