use predict_core::{checked_confidence, CallContext, LedgerEvent, OracleError, Receipt, Result, Role};
use predict_types::{Address, RequestId, U256};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::PredictionLedger;

/// The ledger-side surface the authority relies on.
///
/// The ledger holds the authorized set; the authority only reads it and
/// forwards into it.
pub trait FulfillmentLedger {
    fn address(&self) -> Address;

    fn is_authorized(&self, oracle: &Address) -> bool;

    fn fulfill_prediction(
        &mut self,
        ctx: &CallContext,
        fulfiller: Address,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<Receipt>;

    fn authorize_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt>;

    fn revoke_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt>;
}

impl FulfillmentLedger for PredictionLedger {
    fn address(&self) -> Address {
        PredictionLedger::address(self)
    }

    fn is_authorized(&self, oracle: &Address) -> bool {
        PredictionLedger::is_authorized(self, oracle)
    }

    fn fulfill_prediction(
        &mut self,
        ctx: &CallContext,
        fulfiller: Address,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<Receipt> {
        PredictionLedger::fulfill_prediction(self, ctx, fulfiller, request_id, result, confidence)
    }

    fn authorize_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt> {
        PredictionLedger::authorize_oracle(self, ctx, oracle)
    }

    fn revoke_oracle(&mut self, ctx: &CallContext, oracle: Address) -> Result<Receipt> {
        PredictionLedger::revoke_oracle(self, ctx, oracle)
    }
}

/// Persisted form of an authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityState {
    pub address: Address,
    pub owner: Address,
    pub ledger: Option<Address>,
}

/// Gatekeeper between fulfillers and the ledger.
#[derive(Debug, Clone)]
pub struct OracleAuthority {
    address: Address,
    owner: Address,
    ledger: Option<Address>,
}

impl OracleAuthority {
    /// Create an authority with no ledger attached yet.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            ledger: None,
        }
    }

    pub fn from_state(state: AuthorityState) -> Self {
        Self {
            address: state.address,
            owner: state.owner,
            ledger: state.ledger,
        }
    }

    pub fn state(&self) -> AuthorityState {
        AuthorityState {
            address: self.address,
            owner: self.owner,
            ledger: self.ledger,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn ledger(&self) -> Option<Address> {
        self.ledger
    }

    pub fn is_linked(&self) -> bool {
        self.ledger.is_some()
    }

    fn ensure_owner(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller != self.owner {
            return Err(OracleError::Unauthorized {
                caller: ctx.caller,
                required: Role::Owner,
            });
        }
        Ok(())
    }

    /// The ledger passed in must be the one this authority was linked to.
    fn ensure_ledger<L: FulfillmentLedger>(&self, ledger: &L) -> Result<()> {
        match self.ledger {
            Some(linked) if linked == ledger.address() => Ok(()),
            _ => Err(OracleError::NotLinked),
        }
    }

    pub fn link_ledger(&mut self, ctx: &CallContext, ledger: Address) -> Result<Receipt> {
        self.ensure_owner(ctx)?;
        if self.ledger.is_some() {
            return Err(OracleError::AlreadyLinked);
        }
        if ledger.is_zero() {
            return Err(OracleError::NotLinked);
        }

        self.ledger = Some(ledger);
        info!("Authority {} linked to ledger {}", self.address, ledger);
        Ok(Receipt::single(self.address, LedgerEvent::LedgerLinked { ledger }))
    }

    /// Verify the caller, then forward the fulfillment into the ledger.
    ///
    /// Authorization is decided here against the ledger's set before the
    /// ledger is touched, so an unauthorized caller never reaches
    /// `fulfill_prediction` on the ledger.
    pub fn fulfill_prediction<L: FulfillmentLedger>(
        &self,
        ctx: &CallContext,
        ledger: &mut L,
        request_id: RequestId,
        result: U256,
        confidence: u64,
    ) -> Result<Receipt> {
        self.ensure_ledger(ledger)?;
        if !ledger.is_authorized(&ctx.caller) {
            warn!("Unauthorized fulfillment attempt by {} for {:?}", ctx.caller, request_id);
            return Err(OracleError::Unauthorized {
                caller: ctx.caller,
                required: Role::Fulfiller,
            });
        }

        let stored = checked_confidence(confidence)?;
        let relayed = ctx.relayed_by(self.address);
        let mut receipt = ledger.fulfill_prediction(&relayed, ctx.caller, request_id, result, confidence)?;
        receipt.emit(
            self.address,
            LedgerEvent::FulfillmentRelayed {
                request_id,
                fulfiller: ctx.caller,
                result,
                confidence: stored,
            },
        );
        Ok(receipt)
    }

    pub fn authorize_oracle<L: FulfillmentLedger>(
        &self,
        ctx: &CallContext,
        ledger: &mut L,
        oracle: Address,
    ) -> Result<Receipt> {
        self.ensure_owner(ctx)?;
        self.ensure_ledger(ledger)?;
        ledger.authorize_oracle(ctx, oracle)
    }

    pub fn revoke_oracle<L: FulfillmentLedger>(
        &self,
        ctx: &CallContext,
        ledger: &mut L,
        oracle: Address,
    ) -> Result<Receipt> {
        self.ensure_owner(ctx)?;
        self.ensure_ledger(ledger)?;
        ledger.revoke_oracle(ctx, oracle)
    }
}
