use predict_types::{Address, Bytes, RequestId, U256};
use serde::{Deserialize, Serialize};

/// Everything the ledger and the authority announce. Off-chain fulfillers
/// react to these instead of polling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    RequestCreated {
        request_id: RequestId,
        requester: Address,
        input_data: Bytes,
        fee_paid: U256,
        timestamp: u64,
    },
    Fulfilled {
        request_id: RequestId,
        result: U256,
        confidence: u8,
    },
    ModelTrained {
        model_name: String,
        timestamp: u64,
    },
    OracleAuthorized {
        oracle: Address,
    },
    OracleRevoked {
        oracle: Address,
    },
    FeeUpdated {
        old_fee: U256,
        new_fee: U256,
    },
    Withdrawn {
        to: Address,
        amount: U256,
    },
    AuthorityLinked {
        authority: Address,
    },
    LedgerLinked {
        ledger: Address,
    },
    /// Emitted by the authority after a verified fulfillment was accepted.
    FulfillmentRelayed {
        request_id: RequestId,
        fulfiller: Address,
        result: U256,
        confidence: u8,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::RequestCreated { .. } => "RequestCreated",
            LedgerEvent::Fulfilled { .. } => "Fulfilled",
            LedgerEvent::ModelTrained { .. } => "ModelTrained",
            LedgerEvent::OracleAuthorized { .. } => "OracleAuthorized",
            LedgerEvent::OracleRevoked { .. } => "OracleRevoked",
            LedgerEvent::FeeUpdated { .. } => "FeeUpdated",
            LedgerEvent::Withdrawn { .. } => "Withdrawn",
            LedgerEvent::AuthorityLinked { .. } => "AuthorityLinked",
            LedgerEvent::LedgerLinked { .. } => "LedgerLinked",
            LedgerEvent::FulfillmentRelayed { .. } => "FulfillmentRelayed",
        }
    }

    /// Request the event refers to, if any.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            LedgerEvent::RequestCreated { request_id, .. }
            | LedgerEvent::Fulfilled { request_id, .. }
            | LedgerEvent::FulfillmentRelayed { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

/// An event as committed to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub sequence: u64,
    pub emitter: Address,
    pub event: LedgerEvent,
}

/// Events emitted by one successful operation, in emission order, tagged
/// with the component that emitted each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub events: Vec<(Address, LedgerEvent)>,
}

impl Receipt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, emitter: Address, event: LedgerEvent) {
        self.events.push((emitter, event));
    }

    pub fn append(&mut self, other: Receipt) {
        self.events.extend(other.events);
    }

    pub fn single(emitter: Address, event: LedgerEvent) -> Self {
        Self {
            events: vec![(emitter, event)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
