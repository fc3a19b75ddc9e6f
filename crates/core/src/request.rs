use predict_types::{Address, Bytes, RequestId, U256};
use serde::{Deserialize, Serialize};

/// Fixed-point scale fulfillers apply to predictions before submitting them.
pub const RESULT_SCALE: u64 = 1000;

/// Confidence is a percentage.
pub const MAX_CONFIDENCE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestStatus {
    Created,
    Fulfilled,
}

/// One consumer request and, once answered, its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub id: RequestId,
    pub requester: Address,
    pub input_data: Bytes,
    pub fee_paid: U256,
    pub fulfilled: bool,
    pub result: Option<U256>,
    pub confidence: Option<u8>,
    pub created_at: u64,
}

impl PredictionRequest {
    pub fn new(
        id: RequestId,
        requester: Address,
        input_data: Bytes,
        fee_paid: U256,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            requester,
            input_data,
            fee_paid,
            fulfilled: false,
            result: None,
            confidence: None,
            created_at,
        }
    }

    pub fn status(&self) -> RequestStatus {
        if self.fulfilled {
            RequestStatus::Fulfilled
        } else {
            RequestStatus::Created
        }
    }

    /// Terminal transition. Callers check `fulfilled` first.
    pub(crate) fn complete(&mut self, result: U256, confidence: u8) {
        self.fulfilled = true;
        self.result = Some(result);
        self.confidence = Some(confidence);
    }
}

/// Narrow a submitted confidence to the stored percentage.
pub fn checked_confidence(confidence: u64) -> crate::Result<u8> {
    u8::try_from(confidence)
        .ok()
        .filter(|c| *c <= MAX_CONFIDENCE)
        .ok_or(crate::OracleError::ConfidenceOutOfRange(confidence))
}

/// Apply a fulfillment to a record. Kept separate from the ledger so the
/// transition stays a pure function of the record. Returns the stored
/// confidence.
pub fn fulfill(request: &mut PredictionRequest, result: U256, confidence: u64) -> crate::Result<u8> {
    if request.fulfilled {
        return Err(crate::OracleError::AlreadyFulfilled(request.id));
    }
    let confidence = checked_confidence(confidence)?;
    request.complete(result, confidence);
    Ok(confidence)
}
