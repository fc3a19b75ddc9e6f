use predict_types::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelState {
    pub name: String,
    pub trained: bool,
    pub trained_at: Option<u64>,
}

impl ModelState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trained: false,
            trained_at: None,
        }
    }

    pub fn mark_trained(&mut self, timestamp: u64) {
        self.trained = true;
        self.trained_at = Some(timestamp);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub prediction_fee: U256,
}

impl FeeConfig {
    pub fn new(prediction_fee: U256) -> Self {
        Self { prediction_fee }
    }

    pub fn covers(&self, paid: U256) -> bool {
        paid >= self.prediction_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retraining_moves_timestamp() {
        let mut model = ModelState::new("AI Prediction Model v1.0");
        assert!(!model.trained);
        model.mark_trained(10);
        model.mark_trained(20);
        assert!(model.trained);
        assert_eq!(model.trained_at, Some(20));
    }

    #[test]
    fn test_fee_covers() {
        let fee = FeeConfig::new(U256::from(100));
        assert!(fee.covers(U256::from(100)));
        assert!(fee.covers(U256::from(101)));
        assert!(!fee.covers(U256::from(99)));
    }
}
