//! Built-in fulfiller: watches the node for new requests, runs a local model
//! over their input and submits the answer through the authority.

use predict_core::{LedgerEvent, OracleError, MAX_CONFIDENCE, RESULT_SCALE};
use predict_types::{Address, Bytes, RequestId, U256};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::NodeError;
use crate::node::NodeHandle;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Request carries no features")]
    EmptyInput,

    #[error("Model produced a non-finite value")]
    NonFinite,

    #[error(transparent)]
    Node(#[from] NodeError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Raw model output before fixed-point scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub value: f64,
    /// Percentage, 0 to 100.
    pub confidence: f64,
}

pub trait Predictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<Prediction>;
}

/// Single-layer logistic model.
///
/// Features beyond the weight vector are ignored; missing ones count as zero.
#[derive(Debug, Clone)]
pub struct LogisticPredictor {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticPredictor {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.weights.clone(), config.bias)
    }
}

impl Predictor for LogisticPredictor {
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        if features.is_empty() {
            return Err(BridgeError::EmptyInput);
        }

        let z = self
            .weights
            .iter()
            .zip(features)
            .fold(self.bias, |acc, (w, x)| acc + w * x);
        let p = 1.0 / (1.0 + (-z).exp());
        if !p.is_finite() {
            return Err(BridgeError::NonFinite);
        }

        Ok(Prediction {
            value: p,
            confidence: p.max(1.0 - p) * 100.0,
        })
    }
}

/// Parse request input into features: a UTF-8 JSON array of numbers such as
/// `[1.0, 2.0, 3.0]`, otherwise one feature per byte.
pub fn decode_input(input: &[u8]) -> Vec<f64> {
    std::str::from_utf8(input)
        .ok()
        .and_then(|text| serde_json::from_str::<Vec<f64>>(text).ok())
        .unwrap_or_else(|| input.iter().map(|b| f64::from(*b)).collect())
}

/// Fixed-point result and integer confidence as submitted to the ledger.
pub fn to_fulfillment(prediction: Prediction) -> Result<(U256, u8)> {
    if !prediction.value.is_finite() || !prediction.confidence.is_finite() {
        return Err(BridgeError::NonFinite);
    }

    // Float to int casts saturate; negatives land on zero.
    let scaled = (prediction.value * RESULT_SCALE as f64).trunc() as u128;
    let confidence = prediction.confidence.trunc().clamp(0.0, MAX_CONFIDENCE as f64) as u8;

    Ok((U256::from(scaled), confidence))
}

pub struct Bridge<P: Predictor> {
    node: NodeHandle,
    fulfiller: Address,
    predictor: P,
}

impl<P: Predictor> Bridge<P> {
    pub fn new(node: NodeHandle, fulfiller: Address, predictor: P) -> Self {
        Self {
            node,
            fulfiller,
            predictor,
        }
    }

    pub fn fulfiller(&self) -> Address {
        self.fulfiller
    }

    /// Predict and submit one request. Returns what was submitted.
    pub async fn handle_request(&self, request_id: RequestId, input: &Bytes) -> Result<(U256, u8)> {
        let features = decode_input(input);
        let (result, confidence) = to_fulfillment(self.predictor.predict(&features)?)?;

        self.node
            .fulfill_prediction(self.fulfiller, request_id, result, u64::from(confidence))
            .await?;

        info!("Fulfilled {:?}: result={} confidence={}%", request_id, result, confidence);
        Ok((result, confidence))
    }

    async fn handle_logged(&self, request_id: RequestId, input: &Bytes) {
        match self.handle_request(request_id, input).await {
            Ok(_) => {}
            // Someone else answered first.
            Err(BridgeError::Node(NodeError::Oracle(OracleError::AlreadyFulfilled(_)))) => {
                debug!("Request {:?} already fulfilled", request_id);
            }
            Err(e) => error!("Failed to fulfill {:?}: {}", request_id, e),
        }
    }

    /// Answer everything still open.
    pub async fn sweep_pending(&self) -> Result<usize> {
        let pending = self.node.pending_requests().await?;
        let count = pending.len();
        for request in pending {
            self.handle_logged(request.id, &request.input_data).await;
        }
        Ok(count)
    }

    /// Serve until the node shuts down.
    pub async fn run(self) {
        let mut events = self.node.subscribe();
        let mut shutdown = self.node.shutdown_signal();

        info!("Prediction bridge started as fulfiller {}", self.fulfiller);
        if let Err(e) = self.sweep_pending().await {
            error!("Initial sweep failed: {}", e);
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(record) => {
                        if let LedgerEvent::RequestCreated { request_id, input_data, .. } = record.event {
                            self.handle_logged(request_id, &input_data).await;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Bridge lagged {} events behind, sweeping open requests", missed);
                        if let Err(e) = self.sweep_pending().await {
                            error!("Sweep failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }

        info!("Prediction bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{dev_fulfiller, Config};
    use crate::node::Node;
    use predict_core::ManualClock;
    use predict_crypto::address_from_label;
    use predict_storage::{MemoryDatabase, OracleStore};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_decode_json_input() {
        assert_eq!(decode_input(b"[1.0,2.0,3.0]"), vec![1.0, 2.0, 3.0]);
        assert_eq!(decode_input(b" [ -1, 0.5 ] "), vec![-1.0, 0.5]);
    }

    #[test]
    fn test_decode_raw_bytes() {
        assert_eq!(decode_input(&[7, 0, 255]), vec![7.0, 0.0, 255.0]);
        assert_eq!(decode_input(b"ab"), vec![97.0, 98.0]);
        assert!(decode_input(b"").is_empty());
    }

    #[test]
    fn test_logistic_prediction() {
        let model = LogisticPredictor::new(vec![0.8, -0.4, 0.3], -0.1);
        // z = 0.8 - 0.8 + 0.9 - 0.1 = 0.8
        let prediction = model.predict(&[1.0, 2.0, 3.0]).unwrap();
        let expected = 1.0 / (1.0 + (-0.8f64).exp());
        assert!((prediction.value - expected).abs() < 1e-12);
        assert!((prediction.confidence - expected * 100.0).abs() < 1e-9);

        assert_eq!(to_fulfillment(prediction).unwrap(), (U256::from(689), 68));
        assert!(matches!(model.predict(&[]), Err(BridgeError::EmptyInput)));
    }

    #[test]
    fn test_confidence_is_symmetric() {
        let model = LogisticPredictor::new(vec![1.0], 0.0);
        let low = model.predict(&[-2.0]).unwrap();
        let high = model.predict(&[2.0]).unwrap();
        assert!((low.confidence - high.confidence).abs() < 1e-9);
        assert!(low.value < 0.5 && high.value > 0.5);
    }

    #[test]
    fn test_scaling_edges() {
        let clamp = |value, confidence| to_fulfillment(Prediction { value, confidence }).unwrap();
        assert_eq!(clamp(1.25, 85.9), (U256::from(1250), 85));
        assert_eq!(clamp(-3.0, 140.0), (U256::zero(), 100));
        assert_eq!(clamp(0.0009, -1.0), (U256::zero(), 0));
        assert!(to_fulfillment(Prediction { value: f64::NAN, confidence: 50.0 }).is_err());
    }

    proptest! {
        #[test]
        fn prop_logistic_output_is_submittable(
            features in prop::collection::vec(-1e3f64..1e3, 1..8),
            weights in prop::collection::vec(-5f64..5.0, 1..8),
            bias in -5f64..5.0,
        ) {
            let prediction = LogisticPredictor::new(weights, bias).predict(&features).unwrap();
            let (result, confidence) = to_fulfillment(prediction).unwrap();
            prop_assert!(result <= U256::from(RESULT_SCALE));
            prop_assert!((50..=100).contains(&confidence));
        }
    }

    #[tokio::test]
    async fn test_bridge_fulfills_new_requests() {
        let node = Node::spawn(
            &Config::default(),
            OracleStore::new(Arc::new(MemoryDatabase::new())),
            Arc::new(ManualClock::new(100)),
        )
        .unwrap();
        let handle = node.handle();
        let consumer = address_from_label("consumer");
        let fee = handle.prediction_fee().await.unwrap();

        // Opened before the bridge starts; picked up by the first sweep.
        let early = handle
            .request_prediction(consumer, fee, Bytes::from("[1.0,2.0,3.0]"))
            .await
            .unwrap();

        let mut events = handle.subscribe();
        let bridge = Bridge::new(handle.clone(), dev_fulfiller(), LogisticPredictor::new(vec![0.8, -0.4, 0.3], -0.1));
        let task = tokio::spawn(bridge.run());

        let late = handle
            .request_prediction(consumer, fee, Bytes::from_slice(&[1, 2]))
            .await
            .unwrap();

        let mut fulfilled = Vec::new();
        while fulfilled.len() < 2 {
            let record = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            if let LedgerEvent::Fulfilled { request_id, .. } = record.event {
                fulfilled.push(request_id);
            }
        }
        assert!(fulfilled.contains(&early) && fulfilled.contains(&late));

        let answered = handle.get_prediction(early).await.unwrap();
        assert_eq!(answered.result, Some(U256::from(689)));
        assert_eq!(answered.confidence, Some(68));

        node.stop().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_bridge_is_rejected() {
        let node = Node::spawn(
            &Config::default(),
            OracleStore::new(Arc::new(MemoryDatabase::new())),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let handle = node.handle();
        let fee = handle.prediction_fee().await.unwrap();
        let id = handle
            .request_prediction(address_from_label("consumer"), fee, Bytes::from("[1]"))
            .await
            .unwrap();

        let bridge = Bridge::new(handle.clone(), address_from_label("impostor"), LogisticPredictor::new(vec![1.0], 0.0));
        let err = bridge.handle_request(id, &Bytes::from("[1]")).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Node(NodeError::Oracle(OracleError::Unauthorized { .. }))
        ));
        assert!(!handle.get_prediction(id).await.unwrap().fulfilled);
        node.stop().await;
    }
}
