use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::methods::RpcHandler;
use crate::{RpcErrorResponse, RpcRequest, RpcResponse};

pub struct RpcServer {
    handler: Arc<RpcHandler>,
    addr: SocketAddr,
    cors_origins: Vec<HeaderValue>,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, handler: Arc<RpcHandler>) -> Self {
        Self {
            handler,
            addr,
            cors_origins: Vec::new(),
        }
    }

    /// Browser origins allowed to call the server. None by default.
    pub fn with_cors_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn router(handler: Arc<RpcHandler>, cors_origins: &[HeaderValue]) -> Router {
        let router = Router::new()
            .route("/", post(handle_rpc_request))
            .route("/health", get(health_check));
        match cors_layer(cors_origins) {
            Some(cors) => router.layer(cors).with_state(handler),
            None => router.with_state(handler),
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let app = Self::router(self.handler, &self.cors_origins);
        let listener = TcpListener::bind(self.addr).await?;

        tracing::info!("JSON-RPC server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn handle_rpc_request(
    State(handler): State<Arc<RpcHandler>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    Json(dispatch(&handler, request).await)
}

/// Answer one JSON-RPC payload: a single request or a batch.
pub async fn dispatch(handler: &RpcHandler, request: Value) -> Value {
    if request.is_array() {
        let requests: Vec<RpcRequest> = match serde_json::from_value(request) {
            Ok(reqs) => reqs,
            Err(e) => return parse_error(e),
        };
        if requests.is_empty() {
            return error_value(-32600, "Invalid request: empty batch".to_string());
        }

        let mut responses = Vec::new();
        for req in requests {
            let response = process_single_request(handler, req).await;
            // Notifications get no reply.
            if response.id.is_some() {
                responses.push(response);
            }
        }

        serde_json::to_value(responses).unwrap_or(Value::Null)
    } else {
        let request: RpcRequest = match serde_json::from_value(request) {
            Ok(req) => req,
            Err(e) => return parse_error(e),
        };

        let response = process_single_request(handler, request).await;
        serde_json::to_value(response).unwrap_or(Value::Null)
    }
}

fn parse_error(e: serde_json::Error) -> Value {
    error_value(-32700, format!("Parse error: {}", e))
}

fn error_value(code: i32, message: String) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message },
        "id": null
    })
}

async fn process_single_request(handler: &RpcHandler, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.clone();

    match handler.handle_request(request).await {
        Ok(result) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        },
        Err(error) => {
            tracing::debug!("{} failed: {}", method, error);
            RpcResponse {
                jsonrpc: "2.0".to_string(),
                result: None,
                error: Some(RpcErrorResponse {
                    code: error.code(),
                    message: error.to_string(),
                    data: error.data(),
                }),
                id,
            }
        }
    }
}

/// CORS for the listed origins only; no layer at all when there are none.
fn cors_layer(origins: &[HeaderValue]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins.iter().cloned()))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::tests::{handler, signed};
    use predict_crypto::{key_address, secret_key_from_label};
    use serde_json::json;

    #[tokio::test]
    async fn test_single_request() {
        let handler = handler();
        let response = dispatch(
            &handler,
            json!({"jsonrpc": "2.0", "method": "oracle_predictionFee", "id": 7}),
        )
        .await;
        assert_eq!(response["result"], json!("0x3e8"));
        assert_eq!(response["id"], json!(7));
        assert!(response.get("error").is_none());
    }

    #[tokio::test]
    async fn test_batch_skips_notifications() {
        let handler = handler();
        let response = dispatch(
            &handler,
            json!([
                {"jsonrpc": "2.0", "method": "oracle_owner", "id": 1},
                {"jsonrpc": "2.0", "method": "oracle_treasury"},
                {"jsonrpc": "2.0", "method": "oracle_nope", "id": 2}
            ]),
        )
        .await;
        let responses = response.as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn test_error_payload_carries_kind() {
        let handler = handler();
        let key = secret_key_from_label("stranger");
        let params = signed("oracle_trainModel", json!([key_address(&key).to_string()]), &key, 1);
        let response = dispatch(
            &handler,
            json!({"jsonrpc": "2.0", "method": "oracle_trainModel", "params": params, "id": 3}),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32010));
        assert_eq!(response["error"]["data"], json!("Unauthorized"));
    }

    #[test]
    fn test_cors_is_opt_in() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&[HeaderValue::from_static("http://localhost:3000")]).is_some());
    }

    #[tokio::test]
    async fn test_malformed_payloads() {
        let handler = handler();
        let response = dispatch(&handler, json!({"method": 5})).await;
        assert_eq!(response["error"]["code"], json!(-32700));
        let response = dispatch(&handler, json!([])).await;
        assert_eq!(response["error"]["code"], json!(-32600));
    }
}
