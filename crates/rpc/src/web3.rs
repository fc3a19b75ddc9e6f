use predict_types::{Bytes, H256};

use crate::{Result, RpcError};

pub struct Web3Api {
    client_version: String,
}

impl Web3Api {
    pub fn new(client_version: String) -> Self {
        Self { client_version }
    }

    pub async fn client_version(&self) -> Result<String> {
        Ok(self.client_version.clone())
    }

    pub async fn sha3(&self, data: String) -> Result<H256> {
        let bytes = Bytes::from_hex(&data)
            .map_err(|e| RpcError::InvalidParams(e.to_string()))?;
        Ok(predict_crypto::keccak256(&bytes))
    }
}
