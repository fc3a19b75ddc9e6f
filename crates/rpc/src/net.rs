use crate::Result;

pub struct NetApi {
    chain_id: u64,
}

impl NetApi {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// Chain id of the configured network, as a decimal string.
    pub async fn version(&self) -> Result<String> {
        Ok(self.chain_id.to_string())
    }
}
