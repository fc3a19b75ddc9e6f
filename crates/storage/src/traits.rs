use crate::{KeyValue, Result, StorageError};

/// Core database operations trait
pub trait Database: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Create a new batch for atomic writes
    fn batch(&self) -> Box<dyn WriteBatch>;

    /// Execute a batch of operations atomically
    fn write_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()>;

    /// Iterate from `start_key` (inclusive) to the end of the keyspace
    fn iter_from(&self, start_key: &[u8]) -> Box<dyn DatabaseIterator + '_>;

    /// Iterate over the keys that start with `prefix`, in key order
    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_>;
}

/// Batch operations for atomic writes
pub trait WriteBatch: Send {
    fn put(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Helper method for downcasting
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Database iterator trait
pub trait DatabaseIterator: Send {
    fn next(&mut self) -> Option<Result<KeyValue>>;
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
}

/// Extension trait for typed access to database
pub trait TypedDatabase: Database {
    /// Get a value and deserialize it
    fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.get(key)?.map(|bytes| decode(&bytes)).transpose()
    }

    /// Serialize and put a value
    fn put_typed<T: serde::Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        self.put(key, &encode(value)?)
    }
}

/// Implement TypedDatabase for all types that implement Database
impl<T: Database + ?Sized> TypedDatabase for T {}

/// Typed puts into a pending batch.
pub trait TypedBatch {
    fn put_typed<T: serde::Serialize>(&mut self, key: &[u8], value: &T) -> Result<()>;
}

impl TypedBatch for Box<dyn WriteBatch> {
    fn put_typed<T: serde::Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.put(key, &bytes);
        Ok(())
    }
}
