use crate::{Database, DatabaseIterator, KeyValue, Result, StorageError, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory database implementation using BTreeMap
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn collect<'a>(entries: impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>) -> Box<dyn DatabaseIterator> {
        let entries: Vec<KeyValue> = entries.map(|(k, v)| (k.clone(), v.clone())).collect();
        Box::new(MemoryIterator {
            entries: entries.into_iter(),
        })
    }
}

impl Database for MemoryDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemoryBatch::default())
    }

    fn write_batch(&self, batch: Box<dyn WriteBatch>) -> Result<()> {
        let batch = batch.as_any()
            .downcast_ref::<MemoryBatch>()
            .ok_or_else(|| StorageError::InvalidData("Invalid batch type".to_string()))?;

        // Held for the whole batch so readers never see half of it.
        let mut data = self.data.write();
        for op in &batch.operations {
            match op {
                BatchOp::Put(key, value) => {
                    data.insert(key.clone(), value.clone());
                }
                BatchOp::Delete(key) => {
                    data.remove(key);
                }
            }
        }

        Ok(())
    }

    fn iter_from(&self, start_key: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        let data = self.data.read();
        Self::collect(data.range(start_key.to_vec()..))
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        let data = self.data.read();
        Self::collect(
            data.range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix)),
        )
    }
}

#[derive(Debug)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

#[derive(Debug, Default)]
struct MemoryBatch {
    operations: Vec<BatchOp>,
}

impl WriteBatch for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.operations.push(BatchOp::Put(key.to_vec(), value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.operations.push(BatchOp::Delete(key.to_vec()));
    }

    fn len(&self) -> usize {
        self.operations.len()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Snapshot of the matching entries, taken when the iterator is created.
struct MemoryIterator {
    entries: std::vec::IntoIter<KeyValue>,
}

impl DatabaseIterator for MemoryIterator {
    fn next(&mut self) -> Option<Result<KeyValue>> {
        self.entries.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_database_basic() {
        let db = MemoryDatabase::new();

        db.put(b"key1", b"value1").unwrap();
        assert_eq!(db.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        db.put(b"key1", b"value2").unwrap();
        assert_eq!(db.get(b"key1").unwrap(), Some(b"value2".to_vec()));

        db.delete(b"key1").unwrap();
        assert_eq!(db.get(b"key1").unwrap(), None);
        assert!(db.is_empty());
    }

    #[test]
    fn test_memory_database_batch() {
        let db = MemoryDatabase::new();
        db.put(b"key3", b"stale").unwrap();

        let mut batch = db.batch();
        batch.put(b"key1", b"value1");
        batch.put(b"key2", b"value2");
        batch.delete(b"key3");
        assert_eq!(batch.len(), 3);

        db.write_batch(batch).unwrap();

        assert_eq!(db.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(db.get(b"key2").unwrap(), Some(b"value2".to_vec()));
        assert!(!db.contains(b"key3").unwrap());
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_iter_from_and_prefix() {
        let db = MemoryDatabase::new();
        for key in [b"a".as_slice(), b"b1", b"b2", b"c"] {
            db.put(key, b"v").unwrap();
        }

        let mut iter = db.iter_from(b"b2");
        assert_eq!(iter.next().unwrap().unwrap().0, b"b2");
        assert_eq!(iter.next().unwrap().unwrap().0, b"c");
        assert!(iter.next().is_none());

        let mut iter = db.iter_prefix(b"b");
        let mut keys = Vec::new();
        while let Some(Ok((key, _))) = iter.next() {
            keys.push(key);
        }
        assert_eq!(keys, vec![b"b1".to_vec(), b"b2".to_vec()]);
    }
}
