use rocksdb::{Direction, IteratorMode, Options, WriteBatch as RocksWriteBatch, DB};
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use crate::{Database, DatabaseIterator, KeyValue, Result, StorageError, WriteBatch as WriteBatchTrait};

/// Durable store for a node's data directory.
pub struct RocksDatabase {
    db: Arc<DB>,
}

impl RocksDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // The ledger's working set is small; keep memtables modest.
        opts.set_write_buffer_size(16 * 1024 * 1024);
        opts.set_max_write_buffer_number(2);
        opts.set_max_open_files(512);
        opts.set_compaction_style(rocksdb::DBCompactionStyle::Level);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
        })
    }

    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        DB::destroy(&Options::default(), path)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }
}

impl Database for RocksDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.get(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put(key, value)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db.delete(key)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        if !self.db.key_may_exist(key) {
            return Ok(false);
        }
        Ok(self.get(key)?.is_some())
    }

    fn batch(&self) -> Box<dyn WriteBatchTrait> {
        Box::new(RocksBatch::new())
    }

    fn write_batch(&self, batch: Box<dyn WriteBatchTrait>) -> Result<()> {
        let rocks_batch = batch.as_any()
            .downcast_ref::<RocksBatch>()
            .ok_or_else(|| StorageError::InvalidData("Invalid batch type".to_string()))?;

        let mut write = RocksWriteBatch::default();
        for op in &rocks_batch.operations {
            match op {
                (key, Some(value)) => write.put(key, value),
                (key, None) => write.delete(key),
            }
        }

        self.db.write(write)
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    fn iter_from(&self, start_key: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        Box::new(RocksIterator {
            iter: self.db.iterator(IteratorMode::From(start_key, Direction::Forward)),
            prefix: None,
        })
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn DatabaseIterator + '_> {
        Box::new(RocksIterator {
            iter: self.db.iterator(IteratorMode::From(prefix, Direction::Forward)),
            prefix: Some(prefix.to_vec()),
        })
    }
}

/// Pending operations, replayed into a native batch on write.
#[derive(Default)]
pub struct RocksBatch {
    operations: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl RocksBatch {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WriteBatchTrait for RocksBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.operations.push((key.to_vec(), Some(value.to_vec())));
    }

    fn delete(&mut self, key: &[u8]) {
        self.operations.push((key.to_vec(), None));
    }

    fn len(&self) -> usize {
        self.operations.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Forward iterator; with a prefix set it stops at the first key outside it.
pub struct RocksIterator<'a> {
    iter: rocksdb::DBIterator<'a>,
    prefix: Option<Vec<u8>>,
}

impl<'a> DatabaseIterator for RocksIterator<'a> {
    fn next(&mut self) -> Option<Result<KeyValue>> {
        let item = self.iter.next()?;
        match item {
            Ok((key, value)) => {
                if let Some(prefix) = &self.prefix {
                    if !key.starts_with(prefix) {
                        return None;
                    }
                }
                Some(Ok((key.to_vec(), value.to_vec())))
            }
            Err(e) => Some(Err(StorageError::DatabaseError(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rocksdb_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        let key = b"test_key";
        let value = b"test_value";
        db.put(key, value).unwrap();
        assert_eq!(db.get(key).unwrap(), Some(value.to_vec()));

        assert!(db.contains(key).unwrap());
        assert!(!db.contains(b"non_existent").unwrap());

        db.delete(key).unwrap();
        assert!(!db.contains(key).unwrap());
    }

    #[test]
    fn test_batch_operations() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();
        db.put(b"doomed", b"x").unwrap();

        let mut batch = db.batch();
        for i in 0..100 {
            let key = format!("key_{}", i);
            let value = format!("value_{}", i);
            batch.put(key.as_bytes(), value.as_bytes());
        }
        batch.delete(b"doomed");
        db.write_batch(batch).unwrap();

        for i in 0..100 {
            let key = format!("key_{}", i);
            assert!(db.contains(key.as_bytes()).unwrap());
        }
        assert!(!db.contains(b"doomed").unwrap());
    }

    #[test]
    fn test_prefix_iteration_stops_at_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDatabase::open(temp_dir.path()).unwrap();

        db.put(b"prefix_1", b"val1").unwrap();
        db.put(b"prefix_2", b"val2").unwrap();
        db.put(b"other", b"val3").unwrap();
        db.put(b"zzz", b"val4").unwrap();

        let mut iter = db.iter_prefix(b"prefix_");
        let mut count = 0;
        while let Some(result) = iter.next() {
            let (key, _) = result.unwrap();
            assert!(key.starts_with(b"prefix_"));
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let db = RocksDatabase::open(temp_dir.path()).unwrap();
            db.put(b"k", b"v").unwrap();
            db.flush().unwrap();
        }
        let db = RocksDatabase::open(temp_dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
