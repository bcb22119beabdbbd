//! Sled-backed hash frontier.
//!
//! Hashes are stored as raw 32-byte values under position keys (see
//! [`crate::db`]). Every mutation is a single `sled::Batch`, so a returned
//! batch or a reset is committed as one unit.

use containers::BlockHash;
use parking_lot::Mutex;
use tracing::debug;

use crate::db::{decode_position, encode_position, Positions, HASH_STORE_TREE};
use crate::{HashStore, Result, StoreError};

/// Persistent [`HashStore`].
///
/// ## Thread Safety
///
/// Every method holds `positions` for its whole duration, so readers never
/// see a mutation half applied.
pub struct SledHashStore {
    tree: sled::Tree,
    positions: Mutex<Positions>,
}

impl std::fmt::Debug for SledHashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledHashStore")
            .field("positions", &*self.positions.lock())
            .finish()
    }
}

impl SledHashStore {
    /// Open the frontier tree of `db`, recovering whatever was committed.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db
            .open_tree(HASH_STORE_TREE)
            .map_err(|e| StoreError::Database(format!("open hash tree: {}", e)))?;
        let positions = Positions::recover(&tree)?;

        debug!(hashes = positions.len(), "Opened hash store");

        Ok(Self {
            tree,
            positions: Mutex::new(positions),
        })
    }

    fn decode_hash(value: &[u8]) -> Result<BlockHash> {
        BlockHash::from_slice(value).ok_or_else(|| {
            StoreError::Corruption(format!("stored hash of {} bytes", value.len()))
        })
    }

    fn insert_front(&self, positions: &mut Positions, hashes: &[BlockHash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }

        let start = positions.front_start(hashes.len())?;
        let mut batch = sled::Batch::default();
        for (offset, hash) in hashes.iter().enumerate() {
            batch.insert(&encode_position(start + offset as u64)[..], &hash.as_bytes()[..]);
        }
        self.tree
            .apply_batch(batch)
            .map_err(|e| StoreError::Database(format!("insert hashes: {}", e)))?;

        positions.head = start;
        Ok(())
    }

    /// Batch removing every stored entry.
    fn remove_all(&self) -> Result<sled::Batch> {
        let mut batch = sled::Batch::default();
        for key in self.tree.iter().keys() {
            let key = key.map_err(|e| StoreError::Database(format!("scan hashes: {}", e)))?;
            batch.remove(key);
        }
        Ok(batch)
    }
}

impl HashStore for SledHashStore {
    fn reset(&self, hash: BlockHash) -> Result<()> {
        let mut positions = self.positions.lock();
        let mut batch = self.remove_all()?;

        let fresh = Positions::new();
        let start = fresh.front_start(1)?;
        batch.insert(&encode_position(start)[..], &hash.as_bytes()[..]);
        self.tree
            .apply_batch(batch)
            .map_err(|e| StoreError::Database(format!("reset hashes: {}", e)))?;

        *positions = Positions {
            head: start,
            tail: fresh.tail,
        };
        Ok(())
    }

    fn push_front(&self, hash: BlockHash) -> Result<()> {
        let mut positions = self.positions.lock();
        self.insert_front(&mut positions, &[hash])
    }

    fn push_front_batch(&self, hashes: &[BlockHash]) -> Result<()> {
        let mut positions = self.positions.lock();
        self.insert_front(&mut positions, hashes)
    }

    fn push_back(&self, hash: BlockHash) -> Result<()> {
        let mut positions = self.positions.lock();
        let tail = positions.back_end(1)?;
        self.tree
            .insert(encode_position(positions.tail), &hash.as_bytes()[..])
            .map_err(|e| StoreError::Database(format!("append hash: {}", e)))?;
        positions.tail = tail;
        Ok(())
    }

    fn peek(&self) -> Result<BlockHash> {
        let _positions = self.positions.lock();
        match self
            .tree
            .first()
            .map_err(|e| StoreError::Database(format!("peek hash: {}", e)))?
        {
            Some((_, value)) => Self::decode_hash(&value),
            None => Err(StoreError::EmptyFrontier),
        }
    }

    fn drain_front(&self, max: usize) -> Result<Vec<BlockHash>> {
        let mut positions = self.positions.lock();

        let mut hashes = Vec::with_capacity(max.min(positions.len()));
        let mut batch = sled::Batch::default();
        let mut last_position = None;

        for entry in self.tree.iter().take(max) {
            let (key, value) =
                entry.map_err(|e| StoreError::Database(format!("drain hashes: {}", e)))?;
            hashes.push(Self::decode_hash(&value)?);
            last_position = Some(decode_position(&key)?);
            batch.remove(key);
        }

        if let Some(position) = last_position {
            self.tree
                .apply_batch(batch)
                .map_err(|e| StoreError::Database(format!("remove hashes: {}", e)))?;
            positions.pop_front(position);
        }

        Ok(hashes)
    }

    fn front(&self, count: usize) -> Result<Vec<BlockHash>> {
        let _positions = self.positions.lock();
        self.tree
            .iter()
            .values()
            .take(count)
            .map(|value| {
                let value =
                    value.map_err(|e| StoreError::Database(format!("list hashes: {}", e)))?;
                Self::decode_hash(&value)
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.positions.lock().len()
    }

    fn clear(&self) -> Result<()> {
        let mut positions = self.positions.lock();
        let batch = self.remove_all()?;
        self.tree
            .apply_batch(batch)
            .map_err(|e| StoreError::Database(format!("clear hashes: {}", e)))?;
        positions.reset();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|e| StoreError::Database(format!("flush hashes: {}", e)))?;
        Ok(())
    }
}
