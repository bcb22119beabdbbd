use serde::{Deserialize, Serialize};

use crate::{BlockHash, TotalDifficulty};

/// A fully downloaded block waiting to be handed to the chain.
///
/// Only `number` and the hash linkage are read by the sync queue. The
/// payload is carried through untouched for the chain's importer.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub total_difficulty: TotalDifficulty,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(number: u64, hash: BlockHash, parent_hash: BlockHash) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            ..Default::default()
        }
    }

    /// Serialize block to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize block from bytes produced by [`Block::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
