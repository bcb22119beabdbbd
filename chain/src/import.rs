use std::fmt;

use async_trait::async_trait;
use containers::Block;
use serde::{Deserialize, Serialize};

/// Result of attempting to connect a block to the local chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    /// Block was connected.
    Success,
    /// Block's parent is not part of the local chain yet.
    NoParent,
    /// Block is already known to the chain.
    Exist,
    /// Block failed validation.
    Invalid,
}

impl ImportOutcome {
    /// Outcomes after which the block is not retried.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportOutcome::NoParent)
    }

    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportOutcome::Success => "success",
            ImportOutcome::NoParent => "no_parent",
            ImportOutcome::Exist => "exist",
            ImportOutcome::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain import capability.
///
/// Abstracts the validation and import pipeline to allow testing with mocks.
#[async_trait]
pub trait Blockchain: Send + Sync {
    /// Try to connect `block` to the chain.
    ///
    /// An `Err` means the import itself broke down. The sync queue logs it
    /// and moves on to the next block.
    async fn try_to_connect(&self, block: &Block) -> anyhow::Result<ImportOutcome>;

    /// Current head of the local chain. Genesis at minimum.
    fn best_block(&self) -> Block;
}
