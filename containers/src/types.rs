use alloy_primitives::{B256, U256};
use hex::FromHex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cumulative chain weight as reported by peers.
pub type TotalDifficulty = U256;

/// Fixed-length identifier of a block.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockHash(pub B256);

impl BlockHash {
    pub const LEN: usize = 32;

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; Self::LEN] = bytes.try_into().ok()?;
        Some(Self(B256::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    /// First three bytes in hex, used to keep log lines short.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..3])
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }
}

impl FromStr for BlockHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes: [u8; 32] = <[u8; 32]>::from_hex(s)?;
        Ok(Self::from(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
