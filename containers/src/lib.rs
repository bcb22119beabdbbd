pub mod block;
pub mod types;

pub use block::Block;
pub use types::{BlockHash, TotalDifficulty};
