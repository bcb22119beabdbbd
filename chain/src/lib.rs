//! Chain collaborator consumed by the sync queue.
//!
//! The sync queue never validates blocks itself. It hands them one at a
//! time to a [`Blockchain`] and only inspects the returned [`ImportOutcome`].

pub mod import;

pub use import::{Blockchain, ImportOutcome};
