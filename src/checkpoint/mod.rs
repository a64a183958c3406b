//! Checkpointing and recovery

pub mod recovery;
pub mod state;

pub use recovery::{load_checkpoint, save_checkpoint, CheckpointManager, BINARY_MAGIC};
pub use state::{Checkpoint, CHECKPOINT_VERSION};

/// Prelude for checkpoint module
pub mod prelude {
    pub use super::recovery::{load_checkpoint, save_checkpoint, CheckpointManager};
    pub use super::state::{Checkpoint, CHECKPOINT_VERSION};
}
