//! Opaque domain payload
//!
//! The engine never inspects payload internals; it only clones, serializes,
//! and hands payloads to user-supplied operators and fitness modules.

use serde::{de::DeserializeOwned, Serialize};

/// Trait bound for the domain object carried by an individual
///
/// Payloads must be cheap to deep-copy (crossover and mutation always work on
/// copies, never on aliases), serializable for checkpointing, and sendable to
/// evaluation workers.
pub trait Payload: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}
