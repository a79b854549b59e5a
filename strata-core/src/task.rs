//! Contains the contract between the pipeline and the code doing the actual work.

use std::{
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};

use flexstr::SharedStr;
use log::trace;

use crate::{ChunkPos, ChunkStatus};

/// The future returned by the task of a step. It resolves to the (possibly replaced) chunk.
pub type TaskFuture<C> = Pin<Box<dyn Future<Output = anyhow::Result<C>> + Send>>;

/// Bundles the types a concrete world plugs into the pipeline.
pub trait Generation: Send + Sync + 'static {
    /// Shared state of the generator (seed, registries, executors, …)
    type Context: GenerationContext;
    /// Whatever the driver stores per chunk position and hands to tasks as neighbourhood.
    type Holder: Send + Sync + 'static;
    /// The chunk representation being advanced.
    type Chunk: ChunkAccess;
}

/// Shared generator state. Apart from the dimension, the pipeline treats it as opaque.
pub trait GenerationContext: Send + Sync + 'static {
    /// Name of the dimension being generated, used to tell apart stage timings.
    fn dimension(&self) -> &str;
}

/// What the pipeline needs to know about a chunk.
pub trait ChunkAccess: Send + 'static {
    /// Location within the chunk grid
    fn pos(&self) -> ChunkPos;

    /// The status this chunk is known to have reached.
    fn persisted_status(&self) -> ChunkStatus;

    /// Returns `true` for the mutable, in-progress representation.
    fn is_proto(&self) -> bool;

    /// Records that this chunk reached the given status.
    ///
    /// Only meaningful for proto chunks; the pipeline never calls this for other representations.
    fn set_persisted_status(&mut self, status: ChunkStatus);
}

/// Measures how long a single stage took for a single chunk.
#[derive(Debug)]
#[must_use = "a timer only reports when being finished"]
pub struct StageTimer {
    pos: ChunkPos,
    dimension: SharedStr,
    status_name: SharedStr,
    start: Instant,
}

impl StageTimer {
    /// Starts measuring.
    pub fn start(pos: ChunkPos, dimension: &str, status_name: SharedStr) -> Self {
        Self {
            pos,
            dimension: dimension.to_owned().into(),
            status_name,
            start: Instant::now(),
        }
    }

    /// Stops measuring and reports the elapsed time.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        trace!(
            "{status} of chunk {pos} in '{dimension}' took {elapsed:?}",
            status = self.status_name,
            pos = self.pos,
            dimension = self.dimension,
        );
        elapsed
    }
}
