//! Test helpers shared by the unit tests of this crate.

use std::{future, sync::Arc};

use crate::{
    ChunkAccess, ChunkPos, ChunkPyramid, ChunkStatus, ChunkStep, ChunkStepBuilder, Generation,
    GenerationContext, PipelineError, StaticCache2D, TaskFuture, vanilla,
};

/// A generation without any behaviour, used to build pyramids.
pub(crate) struct Passive;

impl Generation for Passive {
    type Context = Self;
    type Holder = ();
    type Chunk = PassiveChunk;
}

impl GenerationContext for Passive {
    fn dimension(&self) -> &str {
        "passive"
    }
}

pub(crate) struct PassiveChunk(ChunkStatus);

impl ChunkAccess for PassiveChunk {
    fn pos(&self) -> ChunkPos {
        ChunkPos::ZERO
    }

    fn persisted_status(&self) -> ChunkStatus {
        self.0
    }

    fn is_proto(&self) -> bool {
        true
    }

    fn set_persisted_status(&mut self, status: ChunkStatus) {
        self.0 = status;
    }
}

pub(crate) fn passive_task(
    _context: &Arc<Passive>,
    _step: &ChunkStep<Passive>,
    _cache: &Arc<StaticCache2D<()>>,
    chunk: PassiveChunk,
) -> TaskFuture<PassiveChunk> {
    Box::pin(future::ready(Ok(chunk)))
}

type Requirements = fn(
    ChunkStatus,
    ChunkStepBuilder<Passive>,
) -> Result<ChunkStepBuilder<Passive>, PipelineError>;

fn pyramid(requirements: Requirements) -> ChunkPyramid<Passive> {
    let catalog = vanilla::catalog().unwrap();
    let mut builder = ChunkPyramid::builder(&catalog);
    for status in vanilla::ALL {
        builder = builder
            .step(status, |step| requirements(status, step))
            .unwrap();
    }
    builder.build().unwrap()
}

/// The vanilla generation and loading pyramids without any tasks.
pub(crate) fn vanilla_pyramids() -> (ChunkPyramid<Passive>, ChunkPyramid<Passive>) {
    (
        pyramid(vanilla::generation_requirements),
        pyramid(vanilla::loading_requirements),
    )
}
