//! Contains a small reference world which drives chunks through the generation pipeline.
//!
//! The terrain it produces is a deterministic stand-in. It exists to exercise the pipeline end
//! to end: every stage reads and writes the neighbours its step declares, so a wrong schedule
//! shows up as missing or inconsistent content.

pub mod chunk;
pub mod chunk_map;
pub mod context;
pub mod holder;
pub mod pyramids;
pub mod status_tasks;
pub mod storage;

use std::sync::Arc;

use strata_core::Generation;

use self::{chunk::WorldChunk, context::WorldGenContext, holder::ChunkHolder};

/// Plugs the reference world into the pipeline.
#[derive(Debug)]
pub struct StrataWorld;

impl Generation for StrataWorld {
    type Context = WorldGenContext;
    type Holder = Arc<ChunkHolder>;
    type Chunk = WorldChunk;
}
