//! Contains a storage which never keeps anything.

use anyhow::Result;
use strata_core::ChunkPos;

use super::WorldStorage;
use crate::world::chunk::{ProtoChunk, WorldChunk};

/// A world storage provider which actually never stores or loads anything.
/// This is useful for temporary throwaway worlds and for worldgen tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyStorage;

impl WorldStorage for DummyStorage {
    fn store_chunk(&mut self, _chunk: &WorldChunk) -> Result<()> {
        Ok(())
    }

    fn load_chunk(&self, _pos: ChunkPos) -> Result<Option<ProtoChunk>> {
        Ok(None)
    }
}
