//! Contains a storage keeping chunks in memory.

use std::collections::HashMap;

use anyhow::Result;
use log::trace;
use strata_core::{ChunkAccess, ChunkPos};

use super::{DATA_VERSION, WorldStorage};
use crate::world::chunk::{ProtoChunk, WorldChunk};

/// Keeps chunks in memory for as long as the storage lives.
///
/// Chunks are stored in their proto representation, exactly as a persistent storage would
/// serialize them, together with the data version they were written with.
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    chunks: HashMap<ChunkPos, (u32, ProtoChunk)>,
    /// version recorded for newly stored chunks
    data_version: u32,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_data_version(DATA_VERSION)
    }
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage which writes chunks as the given format version would.
    #[must_use]
    pub fn with_data_version(data_version: u32) -> Self {
        Self {
            chunks: HashMap::new(),
            data_version,
        }
    }

    /// Number of stored chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl WorldStorage for MemoryStorage {
    fn store_chunk(&mut self, chunk: &WorldChunk) -> Result<()> {
        let pos = chunk.pos();
        trace!("storing chunk {pos} with data version {}", self.data_version);
        self.chunks.insert(pos, (self.data_version, chunk.to_proto()));
        Ok(())
    }

    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<ProtoChunk>> {
        Ok(self.chunks.get(&pos).map(|(data_version, stored)| {
            let mut chunk = stored.clone();
            chunk.set_upgrading(*data_version < DATA_VERSION);
            chunk
        }))
    }
}
