//! Contains the interface to wherever chunks are kept between runs.

pub mod dummy;
pub mod memory;

use anyhow::Result;
use strata_core::ChunkPos;

use super::chunk::{ProtoChunk, WorldChunk};

/// Version of the chunk format written by this build.
///
/// Storages mark chunks written by an earlier version as upgrading when loading them.
pub const DATA_VERSION: u32 = 1;

/// A place chunks can be stored in and loaded from.
pub trait WorldStorage: Send + Sync {
    /// Stores a given chunk, replacing any earlier version of it.
    ///
    /// # Errors
    ///
    /// Fails if the storage can't be written.
    fn store_chunk(&mut self, chunk: &WorldChunk) -> Result<()>;

    /// Tries to load a chunk from the storage.
    /// Returns `None`, if the requested chunk doesn't exist.
    ///
    /// Loaded chunks are always proto chunks. Complete chunks become complete again by running
    /// through the loading pyramid. Chunks stored with an older [`DATA_VERSION`] are marked as
    /// upgrading.
    ///
    /// # Errors
    ///
    /// Fails if the storage can't be read.
    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<ProtoChunk>>;
}
