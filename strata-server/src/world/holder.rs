//! Contains the per-position state of the chunk map.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use strata_core::{ChunkAccess, ChunkPos, ChunkStatus};

use super::chunk::{LevelChunk, ProtoChunk, WorldChunk};

/// Keeps track of a single chunk while it's being advanced through the pipeline.
///
/// The chunk is taken out of the holder while a task works on it and put back afterwards, so
/// neighbouring tasks never observe a chunk which is in the middle of a step.
#[derive(Debug)]
pub struct ChunkHolder {
    pos: ChunkPos,
    chunk: Mutex<Option<WorldChunk>>,
    /// highest status whose work has been scheduled
    started_work: Mutex<Option<ChunkStatus>>,
}

impl ChunkHolder {
    /// Creates a holder without a chunk.
    #[must_use]
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            chunk: Mutex::default(),
            started_work: Mutex::default(),
        }
    }

    /// Location within the chunk grid
    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// The status the held chunk has reached, or `None` if there's no chunk (yet) or a task is
    /// currently working on it.
    #[must_use]
    pub fn persisted_status(&self) -> Option<ChunkStatus> {
        self.lock_chunk()
            .as_ref()
            .map(ChunkAccess::persisted_status)
    }

    /// The highest status whose work has been scheduled for this chunk.
    #[must_use]
    pub fn started_work(&self) -> Option<ChunkStatus> {
        *self
            .started_work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the work for `status`, whose predecessor in the catalog is `parent`.
    ///
    /// Returns `true` if the caller has to do the work and `false` if it has been started
    /// before.
    ///
    /// # Errors
    ///
    /// Fails if the work for `parent` hasn't been started yet, which would skip a status.
    pub fn acquire_status_bump(
        &self,
        status: ChunkStatus,
        parent: Option<ChunkStatus>,
    ) -> Result<bool> {
        let mut started_work = self
            .started_work
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *started_work == parent {
            *started_work = Some(status);
            return Ok(true);
        }
        match *started_work {
            Some(started) if started.is_or_after(status) => Ok(false),
            started => bail!(
                "unexpected last started work {started:?} of chunk {pos} when starting {status:?}",
                pos = self.pos
            ),
        }
    }

    /// Gives up a claim made by [`Self::acquire_status_bump`] whose work failed, so a later
    /// request claims `status` again.
    ///
    /// Does nothing if the holder has moved on to another status in the meantime.
    pub fn release_status_bump(&self, status: ChunkStatus, parent: Option<ChunkStatus>) {
        let mut started_work = self
            .started_work
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *started_work == Some(status) {
            *started_work = parent;
        }
    }

    /// Returns `true` if a chunk is held, i.e. no task is working on it.
    #[must_use]
    pub fn has_chunk(&self) -> bool {
        self.lock_chunk().is_some()
    }

    /// Takes the chunk out of the holder so a task may work on it.
    #[must_use]
    pub fn take_chunk(&self) -> Option<WorldChunk> {
        self.lock_chunk().take()
    }

    /// Puts a chunk (back) into the holder.
    pub fn put_chunk(&self, chunk: WorldChunk) {
        *self.lock_chunk() = Some(chunk);
    }

    /// Returns a copy of the held chunk.
    #[must_use]
    pub fn chunk(&self) -> Option<WorldChunk> {
        self.lock_chunk().clone()
    }

    /// Inspects the held chunk. Returns `None` if there's no chunk.
    pub fn with_chunk<R>(&self, inspect: impl FnOnce(&WorldChunk) -> R) -> Option<R> {
        self.lock_chunk().as_ref().map(inspect)
    }

    /// Modifies the held chunk as long as it's still in progress. Returns `None` if there's
    /// no chunk or it's already complete.
    pub fn with_proto_mut<R>(&self, modify: impl FnOnce(&mut ProtoChunk) -> R) -> Option<R> {
        self.lock_chunk()
            .as_mut()
            .and_then(WorldChunk::as_proto_mut)
            .map(modify)
    }

    /// Returns the held chunk if it's complete.
    #[must_use]
    pub fn level_chunk(&self) -> Option<Arc<LevelChunk>> {
        self.lock_chunk().as_ref().and_then(WorldChunk::as_level).cloned()
    }

    fn lock_chunk(&self) -> MutexGuard<'_, Option<WorldChunk>> {
        self.chunk.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
