//! Contains the mapping between ticket levels and statuses.

use crate::{ChunkDependencies, ChunkPyramid, ChunkStatus, Generation, PipelineError};

/// The ticket level at which a chunk needs to be complete.
pub const FULL_CHUNK_LEVEL: u32 = 33;

/// Translates ticket levels into the status a chunk needs to reach.
///
/// A chunk at [`FULL_CHUNK_LEVEL`] (or below) needs to be complete. Each level above that is one
/// ring further away from a complete chunk and therefore only needs to reach the status the
/// complete chunk requires from that ring. Beyond the largest ring, chunks aren't loaded at all.
#[derive(Clone, Debug)]
pub struct ChunkLevel {
    full_status: ChunkStatus,
    full_dependencies: ChunkDependencies,
    radius_around_full_chunk: u32,
}

impl ChunkLevel {
    /// Derives the levels from the step towards `full_status` of the generation pyramid.
    ///
    /// # Errors
    ///
    /// Returns an error if the pyramid has no step towards `full_status`.
    pub fn new<G: Generation>(
        generation: &ChunkPyramid<G>,
        full_status: ChunkStatus,
    ) -> Result<Self, PipelineError> {
        let full_step = generation
            .step_to(full_status)
            .ok_or(PipelineError::StatusNotCovered {
                status: full_status,
                covered: generation.len(),
            })?;
        let full_dependencies = full_step.accumulated_dependencies().clone();
        let radius_around_full_chunk =
            u32::try_from(full_dependencies.radius()).unwrap_or(u32::MAX);

        Ok(Self {
            full_status,
            full_dependencies,
            radius_around_full_chunk,
        })
    }

    /// Number of rings around a complete chunk which need to make progress.
    #[must_use]
    pub fn radius_around_full_chunk(&self) -> u32 {
        self.radius_around_full_chunk
    }

    /// The highest level at which a chunk is still loaded.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        FULL_CHUNK_LEVEL.saturating_add(self.radius_around_full_chunk)
    }

    /// Returns `true` if a chunk at the given level is loaded.
    #[must_use]
    pub fn is_loaded(&self, level: u32) -> bool {
        level <= self.max_level()
    }

    /// The status a chunk at the given level needs to reach. `None` if the chunk isn't loaded.
    #[must_use]
    pub fn generation_status(&self, level: u32) -> Option<ChunkStatus> {
        match level.checked_sub(FULL_CHUNK_LEVEL) {
            None | Some(0) => Some(self.full_status),
            Some(distance) if distance > self.radius_around_full_chunk => None,
            Some(distance) => usize::try_from(distance)
                .ok()
                .and_then(|radius| self.full_dependencies.get(radius)),
        }
    }

    /// The highest level at which a chunk still needs to reach the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` comes after the complete status.
    pub fn by_status(&self, status: ChunkStatus) -> Result<u32, PipelineError> {
        if status == self.full_status {
            return Ok(FULL_CHUNK_LEVEL);
        }
        let radius = self.full_dependencies.radius_of(status)?;
        Ok(FULL_CHUNK_LEVEL.saturating_add(u32::try_from(radius).unwrap_or(u32::MAX)))
    }
}
