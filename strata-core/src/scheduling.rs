//! Contains scheduling annotations derived from the pyramids.

use crate::{ChunkPyramid, ChunkStatus, Generation, PipelineError};

/// How the driver may schedule the step towards a single status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusScheduling {
    write_radius: Option<u32>,
    parallel_capable: bool,
    empty_generation_task: bool,
    empty_load_task: bool,
}

impl StatusScheduling {
    /// How far around a chunk the generation task modifies block states.
    #[must_use]
    pub fn write_radius(self) -> Option<u32> {
        self.write_radius
    }

    /// Chunks of the same layer may be advanced concurrently because the step neither reads
    /// nor writes any other chunk.
    #[must_use]
    pub fn parallel_capable(self) -> bool {
        self.parallel_capable
    }

    /// The generation step passes chunks through.
    #[must_use]
    pub fn empty_generation_task(self) -> bool {
        self.empty_generation_task
    }

    /// The loading step passes chunks through.
    #[must_use]
    pub fn empty_load_task(self) -> bool {
        self.empty_load_task
    }
}

/// Scheduling annotations for every status, kept apart from the otherwise descriptive catalog.
#[derive(Clone, Debug)]
pub struct SchedulingTable {
    /// indexed by status index
    entries: Box<[StatusScheduling]>,
}

impl SchedulingTable {
    /// Derives the annotations from the generation and loading pyramid of a world.
    ///
    /// # Errors
    ///
    /// Returns an error if both pyramids don't have the same number of steps.
    pub fn new<G: Generation>(
        generation: &ChunkPyramid<G>,
        loading: &ChunkPyramid<G>,
    ) -> Result<Self, PipelineError> {
        if generation.len() != loading.len() {
            return Err(PipelineError::IncompletePyramid {
                steps: loading.len(),
                statuses: generation.len(),
            });
        }

        let entries = generation
            .steps()
            .iter()
            .zip(loading.steps())
            .map(|(generation_step, loading_step)| {
                let write_radius = generation_step.block_state_write_radius();
                let reads_neighbours = generation_step.direct_dependencies().radius() > 0
                    || loading_step.direct_dependencies().radius() > 0;
                StatusScheduling {
                    write_radius,
                    parallel_capable: !reads_neighbours && write_radius.unwrap_or(0) == 0,
                    empty_generation_task: !generation_step.has_task(),
                    empty_load_task: !loading_step.has_task(),
                }
            })
            .collect();

        Ok(Self { entries })
    }

    /// The annotations of the given status.
    #[must_use]
    pub fn get(&self, status: ChunkStatus) -> Option<StatusScheduling> {
        self.entries.get(status.index()).copied()
    }

    /// Shorthand for checking whether a layer of the given status may run concurrently.
    /// Unknown statuses are never parallel capable.
    #[must_use]
    pub fn is_parallel_capable(&self, status: ChunkStatus) -> bool {
        self.get(status).is_some_and(StatusScheduling::parallel_capable)
    }
}
