//! Contains the ordered list of steps a chunk runs through.

use std::fmt::{self, Debug};

use crate::{ChunkStatus, ChunkStep, ChunkStepBuilder, Generation, PipelineError, StatusCatalog};

/// One step per status of a catalog, in pipeline order.
///
/// A world usually has two of them: one generating chunks from scratch and one bringing
/// chunks up to date which were loaded from storage.
pub struct ChunkPyramid<G: Generation> {
    steps: Box<[ChunkStep<G>]>,
}

impl<G: Generation> ChunkPyramid<G> {
    /// Starts assembling a pyramid for the given catalog.
    #[must_use]
    pub fn builder(catalog: &StatusCatalog) -> ChunkPyramidBuilder<'_, G> {
        ChunkPyramidBuilder {
            catalog,
            steps: Vec::with_capacity(catalog.len()),
        }
    }

    /// The step producing the given status.
    #[must_use]
    pub fn step_to(&self, status: ChunkStatus) -> Option<&ChunkStep<G>> {
        self.steps.get(status.index())
    }

    /// All steps in pipeline order.
    #[must_use]
    pub fn steps(&self) -> &[ChunkStep<G>] {
        &self.steps
    }

    /// Number of steps, which equals the number of statuses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for a pyramid without any steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<G: Generation> Debug for ChunkPyramid<G> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.steps.iter()).finish()
    }
}

/// Assembles a [`ChunkPyramid`] one step after the other.
pub struct ChunkPyramidBuilder<'catalog, G: Generation> {
    catalog: &'catalog StatusCatalog,
    steps: Vec<ChunkStep<G>>,
}

impl<G: Generation> ChunkPyramidBuilder<'_, G> {
    /// Adds the step producing `status`, which has to follow the previously added one.
    ///
    /// `configure` receives the prepared step builder and may add requirements, a write radius
    /// and a task.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` is out of order or `configure` fails.
    pub fn step(
        mut self,
        status: ChunkStatus,
        configure: impl FnOnce(ChunkStepBuilder<G>) -> Result<ChunkStepBuilder<G>, PipelineError>,
    ) -> Result<Self, PipelineError> {
        let builder = match self.steps.last() {
            Some(parent) => ChunkStepBuilder::successor(self.catalog, status, parent)?,
            None => ChunkStepBuilder::first(self.catalog, status)?,
        };
        let step = configure(builder)?.build()?;
        self.steps.push(step);
        Ok(self)
    }

    /// Finishes the pyramid.
    ///
    /// # Errors
    ///
    /// Returns an error unless every status of the catalog got a step.
    pub fn build(self) -> Result<ChunkPyramid<G>, PipelineError> {
        if self.steps.len() != self.catalog.len() {
            return Err(PipelineError::IncompletePyramid {
                steps: self.steps.len(),
                statuses: self.catalog.len(),
            });
        }
        Ok(ChunkPyramid {
            steps: self.steps.into_boxed_slice(),
        })
    }
}
