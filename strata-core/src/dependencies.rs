//! Contains the table describing what a chunk requires from its neighbourhood.

use std::fmt::{self, Display};

use crate::{ChunkStatus, PipelineError};

/// Maps a radius around a chunk to the status all chunks at that distance need to have reached.
///
/// Radius 0 is the chunk itself, radius 1 its direct neighbours and so on. By convention the
/// requirements never increase with the radius: nearer chunks need to be further along than
/// farther ones. This convention isn't validated, but [`radius_of`](Self::radius_of) only yields
/// the minimum radius when it holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkDependencies {
    dependency_by_radius: Box<[ChunkStatus]>,
    /// indexed by status index
    radius_by_dependency: Box<[usize]>,
}

impl ChunkDependencies {
    /// Creates the table from a list of requirements where the index is the radius.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry at a larger radius has a higher index than the entry at
    /// radius 0, because the inverse lookup only covers the statuses up to the radius-0 entry.
    pub fn new(dependency_by_radius: impl Into<Box<[ChunkStatus]>>) -> Result<Self, PipelineError> {
        let dependency_by_radius = dependency_by_radius.into();
        let covered = dependency_by_radius
            .first()
            .map_or(0, |status| status.index() + 1);

        let mut radius_by_dependency = vec![0; covered].into_boxed_slice();
        for (radius, status) in dependency_by_radius.iter().enumerate() {
            // larger radii overwrite the entries of smaller ones
            let Some(slots) = radius_by_dependency.get_mut(..=status.index()) else {
                return Err(PipelineError::UncoveredRequirement {
                    radius,
                    status: *status,
                    covered,
                });
            };
            slots.fill(radius);
        }

        Ok(Self {
            dependency_by_radius,
            radius_by_dependency,
        })
    }

    /// Returns the radius up to which chunks need to have reached at least the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if this table was never built to answer for the given status, i.e. it
    /// comes after the requirement at radius 0.
    pub fn radius_of(&self, status: ChunkStatus) -> Result<usize, PipelineError> {
        self.radius_by_dependency
            .get(status.index())
            .copied()
            .ok_or(PipelineError::StatusNotCovered {
                status,
                covered: self.radius_by_dependency.len(),
            })
    }

    /// The largest radius having a requirement; 0 for an empty table.
    #[must_use]
    pub fn radius(&self) -> usize {
        self.dependency_by_radius.len().saturating_sub(1)
    }

    /// The requirement at the given radius.
    #[must_use]
    pub fn get(&self, radius: usize) -> Option<ChunkStatus> {
        self.dependency_by_radius.get(radius).copied()
    }

    /// Number of radii having a requirement.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependency_by_radius.len()
    }

    /// Returns `true` if nothing is required at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependency_by_radius.is_empty()
    }

    /// The requirements ordered by radius.
    #[must_use]
    pub fn as_slice(&self) -> &[ChunkStatus] {
        &self.dependency_by_radius
    }

    /// Iterates the requirements ordered by radius.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = ChunkStatus> + '_ {
        self.dependency_by_radius.iter().copied()
    }
}

impl Display for ChunkDependencies {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.dependency_by_radius.iter().map(|status| status.index()))
            .finish()
    }
}
