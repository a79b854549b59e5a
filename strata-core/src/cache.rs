//! Contains `StaticCache2D`

use crate::{ChunkPos, PipelineError};

/// A fixed square of values centered on a chunk.
///
/// The square spans `2 * radius + 1` chunks in each direction. All values are created up front
/// and never change position, which makes lookups a simple index computation.
#[derive(Clone, Debug)]
pub struct StaticCache2D<T> {
    center: ChunkPos,
    radius: u32,
    /// side length of the square
    size: u32,
    /// row-major, starting at the lowest coordinates
    cache: Box<[T]>,
}

impl<T> StaticCache2D<T> {
    /// Creates the cache by calling `factory` once for each position within `radius` of `center`.
    ///
    /// # Errors
    ///
    /// Fails without calling `factory` if the square can't be allocated.
    pub fn create(
        center: ChunkPos,
        radius: u32,
        mut factory: impl FnMut(ChunkPos) -> T,
    ) -> Result<Self, PipelineError> {
        let too_large = || PipelineError::CacheTooLarge { radius };
        let size = radius
            .checked_mul(2)
            .and_then(|diameter| diameter.checked_add(1))
            .ok_or_else(too_large)?;
        let count = usize::try_from(size)
            .ok()
            .and_then(|side| side.checked_mul(side))
            .ok_or_else(too_large)?;
        let min = center.offset(-radius_offset(radius), -radius_offset(radius));

        let mut cache = Vec::new();
        cache
            .try_reserve_exact(count)
            .map_err(|_error| too_large())?;
        for dz in 0..size {
            for dx in 0..size {
                cache.push(factory(min.offset(radius_offset(dx), radius_offset(dz))));
            }
        }

        Ok(Self {
            center,
            radius,
            size,
            cache: cache.into_boxed_slice(),
        })
    }

    /// The chunk this cache is centered on.
    #[must_use]
    pub fn center(&self) -> ChunkPos {
        self.center
    }

    /// Number of chunk rings around the center.
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Check whether the given chunk is located within this cache
    #[must_use]
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.center.chessboard_distance(pos) <= self.radius
    }

    /// Returns the value at the given position or `None` if it's outside of this cache.
    #[must_use]
    pub fn get(&self, pos: ChunkPos) -> Option<&T> {
        self.index(pos).and_then(|index| self.cache.get(index))
    }

    /// Iterates all positions together with their values.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkPos, &T)> + '_ {
        let min = self
            .center
            .offset(-radius_offset(self.radius), -radius_offset(self.radius));
        let size = self.size as usize;
        self.cache.iter().enumerate().map(move |(index, value)| {
            let dx = u32::try_from(index % size).unwrap_or(u32::MAX);
            let dz = u32::try_from(index / size).unwrap_or(u32::MAX);
            (min.offset(radius_offset(dx), radius_offset(dz)), value)
        })
    }

    fn index(&self, pos: ChunkPos) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let radius = i64::from(self.radius);
        let dx = i64::from(pos.x()) - i64::from(self.center.x()) + radius;
        let dz = i64::from(pos.z()) - i64::from(self.center.z()) + radius;
        usize::try_from(dz * i64::from(self.size) + dx).ok()
    }
}

/// Converts an unsigned distance into a coordinate offset, saturating at `i32::MAX`.
fn radius_offset(distance: u32) -> i32 {
    i32::try_from(distance).unwrap_or(i32::MAX)
}
