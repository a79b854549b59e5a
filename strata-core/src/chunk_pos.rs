//! Contains the position of a chunk within the chunk grid.

use std::fmt::{self, Display};

use glam::IVec2;

/// The position of a chunk.
///
/// The position is _not_ measured in world coordinates. It can be viewed as a signed 2D-index,
/// where `(0, 0)` is the chunk at the world's center. The second component is called `z` to
/// match the horizontal axes of the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkPos(IVec2);

impl ChunkPos {
    /// Position of the chunk at the world's center
    pub const ZERO: Self = Self(IVec2::ZERO);

    /// Creates a chunk position from its grid coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self(IVec2::new(x, z))
    }

    /// The x-coordinate of this chunk within the grid.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// The z-coordinate of this chunk within the grid.
    #[must_use]
    pub const fn z(self) -> i32 {
        self.0.y
    }

    /// returns the inner position vector of this chunk
    #[must_use]
    pub const fn vec(self) -> IVec2 {
        self.0
    }

    /// Returns the chunk position with a given displacement.
    #[must_use]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self(self.0 + IVec2::new(dx, dz))
    }

    /// The number of chunk rings between `self` and `other`.
    ///
    /// This is the distance all dependency radii are measured in: every chunk within a square of
    /// side `2 * r + 1` around a center has a chessboard distance of at most `r`.
    #[must_use]
    pub fn chessboard_distance(self, other: Self) -> u32 {
        let delta = self.0 - other.0;
        delta.x.unsigned_abs().max(delta.y.unsigned_abs())
    }
}

impl Display for ChunkPos {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}, {}]", self.0.x, self.0.y)
    }
}

impl From<IVec2> for ChunkPos {
    fn from(value: IVec2) -> Self {
        Self(value)
    }
}

impl From<ChunkPos> for IVec2 {
    fn from(value: ChunkPos) -> Self {
        value.vec()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn chessboard_distance() {
        let center = ChunkPos::new(3, -2);
        assert_eq!(center.chessboard_distance(center), 0);
        assert_eq!(center.chessboard_distance(center.offset(1, 1)), 1);
        assert_eq!(center.chessboard_distance(center.offset(-4, 2)), 4);
        assert_eq!(center.chessboard_distance(center.offset(0, -7)), 7);
    }

    #[test]
    fn display() {
        assert_eq!(ChunkPos::new(-1, 12).to_string(), "[-1, 12]");
    }
}
