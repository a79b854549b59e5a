//! Contains the chunk representations of the reference world.

use std::sync::Arc;

use flexstr::SharedStr;
use log::warn;
use strata_core::{ChunkAccess, ChunkPos, ChunkStatus};

/// Number of columns along each horizontal axis of a chunk
pub const CHUNK_SIZE: usize = 16;

/// Number of columns within a chunk
pub const COLUMN_COUNT: usize = CHUNK_SIZE * CHUNK_SIZE;

/// The height below which terrain is flooded
pub const SEA_LEVEL: i32 = 63;

/// The climate of a chunk, which drives the shape of its terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Biome {
    /// deep water
    Ocean,
    /// flat grass land
    Plains,
    /// hilly grass land covered with trees
    Forest,
    /// flat sand
    Desert,
    /// high and rough stone
    Mountains,
}

impl Biome {
    /// All biomes
    pub const ALL: [Self; 5] = [
        Self::Ocean,
        Self::Plains,
        Self::Forest,
        Self::Desert,
        Self::Mountains,
    ];

    /// The average terrain height
    #[must_use]
    pub fn base_height(self) -> i32 {
        match self {
            Self::Ocean => 48,
            Self::Plains => 68,
            Self::Forest => 72,
            Self::Desert => 66,
            Self::Mountains => 96,
        }
    }

    /// The maximum deviation from the base height
    #[must_use]
    pub fn height_variation(self) -> i32 {
        match self {
            Self::Ocean => 6,
            Self::Plains => 3,
            Self::Forest => 8,
            Self::Desert => 5,
            Self::Mountains => 40,
        }
    }

    /// The block covering the terrain
    #[must_use]
    pub fn surface_block(self) -> SurfaceBlock {
        match self {
            Self::Ocean => SurfaceBlock::Gravel,
            Self::Plains | Self::Forest => SurfaceBlock::Grass,
            Self::Desert => SurfaceBlock::Sand,
            Self::Mountains => SurfaceBlock::Stone,
        }
    }
}

/// The top-most block of the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceBlock {
    /// dirt covered with grass
    Grass,
    /// loose sand
    Sand,
    /// loose gravel
    Gravel,
    /// bare rock
    Stone,
}

/// A structure whose origin lies within a chunk. It may extend into neighbouring chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureStart {
    kind: SharedStr,
    origin: ChunkPos,
    radius: u32,
}

impl StructureStart {
    /// Creates a structure covering all chunks within `radius` around `origin`.
    #[must_use]
    pub fn new(kind: SharedStr, origin: ChunkPos, radius: u32) -> Self {
        Self {
            kind,
            origin,
            radius,
        }
    }

    /// What kind of structure this is
    #[must_use]
    pub fn kind(&self) -> &SharedStr {
        &self.kind
    }

    /// The chunk containing the origin of the structure
    #[must_use]
    pub fn origin(&self) -> ChunkPos {
        self.origin
    }

    /// Number of chunk rings around the origin covered by the structure
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Returns `true` if the structure covers the given chunk.
    #[must_use]
    pub fn reaches(&self, pos: ChunkPos) -> bool {
        self.origin.chessboard_distance(pos) <= self.radius
    }
}

/// Everything generation stores within a chunk.
///
/// Each field is filled in by a particular step and stays at its default before.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkContent {
    /// structures originating in this chunk
    pub structure_starts: Vec<StructureStart>,
    /// origins of all structures reaching into this chunk
    pub structure_references: Vec<ChunkPos>,
    /// the climate of this chunk
    pub biome: Option<Biome>,
    /// terrain height per column; empty until the terrain has been shaped
    pub heights: Vec<i32>,
    /// the block covering the terrain
    pub surface: Option<SurfaceBlock>,
    /// number of columns carved out by caves
    pub carved_columns: u32,
    /// number of decorations, including those spilling over from neighbours
    pub decorations: u32,
    /// number of blocks emitting light
    pub light_sources: u32,
    /// light received from this chunk and its neighbours
    pub light_level: u32,
    /// `true` once light has been propagated
    pub light_correct: bool,
    /// number of mobs placed during generation
    pub spawned_mobs: u32,
}

/// A chunk which is still being generated or loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtoChunk {
    pos: ChunkPos,
    status: ChunkStatus,
    content: ChunkContent,
    /// stored by an older version and only being brought up to date
    upgrading: bool,
}

impl ProtoChunk {
    /// Creates a chunk without any content.
    #[must_use]
    pub fn new(pos: ChunkPos, status: ChunkStatus) -> Self {
        Self {
            pos,
            status,
            content: ChunkContent::default(),
            upgrading: false,
        }
    }

    /// Location within the chunk grid
    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// The status this chunk is known to have reached
    #[must_use]
    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    /// What has been generated so far
    #[must_use]
    pub fn content(&self) -> &ChunkContent {
        &self.content
    }

    /// Gives mutable access to the content
    pub fn content_mut(&mut self) -> &mut ChunkContent {
        &mut self.content
    }

    /// Returns `true` if this chunk was stored by an older version.
    #[must_use]
    pub fn is_upgrading(&self) -> bool {
        self.upgrading
    }

    /// Marks this chunk as stored by an older version.
    pub fn set_upgrading(&mut self, upgrading: bool) {
        self.upgrading = upgrading;
    }
}

/// A complete chunk taking part in the running world. It doesn't change anymore.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelChunk {
    pos: ChunkPos,
    status: ChunkStatus,
    content: ChunkContent,
}

impl LevelChunk {
    /// Promotes a proto chunk which reached the final status.
    #[must_use]
    pub fn from_proto(proto: ProtoChunk, status: ChunkStatus) -> Self {
        Self {
            pos: proto.pos,
            status,
            content: proto.content,
        }
    }

    /// Turns this chunk back into its storable representation.
    #[must_use]
    pub fn to_proto(&self) -> ProtoChunk {
        ProtoChunk {
            pos: self.pos,
            status: self.status,
            content: self.content.clone(),
            upgrading: false,
        }
    }

    /// Location within the chunk grid
    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// The final status of the pipeline
    #[must_use]
    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    /// Everything generation stored within this chunk
    #[must_use]
    pub fn content(&self) -> &ChunkContent {
        &self.content
    }
}

/// Any chunk representation the pipeline hands around.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldChunk {
    /// chunk still in progress
    Proto(ProtoChunk),
    /// complete chunk which may be shared
    Level(Arc<LevelChunk>),
}

impl WorldChunk {
    /// What has been generated so far
    #[must_use]
    pub fn content(&self) -> &ChunkContent {
        match self {
            Self::Proto(proto) => proto.content(),
            Self::Level(level) => level.content(),
        }
    }

    /// Returns the proto chunk or `None` if this chunk is complete.
    pub fn as_proto_mut(&mut self) -> Option<&mut ProtoChunk> {
        match self {
            Self::Proto(proto) => Some(proto),
            Self::Level(_) => None,
        }
    }

    /// Returns the complete chunk or `None` if it's still in progress.
    #[must_use]
    pub fn as_level(&self) -> Option<&Arc<LevelChunk>> {
        match self {
            Self::Proto(_) => None,
            Self::Level(level) => Some(level),
        }
    }

    /// Converts the chunk into its storable representation.
    #[must_use]
    pub fn to_proto(&self) -> ProtoChunk {
        match self {
            Self::Proto(proto) => proto.clone(),
            Self::Level(level) => level.to_proto(),
        }
    }
}

impl ChunkAccess for WorldChunk {
    fn pos(&self) -> ChunkPos {
        match self {
            Self::Proto(proto) => proto.pos,
            Self::Level(level) => level.pos,
        }
    }

    fn persisted_status(&self) -> ChunkStatus {
        match self {
            Self::Proto(proto) => proto.status,
            Self::Level(level) => level.status,
        }
    }

    fn is_proto(&self) -> bool {
        matches!(self, Self::Proto(_))
    }

    fn set_persisted_status(&mut self, status: ChunkStatus) {
        match self {
            Self::Proto(proto) => proto.status = status,
            Self::Level(level) => {
                warn!(
                    "ignoring status change of complete chunk {} to {status:?}",
                    level.pos
                );
            }
        }
    }
}
