//! The statuses of the classic generation pipeline and the requirements between them.
//!
//! The constants are only valid for a catalog created by [`catalog`].

use crate::{
    CatalogError, ChunkStatus, ChunkStepBuilder, ChunkType, Generation, HeightmapKind,
    PipelineError, StatusCatalog,
};

/// A freshly created chunk without any content.
pub const EMPTY: ChunkStatus = ChunkStatus::from_index(0);
/// Structures starting within the chunk have been decided.
pub const STRUCTURE_STARTS: ChunkStatus = ChunkStatus::from_index(1);
/// The chunk knows which structures of its neighbours reach into it.
pub const STRUCTURE_REFERENCES: ChunkStatus = ChunkStatus::from_index(2);
/// Biomes have been assigned.
pub const BIOMES: ChunkStatus = ChunkStatus::from_index(3);
/// The base terrain shape exists.
pub const NOISE: ChunkStatus = ChunkStatus::from_index(4);
/// Surface blocks have been placed.
pub const SURFACE: ChunkStatus = ChunkStatus::from_index(5);
/// Caves and canyons have been carved out.
pub const CARVERS: ChunkStatus = ChunkStatus::from_index(6);
/// Decorations and structures have been placed.
pub const FEATURES: ChunkStatus = ChunkStatus::from_index(7);
/// Light sources have been collected.
pub const INITIALIZE_LIGHT: ChunkStatus = ChunkStatus::from_index(8);
/// Light has been propagated.
pub const LIGHT: ChunkStatus = ChunkStatus::from_index(9);
/// Initial mobs have been spawned.
pub const SPAWN: ChunkStatus = ChunkStatus::from_index(10);
/// The chunk is complete and takes part in the running world.
pub const FULL: ChunkStatus = ChunkStatus::from_index(11);

/// All statuses in pipeline order.
pub const ALL: [ChunkStatus; 12] = [
    EMPTY,
    STRUCTURE_STARTS,
    STRUCTURE_REFERENCES,
    BIOMES,
    NOISE,
    SURFACE,
    CARVERS,
    FEATURES,
    INITIALIZE_LIGHT,
    LIGHT,
    SPAWN,
    FULL,
];

const DEFINITIONS: [(&str, &[HeightmapKind], ChunkType); 12] = [
    ("empty", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("structure_starts", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("structure_references", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("biomes", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("noise", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("surface", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("carvers", HeightmapKind::PRE_FEATURES, ChunkType::Proto),
    ("features", HeightmapKind::POST_FEATURES, ChunkType::Proto),
    ("initialize_light", HeightmapKind::POST_FEATURES, ChunkType::Proto),
    ("light", HeightmapKind::POST_FEATURES, ChunkType::Proto),
    ("spawn", HeightmapKind::POST_FEATURES, ChunkType::Proto),
    ("full", HeightmapKind::POST_FEATURES, ChunkType::Level),
];

/// Creates the catalog the constants of this module refer to.
///
/// # Errors
///
/// Returns an error if a status can't be registered, which would be a bug in this module.
pub fn catalog() -> Result<StatusCatalog, CatalogError> {
    let mut catalog = StatusCatalog::new();
    let mut parent = None;
    for (name, heightmaps, chunk_type) in DEFINITIONS {
        let status = catalog.register(name, parent, heightmaps, chunk_type)?;
        parent = Some(status);
    }
    Ok(catalog)
}

/// Adds what generating a chunk up to `status` requires from its neighbours.
///
/// # Errors
///
/// Returns an error if `builder` doesn't build the step towards `status`.
pub fn generation_requirements<G: Generation>(
    status: ChunkStatus,
    builder: ChunkStepBuilder<G>,
) -> Result<ChunkStepBuilder<G>, PipelineError> {
    match status {
        STRUCTURE_REFERENCES | BIOMES => builder.add_requirement(STRUCTURE_STARTS, 8),
        NOISE | SURFACE => Ok(builder
            .add_requirement(STRUCTURE_STARTS, 8)?
            .add_requirement(BIOMES, 1)?
            .block_state_write_radius(0)),
        CARVERS => Ok(builder
            .add_requirement(STRUCTURE_STARTS, 8)?
            .block_state_write_radius(0)),
        FEATURES => Ok(builder
            .add_requirement(STRUCTURE_STARTS, 8)?
            .add_requirement(CARVERS, 1)?
            .block_state_write_radius(1)),
        LIGHT => builder.add_requirement(INITIALIZE_LIGHT, 1),
        SPAWN => builder.add_requirement(BIOMES, 1),
        _ => Ok(builder),
    }
}

/// Adds what bringing a stored chunk up to `status` requires from its neighbours.
///
/// # Errors
///
/// Returns an error if `builder` doesn't build the step towards `status`.
pub fn loading_requirements<G: Generation>(
    status: ChunkStatus,
    builder: ChunkStepBuilder<G>,
) -> Result<ChunkStepBuilder<G>, PipelineError> {
    match status {
        LIGHT => builder.add_requirement(INITIALIZE_LIGHT, 1),
        _ => Ok(builder),
    }
}
