//! Contains the two pyramids of the reference world.
//!
//! Both use the statuses and requirements of [`vanilla`]. The generation pyramid creates content
//! while the loading pyramid only restores what a stored chunk needs at run time.

use strata_core::{
    ChunkPyramid, ChunkStatus, ChunkStepBuilder, PipelineError, StatusCatalog, vanilla,
};

use super::{
    StrataWorld,
    status_tasks::{self, Task},
};

type Requirements = fn(
    ChunkStatus,
    ChunkStepBuilder<StrataWorld>,
) -> Result<ChunkStepBuilder<StrataWorld>, PipelineError>;

/// Creates the pyramid generating chunks from scratch.
///
/// # Errors
///
/// Returns an error if `catalog` isn't the vanilla catalog.
pub fn generation_pyramid(
    catalog: &StatusCatalog,
) -> Result<ChunkPyramid<StrataWorld>, PipelineError> {
    build(catalog, vanilla::generation_requirements, generation_task)
}

/// Creates the pyramid bringing stored chunks up to date.
///
/// # Errors
///
/// Returns an error if `catalog` isn't the vanilla catalog.
pub fn loading_pyramid(
    catalog: &StatusCatalog,
) -> Result<ChunkPyramid<StrataWorld>, PipelineError> {
    build(catalog, vanilla::loading_requirements, loading_task)
}

fn generation_task(status: ChunkStatus) -> Option<Task> {
    match status {
        vanilla::STRUCTURE_STARTS => Some(status_tasks::generate_structure_starts),
        vanilla::STRUCTURE_REFERENCES => Some(status_tasks::generate_structure_references),
        vanilla::BIOMES => Some(status_tasks::generate_biomes),
        vanilla::NOISE => Some(status_tasks::generate_noise),
        vanilla::SURFACE => Some(status_tasks::generate_surface),
        vanilla::CARVERS => Some(status_tasks::generate_carvers),
        vanilla::FEATURES => Some(status_tasks::generate_features),
        vanilla::INITIALIZE_LIGHT => Some(status_tasks::initialize_light),
        vanilla::LIGHT => Some(status_tasks::light),
        vanilla::SPAWN => Some(status_tasks::generate_spawn),
        vanilla::FULL => Some(status_tasks::full),
        _ => None,
    }
}

fn loading_task(status: ChunkStatus) -> Option<Task> {
    match status {
        vanilla::STRUCTURE_STARTS => Some(status_tasks::load_structure_starts),
        vanilla::INITIALIZE_LIGHT => Some(status_tasks::initialize_light),
        vanilla::LIGHT => Some(status_tasks::light),
        vanilla::FULL => Some(status_tasks::full),
        _ => None,
    }
}

fn build(
    catalog: &StatusCatalog,
    requirements: Requirements,
    task_of: fn(ChunkStatus) -> Option<Task>,
) -> Result<ChunkPyramid<StrataWorld>, PipelineError> {
    let mut pyramid = ChunkPyramid::builder(catalog);
    for status in catalog.statuses() {
        pyramid = pyramid.step(status, |builder| {
            let builder = requirements(status, builder)?;
            Ok(match task_of(status) {
                Some(task) => builder.set_task(task),
                None => builder,
            })
        })?;
    }
    pyramid.build()
}
