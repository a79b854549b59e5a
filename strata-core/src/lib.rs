//! Contains the core types of the staged chunk pipeline.
//!
//! A chunk advances through an ordered list of [`ChunkStatus`]es. Each status is reached by
//! applying a [`ChunkStep`] which knows how far around the chunk its neighbours need to have
//! progressed ([`ChunkDependencies`]) and which asynchronous task does the actual work.

mod cache;
mod chunk_level;
mod chunk_pos;
mod dependencies;
mod error;
mod pyramid;
mod scheduling;
mod status;
mod step;
mod task;
#[cfg(test)]
mod testing;
pub mod vanilla;

pub use cache::*;
pub use chunk_level::*;
pub use chunk_pos::*;
pub use dependencies::*;
pub use error::*;
pub use pyramid::*;
pub use scheduling::*;
pub use status::*;
pub use step::*;
pub use task::*;
