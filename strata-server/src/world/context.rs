//! Contains the state shared by all generation tasks of a world.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use flexstr::SharedStr;
use log::debug;
use strata_core::{ChunkPos, GenerationContext};

use super::chunk::{ProtoChunk, StructureStart};

/// Shared state of a world being generated.
pub struct WorldGenContext {
    seed: u64,
    dimension: SharedStr,
    generate_structures: bool,
    /// structure starts of all chunks that went through the structure start step
    structure_index: Mutex<HashMap<ChunkPos, Vec<StructureStart>>>,
}

impl WorldGenContext {
    /// Creates the context for a dimension of a world.
    #[must_use]
    pub fn new(seed: u64, dimension: &str, generate_structures: bool) -> Self {
        Self {
            seed,
            dimension: dimension.to_owned().into(),
            generate_structures,
            structure_index: Mutex::default(),
        }
    }

    /// The seed all generated content is derived from
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns `false` if structures are disabled for this world.
    #[must_use]
    pub fn generate_structures(&self) -> bool {
        self.generate_structures
    }

    /// Derives a pseudo-random value from the seed, a chunk position and a salt distinguishing
    /// the different uses.
    ///
    /// The same inputs always yield the same value, so regenerating a chunk yields the same
    /// content.
    #[must_use]
    #[expect(clippy::cast_sign_loss, reason = "only the bit pattern matters")]
    pub fn position_hash(&self, pos: ChunkPos, salt: u64) -> u64 {
        let x = u64::from(pos.x() as u32);
        let z = u64::from(pos.z() as u32);
        let mut value = self.seed ^ salt.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        value = split_mix(value ^ x);
        value = split_mix(value ^ ((z << 32) | z));
        split_mix(value)
    }

    /// Makes the structure starts of a chunk known to the world.
    pub fn on_structure_starts_available(&self, chunk: &ProtoChunk) {
        let starts = &chunk.content().structure_starts;
        if starts.is_empty() {
            return;
        }
        debug!(
            "{count} structure(s) starting in chunk {pos}",
            count = starts.len(),
            pos = chunk.pos()
        );
        self.structure_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chunk.pos(), starts.clone());
    }

    /// The known structure starts of the given chunk.
    #[must_use]
    pub fn structure_starts_at(&self, pos: ChunkPos) -> Vec<StructureStart> {
        self.structure_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pos)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of chunks known to contain structure starts.
    #[must_use]
    pub fn structure_chunk_count(&self) -> usize {
        self.structure_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl GenerationContext for WorldGenContext {
    fn dimension(&self) -> &str {
        &self.dimension
    }
}

fn split_mix(value: u64) -> u64 {
    let mut value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}
