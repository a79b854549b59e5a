//! Contains the work done by the individual steps of the reference world.
//!
//! All tasks share the signature required by the pipeline. They derive their content from the
//! world seed and the chunk position only, so generating a chunk twice yields the same result.
//! Tasks only look at neighbours within the radius their step declares.

use std::{future, sync::Arc};

use anyhow::{Result, anyhow, bail};
use flexstr::SharedStr;
use strata_core::{
    ChunkAccess, ChunkPos, ChunkStatus, ChunkStep, StaticCache2D, TaskFuture, vanilla,
};
use tokio::task;

use super::{
    StrataWorld,
    chunk::{
        Biome, COLUMN_COUNT, LevelChunk, ProtoChunk, SEA_LEVEL, StructureStart, SurfaceBlock,
        WorldChunk,
    },
    context::WorldGenContext,
    holder::ChunkHolder,
};

/// The neighbourhood handed to every task
pub type HolderCache = StaticCache2D<Arc<ChunkHolder>>;

/// The signature shared by all tasks of this module
pub type Task = fn(
    &Arc<WorldGenContext>,
    &ChunkStep<StrataWorld>,
    &Arc<HolderCache>,
    WorldChunk,
) -> TaskFuture<WorldChunk>;

const STRUCTURE_SALT: u64 = 0x5354_5255_4354;
const BIOME_SALT: u64 = 0x4249_4f4d;
const NOISE_SALT: u64 = 0x4e4f_4953_4500;
const CARVER_SALT: u64 = 0x4341_5256;
const FEATURE_SALT: u64 = 0x4645_4154;

/// One in this many chunks contains the start of a structure.
const STRUCTURE_RARITY: u64 = 6;
const STRUCTURE_KINDS: [&str; 3] = ["tower", "ruin", "village"];
/// Structures never reach further than the structure start requirement of the pipeline.
const MAX_STRUCTURE_RADIUS: u64 = 4;

/// Size of the square (in chunks) sharing the same biome
const BIOME_REGION_SHIFT: i32 = 2;

/// Decides which structures start within the chunk and makes them known to the world.
pub fn generate_structure_starts(
    context: &Arc<WorldGenContext>,
    _step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let hash = context.position_hash(pos, STRUCTURE_SALT);
        let starts = if context.generate_structures() && hash % STRUCTURE_RARITY == 0 {
            let kind = pick(&STRUCTURE_KINDS, hash >> 8).unwrap_or("ruin");
            let radius = u32::try_from((hash >> 16) % MAX_STRUCTURE_RADIUS).unwrap_or_default() + 1;
            vec![StructureStart::new(SharedStr::from_static(kind), pos, radius)]
        } else {
            Vec::new()
        };
        proto.content_mut().structure_starts = starts;
        context.on_structure_starts_available(proto);
        Ok(())
    })
}

/// Makes the structure starts of a stored chunk known to the world.
pub fn load_structure_starts(
    context: &Arc<WorldGenContext>,
    _step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        context.on_structure_starts_available(proto);
        Ok(())
    })
}

/// Records the origins of all structures reaching into the chunk.
pub fn generate_structure_references(
    context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let mut references: Vec<ChunkPos> = proto
            .content()
            .structure_starts
            .iter()
            .map(StructureStart::origin)
            .collect();
        for holder in neighbours(cache, pos, radius_of(step, vanilla::STRUCTURE_STARTS)) {
            for start in context.structure_starts_at(holder.pos()) {
                if start.reaches(pos) && !references.contains(&start.origin()) {
                    references.push(start.origin());
                }
            }
        }
        references.sort_by_key(|origin| (origin.x(), origin.z()));
        proto.content_mut().structure_references = references;
        Ok(())
    })
}

/// Assigns the biome, which is shared by all chunks of a region.
pub fn generate_biomes(
    context: &Arc<WorldGenContext>,
    _step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let region = ChunkPos::new(pos.x() >> BIOME_REGION_SHIFT, pos.z() >> BIOME_REGION_SHIFT);
        let biome = pick(&Biome::ALL, context.position_hash(region, BIOME_SALT))
            .ok_or_else(|| anyhow!("no biome to choose from"))?;
        proto.content_mut().biome = Some(biome);
        Ok(())
    })
}

/// Shapes the terrain, blending into the biomes of the direct neighbours.
///
/// The column heights are computed on the blocking thread pool.
pub fn generate_noise(
    context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    mut chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    if !chunk.is_proto() {
        return Box::pin(future::ready(Ok(chunk)));
    }
    let pos = chunk.pos();
    let Some(biome) = chunk.content().biome else {
        return Box::pin(future::ready(Err(anyhow!("chunk {pos} has no biome"))));
    };
    let neighbour_heights: Vec<i32> = neighbours(cache, pos, radius_of(step, vanilla::BIOMES))
        .filter_map(|holder| holder.with_chunk(|neighbour| neighbour.content().biome).flatten())
        .map(Biome::base_height)
        .collect();
    let context = Arc::clone(context);

    Box::pin(async move {
        let heights =
            task::spawn_blocking(move || shape_terrain(&context, pos, biome, &neighbour_heights))
                .await?;
        if let Some(proto) = chunk.as_proto_mut() {
            proto.content_mut().heights = heights;
        }
        Ok(chunk)
    })
}

fn shape_terrain(
    context: &WorldGenContext,
    pos: ChunkPos,
    biome: Biome,
    neighbour_heights: &[i32],
) -> Vec<i32> {
    // the own biome counts twice as much as each neighbour
    let own_height = biome.base_height();
    let total = neighbour_heights.iter().copied().map(i64::from).sum::<i64>()
        + 2 * i64::from(own_height);
    let weight = i64::try_from(neighbour_heights.len()).unwrap_or_default() + 2;
    let base = total / weight;

    let variation = u64::from(biome.height_variation().unsigned_abs());
    let span = variation * 2 + 1;
    (0_u64..)
        .take(COLUMN_COUNT)
        .map(|column| {
            let hash = context.position_hash(pos, NOISE_SALT.wrapping_add(column));
            let offset = i64::try_from(hash % span).unwrap_or_default()
                - i64::try_from(variation).unwrap_or_default();
            i32::try_from(base + offset).unwrap_or(own_height)
        })
        .collect()
}

/// Covers the terrain. Land next to an ocean becomes a beach.
pub fn generate_surface(
    _context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let Some(biome) = proto.content().biome else {
            bail!("chunk {pos} has no biome");
        };
        let coast = biome != Biome::Ocean
            && neighbours(cache, pos, radius_of(step, vanilla::BIOMES)).any(|holder| {
                holder.with_chunk(|neighbour| neighbour.content().biome) == Some(Some(Biome::Ocean))
            });
        proto.content_mut().surface = Some(if coast {
            SurfaceBlock::Sand
        } else {
            biome.surface_block()
        });
        Ok(())
    })
}

/// Carves caves into columns above sea level.
pub fn generate_carvers(
    context: &Arc<WorldGenContext>,
    _step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let carved = proto
            .content()
            .heights
            .iter()
            .zip(0_u64..)
            .filter(|&(height, column)| {
                // one in 16 columns above sea level
                *height > SEA_LEVEL
                    && context.position_hash(pos, CARVER_SALT.wrapping_add(column)) >> 60 == 0
            })
            .count();
        proto.content_mut().carved_columns = u32::try_from(carved).unwrap_or(u32::MAX);
        Ok(())
    })
}

/// Places decorations. Some of them spill over into neighbours within the write radius, as
/// long as those haven't collected their light sources yet.
pub fn generate_features(
    context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let pos = proto.pos();
        let Some(biome) = proto.content().biome else {
            bail!("chunk {pos} has no biome");
        };
        let hash = context.position_hash(pos, FEATURE_SALT);
        proto.content_mut().decorations +=
            decoration_density(biome) + u32::try_from(hash % 3).unwrap_or_default();

        if decoration_density(biome) == 0 {
            return Ok(());
        }
        let write_radius = step.block_state_write_radius().unwrap_or(0);
        for (holder, bit) in neighbours(cache, pos, write_radius).zip(0_u32..) {
            if hash.rotate_right(bit) & 1 == 0 {
                continue;
            }
            holder.with_proto_mut(|neighbour| {
                if neighbour.status().is_before(vanilla::INITIALIZE_LIGHT) {
                    neighbour.content_mut().decorations += 1;
                }
            });
        }
        Ok(())
    })
}

fn decoration_density(biome: Biome) -> u32 {
    match biome {
        Biome::Ocean => 0,
        Biome::Desert => 1,
        Biome::Mountains => 2,
        Biome::Plains => 3,
        Biome::Forest => 12,
    }
}

/// Returns `true` if light has been propagated through the chunk and is still valid.
fn is_lighted(proto: &ProtoChunk) -> bool {
    proto.status().is_or_after(vanilla::LIGHT) && proto.content().light_correct
}

/// Collects the light sources of the chunk.
///
/// Stored chunks run through this step again, which keeps their light if it was valid.
pub fn initialize_light(
    _context: &Arc<WorldGenContext>,
    _step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        let lighted = is_lighted(proto);
        let content = proto.content_mut();
        content.light_sources = content.decorations / 4 + content.carved_columns / 8;
        content.light_correct = lighted;
        Ok(())
    })
}

/// Propagates light from the chunk and its direct neighbours into the chunk.
pub fn light(
    _context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        if is_lighted(proto) {
            return Ok(());
        }
        let radius = radius_of(step, vanilla::INITIALIZE_LIGHT);
        let received: u32 = neighbours(cache, proto.pos(), radius)
            .filter_map(|holder| holder.with_chunk(|neighbour| neighbour.content().light_sources))
            .sum();
        let content = proto.content_mut();
        content.light_level = content.light_sources * 2 + received;
        content.light_correct = true;
        Ok(())
    })
}

/// Places the initial mobs. Chunks written by an older version already have theirs.
pub fn generate_spawn(
    _context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    modify(chunk, |proto| {
        if proto.is_upgrading() {
            return Ok(());
        }
        let pos = proto.pos();
        let Some(biome) = proto.content().biome else {
            bail!("chunk {pos} has no biome");
        };
        // mobs gather at the edges of their habitat
        let edge = neighbours(cache, pos, radius_of(step, vanilla::BIOMES)).any(|holder| {
            holder
                .with_chunk(|neighbour| neighbour.content().biome)
                .flatten()
                .is_some_and(|other| other != biome)
        });
        proto.content_mut().spawned_mobs = herd_size(biome) + u32::from(edge);
        Ok(())
    })
}

fn herd_size(biome: Biome) -> u32 {
    match biome {
        Biome::Ocean => 0,
        Biome::Desert => 1,
        Biome::Mountains => 2,
        Biome::Forest => 3,
        Biome::Plains => 4,
    }
}

/// Turns a proto chunk into a complete chunk. Complete chunks pass through unchanged.
pub fn full(
    _context: &Arc<WorldGenContext>,
    step: &ChunkStep<StrataWorld>,
    _cache: &Arc<HolderCache>,
    chunk: WorldChunk,
) -> TaskFuture<WorldChunk> {
    let chunk = match chunk {
        WorldChunk::Proto(proto) => WorldChunk::Level(Arc::new(LevelChunk::from_proto(
            proto,
            step.target_status(),
        ))),
        level @ WorldChunk::Level(_) => level,
    };
    Box::pin(future::ready(Ok(chunk)))
}

/// Applies `change` to a proto chunk. Complete chunks pass through untouched.
fn modify(
    mut chunk: WorldChunk,
    change: impl FnOnce(&mut ProtoChunk) -> Result<()>,
) -> TaskFuture<WorldChunk> {
    let result = chunk.as_proto_mut().map_or(Ok(()), change);
    Box::pin(future::ready(result.map(|()| chunk)))
}

/// How far around the chunk a step requires `status`. Tasks don't look any further for content
/// produced by that status.
fn radius_of(step: &ChunkStep<StrataWorld>, status: ChunkStatus) -> u32 {
    step.direct_dependencies()
        .radius_of(status)
        .ok()
        .and_then(|radius| u32::try_from(radius).ok())
        .unwrap_or(0)
}

/// All holders within `radius` around `center`, excluding `center` itself.
fn neighbours(
    cache: &HolderCache,
    center: ChunkPos,
    radius: u32,
) -> impl Iterator<Item = &Arc<ChunkHolder>> + '_ {
    cache
        .iter()
        .filter(move |(pos, _holder)| *pos != center && center.chessboard_distance(*pos) <= radius)
        .map(|(_pos, holder)| holder)
}

/// Chooses one of `options` based on a hash.
fn pick<T: Copy>(options: &[T], hash: u64) -> Option<T> {
    let len = u64::try_from(options.len()).ok().filter(|len| *len > 0)?;
    let index = usize::try_from(hash % len).ok()?;
    options.get(index).copied()
}

#[cfg(test)]
mod tests {

    use pollster::block_on;
    use strata_core::{ChunkPyramid, StatusCatalog};

    use super::*;
    use crate::world::pyramids::{generation_pyramid, loading_pyramid};

    fn pyramids() -> (ChunkPyramid<StrataWorld>, ChunkPyramid<StrataWorld>) {
        let catalog: StatusCatalog = vanilla::catalog().unwrap();
        (
            generation_pyramid(&catalog).unwrap(),
            loading_pyramid(&catalog).unwrap(),
        )
    }

    fn context() -> Arc<WorldGenContext> {
        Arc::new(WorldGenContext::new(1234, "overworld", true))
    }

    fn proto(pos: ChunkPos, status: ChunkStatus, biome: Option<Biome>) -> WorldChunk {
        let mut proto = ProtoChunk::new(pos, status);
        proto.content_mut().biome = biome;
        WorldChunk::Proto(proto)
    }

    /// Creates holders around the origin. The center stays empty like it would while a task
    /// works on it.
    fn neighbourhood(
        radius: u32,
        prepare: impl Fn(ChunkPos) -> Option<WorldChunk>,
    ) -> Arc<HolderCache> {
        Arc::new(StaticCache2D::create(ChunkPos::ZERO, radius, |pos| {
            let holder = Arc::new(ChunkHolder::new(pos));
            if pos != ChunkPos::ZERO {
                if let Some(chunk) = prepare(pos) {
                    holder.put_chunk(chunk);
                }
            }
            holder
        })
        .unwrap())
    }

    fn run(
        step: &ChunkStep<StrataWorld>,
        context: &Arc<WorldGenContext>,
        cache: &Arc<HolderCache>,
        chunk: WorldChunk,
    ) -> Result<WorldChunk> {
        block_on(step.apply(context, cache, chunk))
    }

    fn as_proto(chunk: WorldChunk) -> ProtoChunk {
        match chunk {
            WorldChunk::Proto(proto) => proto,
            WorldChunk::Level(level) => panic!("unexpected complete chunk {}", level.pos()),
        }
    }

    #[test]
    fn structure_starts_are_rare_and_registered() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::STRUCTURE_STARTS).unwrap();
        let context = context();
        let cache = neighbourhood(0, |_pos| None);

        let mut with_structures = 0;
        for x in 0..16 {
            for z in 0..16 {
                let pos = ChunkPos::new(x, z);
                let chunk = run(step, &context, &cache, proto(pos, vanilla::EMPTY, None)).unwrap();
                assert_eq!(chunk.persisted_status(), vanilla::STRUCTURE_STARTS);
                let starts = &chunk.content().structure_starts;
                assert!(starts.len() <= 1);
                if let Some(start) = starts.first() {
                    with_structures += 1;
                    assert_eq!(start.origin(), pos);
                    assert!((1..=4).contains(&start.radius()));
                    assert_eq!(context.structure_starts_at(pos), starts.clone());
                }
            }
        }
        assert!(with_structures > 0, "some chunks should contain structures");
        assert!(with_structures < 128, "structures should be rare");
        assert_eq!(context.structure_chunk_count(), with_structures);
    }

    #[test]
    fn structures_can_be_disabled() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::STRUCTURE_STARTS).unwrap();
        let context = Arc::new(WorldGenContext::new(1234, "overworld", false));
        let cache = neighbourhood(0, |_pos| None);

        for x in 0..16 {
            let pos = ChunkPos::new(x, 0);
            let chunk = run(step, &context, &cache, proto(pos, vanilla::EMPTY, None)).unwrap();
            assert!(chunk.content().structure_starts.is_empty());
        }
        assert_eq!(context.structure_chunk_count(), 0);
    }

    #[test]
    fn loaded_structure_starts_are_registered() {
        let (_generation, loading) = pyramids();
        let step = loading.step_to(vanilla::STRUCTURE_STARTS).unwrap();
        let context = context();
        let cache = neighbourhood(0, |_pos| None);
        let pos = ChunkPos::new(3, 3);

        let mut stored = ProtoChunk::new(pos, vanilla::FULL);
        let start = StructureStart::new(SharedStr::from_static("tower"), pos, 2);
        stored.content_mut().structure_starts.push(start.clone());
        let chunk = run(step, &context, &cache, WorldChunk::Proto(stored)).unwrap();

        assert_eq!(chunk.persisted_status(), vanilla::FULL);
        assert_eq!(context.structure_starts_at(pos), vec![start]);
    }

    #[test]
    fn references_point_to_reaching_structures() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::STRUCTURE_REFERENCES).unwrap();
        let context = context();
        let cache = neighbourhood(3, |pos| Some(proto(pos, vanilla::STRUCTURE_STARTS, None)));

        for (origin, radius) in [(ChunkPos::new(2, 0), 2), (ChunkPos::new(3, 3), 1)] {
            let mut chunk = ProtoChunk::new(origin, vanilla::STRUCTURE_STARTS);
            chunk
                .content_mut()
                .structure_starts
                .push(StructureStart::new(SharedStr::from_static("ruin"), origin, radius));
            context.on_structure_starts_available(&chunk);
        }

        let chunk = run(
            step,
            &context,
            &cache,
            proto(ChunkPos::ZERO, vanilla::STRUCTURE_STARTS, None),
        )
        .unwrap();
        assert_eq!(
            chunk.content().structure_references,
            vec![ChunkPos::new(2, 0)]
        );
    }

    #[test]
    fn biomes_are_shared_within_a_region() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::BIOMES).unwrap();
        let context = context();
        let cache = neighbourhood(0, |_pos| None);

        let biome_at = |pos| {
            run(step, &context, &cache, proto(pos, vanilla::STRUCTURE_REFERENCES, None))
                .unwrap()
                .content()
                .biome
        };
        let region = biome_at(ChunkPos::new(0, 0));
        assert!(region.is_some());
        assert_eq!(biome_at(ChunkPos::new(3, 3)), region);
        assert_eq!(biome_at(ChunkPos::new(1, 2)), region);
    }

    #[tokio::test]
    async fn noise_blends_neighbouring_biomes() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::NOISE).unwrap();
        let context = context();

        let cache = neighbourhood(1, |pos| Some(proto(pos, vanilla::BIOMES, Some(Biome::Plains))));
        let chunk = step
            .apply(
                &context,
                &cache,
                proto(ChunkPos::ZERO, vanilla::BIOMES, Some(Biome::Plains)),
            )
            .await
            .unwrap();
        let heights = &chunk.content().heights;
        assert_eq!(heights.len(), COLUMN_COUNT);
        assert!(heights.iter().all(|height| (65..=71).contains(height)));

        // mountains around raise the terrain
        let cache = neighbourhood(1, |pos| {
            Some(proto(pos, vanilla::BIOMES, Some(Biome::Mountains)))
        });
        let chunk = step
            .apply(
                &context,
                &cache,
                proto(ChunkPos::ZERO, vanilla::BIOMES, Some(Biome::Plains)),
            )
            .await
            .unwrap();
        assert!(chunk.content().heights.iter().all(|height| *height > 80));
    }

    #[tokio::test]
    async fn noise_requires_a_biome() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::NOISE).unwrap();
        let cache = neighbourhood(1, |_pos| None);
        let result = step
            .apply(&context(), &cache, proto(ChunkPos::ZERO, vanilla::BIOMES, None))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn coasts_become_beaches() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::SURFACE).unwrap();
        let context = context();

        let inland = neighbourhood(1, |pos| Some(proto(pos, vanilla::NOISE, Some(Biome::Forest))));
        let chunk = run(
            step,
            &context,
            &inland,
            proto(ChunkPos::ZERO, vanilla::NOISE, Some(Biome::Forest)),
        )
        .unwrap();
        assert_eq!(chunk.content().surface, Some(SurfaceBlock::Grass));

        let coast = neighbourhood(1, |pos| {
            let biome = if pos.x() > 0 { Biome::Ocean } else { Biome::Forest };
            Some(proto(pos, vanilla::NOISE, Some(biome)))
        });
        let chunk = run(
            step,
            &context,
            &coast,
            proto(ChunkPos::ZERO, vanilla::NOISE, Some(Biome::Forest)),
        )
        .unwrap();
        assert_eq!(chunk.content().surface, Some(SurfaceBlock::Sand));
    }

    #[test]
    fn carvers_skip_flooded_columns() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::CARVERS).unwrap();
        let cache = neighbourhood(0, |_pos| None);

        let mut flooded = ProtoChunk::new(ChunkPos::new(7, 7), vanilla::SURFACE);
        flooded.content_mut().heights = vec![SEA_LEVEL; COLUMN_COUNT];
        let chunk = run(step, &context(), &cache, WorldChunk::Proto(flooded)).unwrap();
        assert_eq!(chunk.content().carved_columns, 0);

        let mut high = ProtoChunk::new(ChunkPos::new(7, 7), vanilla::SURFACE);
        high.content_mut().heights = vec![SEA_LEVEL + 20; COLUMN_COUNT];
        let chunk = run(step, &context(), &cache, WorldChunk::Proto(high)).unwrap();
        assert!(chunk.content().carved_columns > 0);
    }

    #[test]
    fn features_only_spill_into_unlit_neighbours() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::FEATURES).unwrap();
        let context = context();
        let cache = neighbourhood(2, |pos| {
            let status = if pos.x() < 0 {
                vanilla::INITIALIZE_LIGHT
            } else {
                vanilla::CARVERS
            };
            Some(proto(pos, status, Some(Biome::Forest)))
        });

        let chunk = run(
            step,
            &context,
            &cache,
            proto(ChunkPos::ZERO, vanilla::CARVERS, Some(Biome::Forest)),
        )
        .unwrap();
        assert!(chunk.content().decorations >= 12);

        let mut spilled = 0;
        for (pos, holder) in cache.iter() {
            let decorations = holder
                .with_chunk(|neighbour| neighbour.content().decorations)
                .unwrap_or_default();
            if pos.x() < 0 || pos.chessboard_distance(ChunkPos::ZERO) > 1 {
                assert_eq!(decorations, 0, "{pos} should be untouched");
            }
            spilled += decorations;
        }
        assert!(spilled <= 8);
    }

    #[test]
    fn light_includes_neighbouring_sources() {
        let (generation, _loading) = pyramids();
        let initialize = generation.step_to(vanilla::INITIALIZE_LIGHT).unwrap();
        let light = generation.step_to(vanilla::LIGHT).unwrap();
        let context = context();
        let cache = neighbourhood(1, |pos| {
            let mut neighbour = ProtoChunk::new(pos, vanilla::INITIALIZE_LIGHT);
            neighbour.content_mut().light_sources = 1;
            Some(WorldChunk::Proto(neighbour))
        });

        let mut center = ProtoChunk::new(ChunkPos::ZERO, vanilla::FEATURES);
        center.content_mut().decorations = 9;
        center.content_mut().carved_columns = 16;
        let chunk = run(initialize, &context, &cache, WorldChunk::Proto(center)).unwrap();
        assert_eq!(chunk.content().light_sources, 4);
        assert!(!chunk.content().light_correct);

        let chunk = as_proto(run(light, &context, &cache, chunk).unwrap());
        assert_eq!(chunk.content().light_level, 4 * 2 + 8);
        assert!(chunk.content().light_correct);
        assert_eq!(chunk.status(), vanilla::LIGHT);
    }

    #[test]
    fn valid_light_survives_loading() {
        let (_generation, loading) = pyramids();
        let context = context();
        let cache = neighbourhood(1, |_pos| None);

        let mut stored = ProtoChunk::new(ChunkPos::ZERO, vanilla::FULL);
        stored.content_mut().decorations = 8;
        stored.content_mut().light_sources = 2;
        stored.content_mut().light_level = 17;
        stored.content_mut().light_correct = true;

        let mut chunk = WorldChunk::Proto(stored.clone());
        for status in [vanilla::INITIALIZE_LIGHT, vanilla::LIGHT] {
            chunk = run(loading.step_to(status).unwrap(), &context, &cache, chunk).unwrap();
        }
        assert_eq!(as_proto(chunk), stored);
    }

    #[test]
    fn upgrading_chunks_keep_their_mobs() {
        let (generation, _loading) = pyramids();
        let step = generation.step_to(vanilla::SPAWN).unwrap();
        let context = context();
        let cache = neighbourhood(1, |pos| Some(proto(pos, vanilla::LIGHT, Some(Biome::Plains))));

        let chunk = run(
            step,
            &context,
            &cache,
            proto(ChunkPos::ZERO, vanilla::LIGHT, Some(Biome::Plains)),
        )
        .unwrap();
        assert_eq!(chunk.content().spawned_mobs, 4);

        let mut upgrading = ProtoChunk::new(ChunkPos::ZERO, vanilla::LIGHT);
        upgrading.content_mut().biome = Some(Biome::Plains);
        upgrading.set_upgrading(true);
        let chunk = run(step, &context, &cache, WorldChunk::Proto(upgrading)).unwrap();
        assert_eq!(chunk.content().spawned_mobs, 0);
        assert_eq!(chunk.persisted_status(), vanilla::SPAWN);
    }

    #[test]
    fn full_promotes_proto_chunks() {
        let (generation, loading) = pyramids();
        let context = context();
        let cache = neighbourhood(0, |_pos| None);
        let pos = ChunkPos::new(-1, -1);

        let mut spawned = ProtoChunk::new(pos, vanilla::SPAWN);
        spawned.content_mut().spawned_mobs = 2;
        let chunk = run(
            generation.step_to(vanilla::FULL).unwrap(),
            &context,
            &cache,
            WorldChunk::Proto(spawned.clone()),
        )
        .unwrap();
        let level = chunk.as_level().unwrap();
        assert_eq!(level.status(), vanilla::FULL);
        assert_eq!(level.content(), spawned.content());

        // complete chunks pass through
        let again = run(loading.step_to(vanilla::FULL).unwrap(), &context, &cache, chunk.clone())
            .unwrap();
        assert!(Arc::ptr_eq(again.as_level().unwrap(), level));
    }

    #[test]
    fn picks_stay_within_bounds() {
        assert_eq!(pick(&[1, 2, 3], 4), Some(2));
        assert_eq!(pick::<u8>(&[], 4), None);
        assert_eq!(pick(&Biome::ALL, u64::MAX), Some(Biome::Ocean));
    }
}
