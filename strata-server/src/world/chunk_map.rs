//! Contains the driver which schedules the steps of all chunks around a requested one.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow, bail};
use log::{debug, trace};
use strata_core::{
    ChunkPos, ChunkPyramid, ChunkStatus, SchedulingTable, StaticCache2D, StatusCatalog,
    TaskFuture,
};
use tokio::task::JoinSet;

use super::{
    StrataWorld,
    chunk::{ProtoChunk, WorldChunk},
    context::WorldGenContext,
    holder::ChunkHolder,
    pyramids::{generation_pyramid, loading_pyramid},
    status_tasks::HolderCache,
    storage::WorldStorage,
};

/// All chunks of a world which are currently known, together with the machinery to advance
/// them.
pub struct ChunkMap {
    catalog: Arc<StatusCatalog>,
    context: Arc<WorldGenContext>,
    generation: ChunkPyramid<StrataWorld>,
    loading: ChunkPyramid<StrataWorld>,
    scheduling: SchedulingTable,
    /// This is where chunks are being loaded from and saved to.
    storage: Box<dyn WorldStorage>,
    holders: HashMap<ChunkPos, Arc<ChunkHolder>>,
}

impl ChunkMap {
    /// Creates an empty map.
    ///
    /// # Errors
    ///
    /// Fails if the pyramids can't be built for the given catalog.
    pub fn new(
        catalog: Arc<StatusCatalog>,
        context: Arc<WorldGenContext>,
        storage: Box<dyn WorldStorage>,
    ) -> Result<Self> {
        let generation = generation_pyramid(&catalog)?;
        let loading = loading_pyramid(&catalog)?;
        let scheduling = SchedulingTable::new(&generation, &loading)?;

        Ok(Self {
            catalog,
            context,
            generation,
            loading,
            scheduling,
            storage,
            holders: HashMap::new(),
        })
    }

    /// The statuses of this world
    #[must_use]
    pub fn catalog(&self) -> &Arc<StatusCatalog> {
        &self.catalog
    }

    /// The state shared by all generation tasks
    #[must_use]
    pub fn context(&self) -> &Arc<WorldGenContext> {
        &self.context
    }

    /// The pyramid generating chunks from scratch
    #[must_use]
    pub fn generation_pyramid(&self) -> &ChunkPyramid<StrataWorld> {
        &self.generation
    }

    /// Brings the chunk at `center` to `target`, together with everything it depends on.
    ///
    /// Chunks are loaded from storage if possible. Only if the stored chunks don't suffice,
    /// the missing content is generated.
    ///
    /// # Errors
    ///
    /// Fails if a task, the storage or the bookkeeping of the holders fails. The chunk whose
    /// step failed is put back at the status it had before, so the request can be retried.
    /// Whatever a failed task already wrote into neighbouring chunks is kept.
    pub async fn schedule_generation(
        &mut self,
        center: ChunkPos,
        target: ChunkStatus,
    ) -> Result<()> {
        let root = self
            .catalog
            .first()
            .ok_or_else(|| anyhow!("the catalog doesn't contain any status"))?;
        let target_step = self.generation.step_to(target).ok_or_else(|| {
            anyhow!("status {target:?} isn't covered by the generation pyramid")
        })?;
        let radius = u32::try_from(target_step.accumulated_radius_of(root)?)?;

        let holders = &mut self.holders;
        let cache = StaticCache2D::create(center, radius, |pos| {
            Arc::clone(
                holders
                    .entry(pos)
                    .or_insert_with(|| Arc::new(ChunkHolder::new(pos))),
            )
        })?;

        debug!(
            "scheduling {target} at {center} within radius {radius}",
            target = self.catalog.name(target)
        );
        GenerationTask {
            map: self,
            cache: Arc::new(cache),
            center,
            target,
            needs_generation: false,
        }
        .run(root)
        .await
    }

    /// Returns a copy of the chunk at the given position.
    #[must_use]
    pub fn chunk(&self, pos: ChunkPos) -> Option<WorldChunk> {
        self.holders.get(&pos).and_then(|holder| holder.chunk())
    }

    /// The status the chunk at the given position has reached.
    #[must_use]
    pub fn status_of(&self, pos: ChunkPos) -> Option<ChunkStatus> {
        self.holders
            .get(&pos)
            .and_then(|holder| holder.persisted_status())
    }

    /// Number of chunks which are present in memory.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.holders
            .values()
            .filter(|holder| holder.persisted_status().is_some())
            .count()
    }

    /// Writes all chunks to the storage and returns how many there were.
    ///
    /// # Errors
    ///
    /// Fails as soon as a chunk can't be stored.
    pub fn save_all(&mut self) -> Result<usize> {
        let mut saved = 0;
        for holder in self.holders.values() {
            if holder
                .with_chunk(|chunk| self.storage.store_chunk(chunk))
                .transpose()?
                .is_some()
            {
                saved += 1;
            }
        }
        debug!("saved {saved} chunks");
        Ok(saved)
    }

    /// Stores the chunk at the given position and forgets about it. Returns `false` if there
    /// was no chunk.
    ///
    /// Holders are never dropped on their own, so this is the only way to keep the map from
    /// growing with every request. A later request needing the chunk loads it again.
    ///
    /// # Errors
    ///
    /// Fails if the chunk can't be stored, in which case it stays in the map.
    pub fn unload(&mut self, pos: ChunkPos) -> Result<bool> {
        let Some(holder) = self.holders.get(&pos) else {
            return Ok(false);
        };
        let stored = holder
            .with_chunk(|chunk| self.storage.store_chunk(chunk))
            .transpose()?
            .is_some();
        self.holders.remove(&pos);
        trace!("unloaded chunk {pos}");
        Ok(stored)
    }

    /// Gives back the storage, dropping all chunks which haven't been saved.
    #[must_use]
    pub fn into_storage(self) -> Box<dyn WorldStorage> {
        self.storage
    }
}

/// Advances the chunks around `center` one layer (status) after the other.
///
/// Holders whose work for a status has already been started (by this or an earlier task) are
/// skipped, so overlapping requests never repeat a step.
struct GenerationTask<'map> {
    map: &'map ChunkMap,
    cache: Arc<HolderCache>,
    center: ChunkPos,
    target: ChunkStatus,
    /// `false` as long as stored chunks are expected to be sufficient
    needs_generation: bool,
}

impl GenerationTask<'_> {
    async fn run(mut self, root: ChunkStatus) -> Result<()> {
        self.schedule_layer(root).await?;
        if !self.can_load_without_generation() {
            trace!("chunk {} needs generation", self.center);
            self.needs_generation = true;
            self.schedule_layer(root).await?;
        }

        let statuses: Vec<ChunkStatus> = self
            .map
            .catalog
            .statuses()
            .filter(|status| status.is_after(root) && status.is_or_before(self.target))
            .collect();
        for status in statuses {
            self.schedule_layer(status).await?;
        }
        Ok(())
    }

    /// The pyramid determining how far around the center each status is needed.
    fn pyramid(&self) -> &ChunkPyramid<StrataWorld> {
        if self.needs_generation {
            &self.map.generation
        } else {
            &self.map.loading
        }
    }

    async fn schedule_layer(&self, status: ChunkStatus) -> Result<()> {
        let step_to_target = self
            .pyramid()
            .step_to(self.target)
            .ok_or_else(|| anyhow!("status {:?} isn't covered by the pyramid", self.target))?;
        let radius = u32::try_from(step_to_target.accumulated_radius_of(status)?)?;
        let parent = self.map.catalog.parent(status);
        let is_root = self.map.catalog.is_root(status);
        let parallel = self.map.scheduling.is_parallel_capable(status);
        trace!(
            "layer {name} around {center} within radius {radius}{mode}",
            name = self.map.catalog.name(status),
            center = self.center,
            mode = if parallel { " (parallel)" } else { "" }
        );

        let mut result = Ok(());
        let mut pending = JoinSet::new();
        // copies of the chunks handed to parallel tasks, to restore those which don't come back
        let mut in_flight = Vec::new();
        for (pos, holder) in self.cache.iter() {
            if self.center.chessboard_distance(pos) > radius {
                continue;
            }
            match holder.acquire_status_bump(status, parent) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }

            let started = if is_root {
                self.load_or_create(holder, status).map(|()| None)
            } else {
                self.apply_step(holder, status).map(Some)
            };
            let (work, backup) = match started {
                Ok(Some(started)) => started,
                Ok(None) => continue,
                Err(error) => {
                    holder.release_status_bump(status, parent);
                    result = Err(error);
                    break;
                }
            };

            if parallel {
                in_flight.push((Arc::clone(holder), backup));
                let holder = Arc::clone(holder);
                pending.spawn(async move { (holder, work.await) });
            } else {
                match work.await {
                    Ok(chunk) => holder.put_chunk(chunk),
                    Err(error) => {
                        holder.put_chunk(backup);
                        holder.release_status_bump(status, parent);
                        result = Err(error);
                        break;
                    }
                }
            }
        }

        // all tasks have to finish before returning, even after the first error
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((holder, Ok(chunk))) => holder.put_chunk(chunk),
                Ok((_holder, Err(error))) => result = result.and(Err(error)),
                Err(error) => result = result.and(Err(error.into())),
            }
        }
        for (holder, backup) in in_flight {
            if !holder.has_chunk() {
                holder.put_chunk(backup);
                holder.release_status_bump(status, parent);
            }
        }
        result
    }

    fn load_or_create(&self, holder: &ChunkHolder, root: ChunkStatus) -> Result<()> {
        let pos = holder.pos();
        let chunk = if let Some(stored) = self.map.storage.load_chunk(pos)? {
            debug!(
                "loaded chunk {pos} at {status}",
                status = self.map.catalog.name(stored.status())
            );
            stored
        } else {
            ProtoChunk::new(pos, root)
        };
        holder.put_chunk(WorldChunk::Proto(chunk));
        Ok(())
    }

    /// Starts the step towards `status`. Chunks which already reached it (e.g. because they
    /// were stored) take the loading step instead of the generation step.
    ///
    /// Returns the running step together with a copy of the chunk as it was before. The chunk
    /// stays in its holder if the step can't be started.
    fn apply_step(
        &self,
        holder: &ChunkHolder,
        status: ChunkStatus,
    ) -> Result<(TaskFuture<WorldChunk>, WorldChunk)> {
        let pos = holder.pos();
        let missing = || {
            anyhow!(
                "chunk {pos} is missing when going to {status}",
                status = self.map.catalog.name(status)
            )
        };
        let persisted = holder.persisted_status().ok_or_else(missing)?;

        let generate = status.is_after(persisted);
        if generate && !self.needs_generation {
            bail!(
                "chunk {pos} at {persisted} unexpectedly needs generation to reach {status}",
                persisted = self.map.catalog.name(persisted),
                status = self.map.catalog.name(status)
            );
        }
        let pyramid = if generate {
            &self.map.generation
        } else {
            &self.map.loading
        };
        let step = pyramid
            .step_to(status)
            .ok_or_else(|| anyhow!("status {status:?} isn't covered by the pyramid"))?;

        let chunk = holder.take_chunk().ok_or_else(missing)?;
        let backup = chunk.clone();
        Ok((step.apply(&self.map.context, &self.cache, chunk), backup))
    }

    /// Returns `true` if the stored chunks around the center already satisfy everything the
    /// loading pyramid requires for the target status.
    fn can_load_without_generation(&self) -> bool {
        if self.map.catalog.is_root(self.target) {
            return true;
        }
        let center_status = self
            .cache
            .get(self.center)
            .and_then(|holder| holder.persisted_status());
        if !center_status.is_some_and(|status| status.is_or_after(self.target)) {
            return false;
        }
        let Some(step) = self.map.loading.step_to(self.target) else {
            return false;
        };

        let dependencies = step.accumulated_dependencies();
        self.cache.iter().all(|(pos, holder)| {
            let distance = self.center.chessboard_distance(pos);
            match usize::try_from(distance)
                .ok()
                .and_then(|distance| dependencies.get(distance))
            {
                None => true,
                Some(required) => holder
                    .persisted_status()
                    .is_some_and(|status| status.is_or_after(required)),
            }
        })
    }
}
