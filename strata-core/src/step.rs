//! Contains the pipeline stage advancing a chunk to a single status.

use std::{
    fmt::{self, Debug},
    future,
    sync::Arc,
};

use flexstr::SharedStr;

use crate::{
    ChunkAccess, ChunkDependencies, ChunkStatus, Generation, GenerationContext, PipelineError,
    StageTimer, StaticCache2D, StatusCatalog, TaskFuture,
};

/// The signature of the work a step performs.
///
/// A task receives the shared context, the step it belongs to, the neighbourhood of the chunk and
/// the chunk itself. It returns a future resolving to the chunk, which may have been replaced by
/// a different representation.
pub type StatusTask<G> = dyn Fn(
        &Arc<<G as Generation>::Context>,
        &ChunkStep<G>,
        &Arc<StaticCache2D<<G as Generation>::Holder>>,
        <G as Generation>::Chunk,
    ) -> TaskFuture<<G as Generation>::Chunk>
    + Send
    + Sync;

/// Advances a chunk to `target_status`.
///
/// A step knows which statuses the surrounding chunks need to have reached before its task may
/// run. `direct_dependencies` only lists what this step itself needs, while
/// `accumulated_dependencies` also includes everything the steps before it needed, expressed
/// relative to this step's chunk.
pub struct ChunkStep<G: Generation> {
    target_status: ChunkStatus,
    target_name: SharedStr,
    direct_dependencies: ChunkDependencies,
    accumulated_dependencies: ChunkDependencies,
    block_state_write_radius: Option<u32>,
    /// `None` passes the chunk through unchanged
    task: Option<Arc<StatusTask<G>>>,
}

impl<G: Generation> ChunkStep<G> {
    /// The status a chunk has reached after this step.
    #[must_use]
    pub fn target_status(&self) -> ChunkStatus {
        self.target_status
    }

    /// The name of the target status.
    #[must_use]
    pub fn target_name(&self) -> &SharedStr {
        &self.target_name
    }

    /// What this step requires from the surrounding chunks.
    #[must_use]
    pub fn direct_dependencies(&self) -> &ChunkDependencies {
        &self.direct_dependencies
    }

    /// What this step and all steps before it require from the surrounding chunks.
    #[must_use]
    pub fn accumulated_dependencies(&self) -> &ChunkDependencies {
        &self.accumulated_dependencies
    }

    /// How far around the chunk the task may modify block states. `None` if the step didn't
    /// declare a radius.
    #[must_use]
    pub fn block_state_write_radius(&self) -> Option<u32> {
        self.block_state_write_radius
    }

    /// Returns `false` if this step passes chunks through without doing anything.
    #[must_use]
    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }

    /// Returns the radius up to which chunks need to have reached `status` before this step may
    /// run. The target status itself is only needed by the chunk in the center.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` lies beyond what the accumulated dependencies cover.
    pub fn accumulated_radius_of(&self, status: ChunkStatus) -> Result<usize, PipelineError> {
        if status == self.target_status {
            Ok(0)
        } else {
            self.accumulated_dependencies.radius_of(status)
        }
    }

    /// Runs this step on a chunk.
    ///
    /// A chunk which already reached the target status (e.g. because it was loaded from storage)
    /// is handed to the task as is. Otherwise the stage is timed and once the task completed, a
    /// proto chunk is marked as having reached the target status. Errors of the task are passed
    /// through untouched.
    pub fn apply(
        &self,
        context: &Arc<G::Context>,
        cache: &Arc<StaticCache2D<G::Holder>>,
        chunk: G::Chunk,
    ) -> TaskFuture<G::Chunk> {
        if chunk.persisted_status().is_or_after(self.target_status) {
            return self.do_work(context, cache, chunk);
        }

        let timer = StageTimer::start(chunk.pos(), context.dimension(), self.target_name.clone());
        let target_status = self.target_status;
        let work = self.do_work(context, cache, chunk);
        Box::pin(async move {
            let mut chunk = work.await?;
            // the chunk may have been replaced by a representation which can't be stamped
            if chunk.is_proto() && chunk.persisted_status().is_before(target_status) {
                chunk.set_persisted_status(target_status);
            }
            timer.finish();
            Ok(chunk)
        })
    }

    fn do_work(
        &self,
        context: &Arc<G::Context>,
        cache: &Arc<StaticCache2D<G::Holder>>,
        chunk: G::Chunk,
    ) -> TaskFuture<G::Chunk> {
        match &self.task {
            Some(task) => task(context, self, cache, chunk),
            None => Box::pin(future::ready(Ok(chunk))),
        }
    }
}

impl<G: Generation> Clone for ChunkStep<G> {
    fn clone(&self) -> Self {
        Self {
            target_status: self.target_status,
            target_name: self.target_name.clone(),
            direct_dependencies: self.direct_dependencies.clone(),
            accumulated_dependencies: self.accumulated_dependencies.clone(),
            block_state_write_radius: self.block_state_write_radius,
            task: self.task.clone(),
        }
    }
}

impl<G: Generation> Debug for ChunkStep<G> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChunkStep")
            .field("target_status", &self.target_name)
            .field("direct_dependencies", &self.direct_dependencies.to_string())
            .field(
                "accumulated_dependencies",
                &self.accumulated_dependencies.to_string(),
            )
            .field("block_state_write_radius", &self.block_state_write_radius)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

/// What a builder needs to remember about the step before it.
struct ParentStep {
    target_status: ChunkStatus,
    accumulated_dependencies: ChunkDependencies,
}

/// Assembles a [`ChunkStep`].
///
/// Requirements only ever get stronger: requiring a status at some radius also requires it at
/// every smaller radius, and overlapping requirements keep the later status.
pub struct ChunkStepBuilder<G: Generation> {
    status: ChunkStatus,
    status_name: SharedStr,
    parent: Option<ParentStep>,
    /// index is the radius
    direct_dependencies_by_radius: Vec<ChunkStatus>,
    block_state_write_radius: Option<u32>,
    task: Option<Arc<StatusTask<G>>>,
}

impl<G: Generation> ChunkStepBuilder<G> {
    /// Starts the step for the very first status of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` isn't the root of the catalog.
    pub fn first(catalog: &StatusCatalog, status: ChunkStatus) -> Result<Self, PipelineError> {
        if !catalog.is_root(status) {
            return Err(PipelineError::NotFirstStatus { status });
        }

        Ok(Self {
            status,
            status_name: Self::status_name(catalog, status),
            parent: None,
            direct_dependencies_by_radius: Vec::new(),
            block_state_write_radius: None,
            task: None,
        })
    }

    /// Starts the step following `parent`.
    ///
    /// The new step always requires its own chunk to have completed the parent step.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` doesn't directly follow the target status of `parent`.
    pub fn successor(
        catalog: &StatusCatalog,
        status: ChunkStatus,
        parent: &ChunkStep<G>,
    ) -> Result<Self, PipelineError> {
        if parent.target_status.index() + 1 != status.index() {
            return Err(PipelineError::OutOfOrderStatus {
                status,
                parent: parent.target_status,
            });
        }

        Ok(Self {
            status,
            status_name: Self::status_name(catalog, status),
            parent: Some(ParentStep {
                target_status: parent.target_status,
                accumulated_dependencies: parent.accumulated_dependencies.clone(),
            }),
            direct_dependencies_by_radius: vec![parent.target_status],
            block_state_write_radius: None,
            task: None,
        })
    }

    fn status_name(catalog: &StatusCatalog, status: ChunkStatus) -> SharedStr {
        catalog
            .get(status)
            .map_or(SharedStr::EMPTY, |info| info.name().clone())
    }

    /// Requires all chunks within `radius` to have reached at least `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if `status` isn't strictly before the status this step produces.
    pub fn add_requirement(
        mut self,
        status: ChunkStatus,
        radius: usize,
    ) -> Result<Self, PipelineError> {
        if status.is_or_after(self.status) {
            return Err(PipelineError::RequirementNotBefore {
                required: status,
                target: self.status,
            });
        }

        let required_len = radius + 1;
        for existing in self
            .direct_dependencies_by_radius
            .iter_mut()
            .take(required_len)
        {
            *existing = (*existing).max(status);
        }
        if required_len > self.direct_dependencies_by_radius.len() {
            self.direct_dependencies_by_radius
                .resize(required_len, status);
        }

        Ok(self)
    }

    /// Declares how far around the chunk the task may modify block states.
    #[must_use]
    pub fn block_state_write_radius(mut self, radius: u32) -> Self {
        self.block_state_write_radius = Some(radius);
        self
    }

    /// Sets the work to be done by the step. Without a task, chunks are passed through.
    #[must_use]
    pub fn set_task<F>(mut self, task: F) -> Self
    where
        F: Fn(
                &Arc<G::Context>,
                &ChunkStep<G>,
                &Arc<StaticCache2D<G::Holder>>,
                G::Chunk,
            ) -> TaskFuture<G::Chunk>
            + Send
            + Sync
            + 'static,
    {
        self.task = Some(Arc::new(task));
        self
    }

    /// Creates the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the requirements can't be turned into dependency tables.
    pub fn build(self) -> Result<ChunkStep<G>, PipelineError> {
        let accumulated_dependencies = self.build_accumulated_dependencies()?;
        let direct_dependencies =
            ChunkDependencies::new(self.direct_dependencies_by_radius.as_slice())?;

        Ok(ChunkStep {
            target_status: self.status,
            target_name: self.status_name,
            direct_dependencies,
            accumulated_dependencies,
            block_state_write_radius: self.block_state_write_radius,
            task: self.task,
        })
    }

    /// Merges the accumulated dependencies of the parent into the direct ones of this step.
    ///
    /// The parent's table is relative to a chunk which has to be done with the parent status. This
    /// step already requires that status up to `radius_of_parent`, so the parent's table gets
    /// shifted outwards by that radius before both are merged.
    fn build_accumulated_dependencies(&self) -> Result<ChunkDependencies, PipelineError> {
        let direct = self.direct_dependencies_by_radius.as_slice();
        let Some(parent) = &self.parent else {
            return ChunkDependencies::new(direct);
        };

        let radius_of_parent = self.radius_of_parent(parent.target_status);
        let inherited = parent.accumulated_dependencies.as_slice();
        let len = (radius_of_parent + inherited.len()).max(direct.len());

        let accumulated: Vec<ChunkStatus> = (0..len)
            .filter_map(|radius| {
                let own = direct.get(radius).copied();
                let shifted = radius
                    .checked_sub(radius_of_parent)
                    .and_then(|shifted_radius| inherited.get(shifted_radius))
                    .copied();
                // one of both always exists within `len`
                own.into_iter().chain(shifted).max()
            })
            .collect();

        ChunkDependencies::new(accumulated)
    }

    /// The largest radius at which this step already requires `parent_status`.
    fn radius_of_parent(&self, parent_status: ChunkStatus) -> usize {
        self.direct_dependencies_by_radius
            .iter()
            .rposition(|status| status.is_or_after(parent_status))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {

    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{ChunkPos, ChunkType};

    struct TestGeneration;

    impl Generation for TestGeneration {
        type Context = TestContext;
        type Holder = ();
        type Chunk = TestChunk;
    }

    struct TestContext;

    impl GenerationContext for TestContext {
        fn dimension(&self) -> &str {
            "test"
        }
    }

    #[derive(Debug)]
    struct TestChunk {
        status: ChunkStatus,
        proto: bool,
        stamps: usize,
    }

    impl ChunkAccess for TestChunk {
        fn pos(&self) -> ChunkPos {
            ChunkPos::ZERO
        }

        fn persisted_status(&self) -> ChunkStatus {
            self.status
        }

        fn is_proto(&self) -> bool {
            self.proto
        }

        fn set_persisted_status(&mut self, status: ChunkStatus) {
            self.status = status;
            self.stamps += 1;
        }
    }

    type Builder = ChunkStepBuilder<TestGeneration>;

    fn catalog(count: usize) -> (StatusCatalog, Vec<ChunkStatus>) {
        let mut catalog = StatusCatalog::new();
        let mut statuses: Vec<ChunkStatus> = Vec::new();
        for index in 0..count {
            let status = catalog
                .register(
                    &format!("s{index}"),
                    statuses.last().copied(),
                    &[],
                    ChunkType::Proto,
                )
                .unwrap();
            statuses.push(status);
        }
        (catalog, statuses)
    }

    fn chunk(status: ChunkStatus) -> TestChunk {
        TestChunk {
            status,
            proto: true,
            stamps: 0,
        }
    }

    fn cache() -> Arc<StaticCache2D<()>> {
        Arc::new(StaticCache2D::create(ChunkPos::ZERO, 0, |_pos| ()).unwrap())
    }

    #[test]
    fn first_step_requires_the_root_status() {
        let (catalog, s) = catalog(3);
        assert!(Builder::first(&catalog, s[0]).is_ok());
        assert_eq!(
            Builder::first(&catalog, s[1]).err(),
            Some(PipelineError::NotFirstStatus { status: s[1] })
        );
    }

    #[test]
    fn successor_must_follow_its_parent_immediately() {
        let (catalog, s) = catalog(4);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        assert!(Builder::successor(&catalog, s[1], &first).is_ok());
        assert_eq!(
            Builder::successor(&catalog, s[2], &first).err(),
            Some(PipelineError::OutOfOrderStatus {
                status: s[2],
                parent: s[0]
            })
        );
        assert!(Builder::successor(&catalog, s[0], &first).is_err());
    }

    #[test]
    fn requirements_must_come_before_the_target() {
        let (catalog, s) = catalog(4);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let second = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .build()
            .unwrap();

        let error = Builder::successor(&catalog, s[2], &second)
            .unwrap()
            .add_requirement(s[2], 1)
            .err();
        assert_eq!(
            error,
            Some(PipelineError::RequirementNotBefore {
                required: s[2],
                target: s[2]
            })
        );
        assert!(
            Builder::successor(&catalog, s[2], &second)
                .unwrap()
                .add_requirement(s[3], 0)
                .is_err()
        );
        assert!(
            Builder::first(&catalog, s[0])
                .unwrap()
                .add_requirement(s[0], 0)
                .is_err()
        );
    }

    #[test]
    fn requirements_only_get_stronger() {
        let (catalog, s) = catalog(5);
        let mut parent = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        for &status in &s[1..4] {
            parent = Builder::successor(&catalog, status, &parent)
                .unwrap()
                .build()
                .unwrap();
        }

        // weaker requirement after a stronger one
        let step = Builder::successor(&catalog, s[4], &parent)
            .unwrap()
            .add_requirement(s[2], 2)
            .unwrap()
            .add_requirement(s[1], 2)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step.direct_dependencies().as_slice(), &[s[3], s[2], s[2]]);

        // stronger requirement after a weaker one
        let step = Builder::successor(&catalog, s[4], &parent)
            .unwrap()
            .add_requirement(s[1], 2)
            .unwrap()
            .add_requirement(s[2], 1)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step.direct_dependencies().as_slice(), &[s[3], s[2], s[1]]);

        // a larger radius fills the new slots with the requirement
        let step = Builder::successor(&catalog, s[4], &parent)
            .unwrap()
            .add_requirement(s[0], 3)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            step.direct_dependencies().as_slice(),
            &[s[3], s[0], s[0], s[0]]
        );
    }

    #[test]
    fn accumulated_dependencies_propagate_through_the_chain() {
        let (catalog, s) = catalog(4);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        assert!(first.accumulated_dependencies().is_empty());

        let step_a = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step_a.accumulated_dependencies().as_slice(), &[s[0]]);

        let step_b = Builder::successor(&catalog, s[2], &step_a)
            .unwrap()
            .add_requirement(s[1], 1)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step_b.accumulated_dependencies().as_slice(), &[s[1], s[1]]);

        let step_c = Builder::successor(&catalog, s[3], &step_b)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step_c.direct_dependencies().as_slice(), &[s[2]]);
        assert_eq!(step_c.accumulated_dependencies().as_slice(), &[s[2], s[1]]);
        assert!(
            step_c
                .accumulated_dependencies()
                .get(1)
                .unwrap()
                .is_or_after(s[1])
        );

        assert_eq!(step_c.accumulated_radius_of(s[3]), Ok(0));
        assert_eq!(step_c.accumulated_radius_of(s[2]), Ok(0));
        assert_eq!(step_c.accumulated_radius_of(s[1]), Ok(1));
        assert_eq!(step_c.accumulated_radius_of(s[0]), Ok(1));
    }

    #[test]
    fn parent_requirements_are_shifted_by_the_parent_radius() {
        let (catalog, s) = catalog(4);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step_a = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .build()
            .unwrap();
        let step_b = Builder::successor(&catalog, s[2], &step_a)
            .unwrap()
            .add_requirement(s[0], 2)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(step_b.accumulated_dependencies().as_slice(), &[s[1], s[0], s[0]]);

        // requiring the parent status at radius 1 pushes the parent's table one ring outwards
        let step_c = Builder::successor(&catalog, s[3], &step_b)
            .unwrap()
            .add_requirement(s[2], 1)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            step_c.accumulated_dependencies().as_slice(),
            &[s[2], s[2], s[0], s[0]]
        );
    }

    #[test]
    fn apply_stamps_after_the_task_completed() {
        let (catalog, s) = catalog(3);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = Arc::clone(&observed);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .set_task(move |_context, _step, _cache, chunk| {
                let observed = Arc::clone(&observed_clone);
                Box::pin(async move {
                    observed.lock().unwrap().push(chunk.persisted_status());
                    Ok(chunk)
                })
            })
            .build()
            .unwrap();

        let result = pollster::block_on(step.apply(&Arc::new(TestContext), &cache(), chunk(s[0])))
            .unwrap();

        assert_eq!(*observed.lock().unwrap(), vec![s[0]]);
        assert_eq!(result.status, s[1]);
        assert_eq!(result.stamps, 1);
    }

    #[test]
    fn apply_is_idempotent_for_chunks_past_the_target() {
        let (catalog, s) = catalog(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .set_task(move |_context, _step, _cache, chunk| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Box::pin(future::ready(Ok(chunk)))
            })
            .build()
            .unwrap();

        let context = Arc::new(TestContext);
        for status in [s[1], s[2]] {
            let result = pollster::block_on(step.apply(&context, &cache(), chunk(status))).unwrap();
            assert_eq!(result.status, status);
            assert_eq!(result.stamps, 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn apply_without_task_passes_through_and_stamps() {
        let (catalog, s) = catalog(2);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .build()
            .unwrap();
        assert!(!step.has_task());

        let result =
            pollster::block_on(step.apply(&Arc::new(TestContext), &cache(), chunk(s[0]))).unwrap();
        assert_eq!(result.status, s[1]);
    }

    #[test]
    fn replaced_chunks_which_are_not_proto_are_not_stamped() {
        let (catalog, s) = catalog(3);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .set_task(|_context, _step, _cache, chunk| {
                Box::pin(future::ready(Ok(TestChunk {
                    proto: false,
                    ..chunk
                })))
            })
            .build()
            .unwrap();

        let result =
            pollster::block_on(step.apply(&Arc::new(TestContext), &cache(), chunk(s[0]))).unwrap();
        assert!(!result.proto);
        assert_eq!(result.status, s[0]);
        assert_eq!(result.stamps, 0);
    }

    #[test]
    fn task_errors_are_passed_through() {
        let (catalog, s) = catalog(2);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .set_task(|_context, _step, _cache, _chunk| {
                Box::pin(future::ready(Err::<TestChunk, _>(anyhow::anyhow!(
                    "generator exploded"
                ))))
            })
            .build()
            .unwrap();

        let error = pollster::block_on(step.apply(&Arc::new(TestContext), &cache(), chunk(s[0])))
            .unwrap_err();
        assert_eq!(error.to_string(), "generator exploded");
    }

    #[test]
    fn task_receives_its_step() {
        let (catalog, s) = catalog(2);
        let first = Builder::first(&catalog, s[0]).unwrap().build().unwrap();
        let step = Builder::successor(&catalog, s[1], &first)
            .unwrap()
            .block_state_write_radius(1)
            .set_task(|_context, step, _cache, mut chunk| {
                chunk.stamps = 100 + step.target_status().index();
                Box::pin(future::ready(Ok(chunk)))
            })
            .build()
            .unwrap();
        assert_eq!(step.block_state_write_radius(), Some(1));
        assert_eq!(&**step.target_name(), "s1");

        let result =
            pollster::block_on(step.apply(&Arc::new(TestContext), &cache(), chunk(s[0]))).unwrap();
        assert_eq!(result.stamps, 102);
    }
}
