//! Generates a square of chunks with the strata pipeline, stores it and loads it back.

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::{Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, error, info};
use strata_core::{ChunkLevel, ChunkPos, FULL_CHUNK_LEVEL, vanilla};
use strata_server::{
    settings::WorldSettings,
    world::{
        chunk_map::ChunkMap,
        context::WorldGenContext,
        storage::{WorldStorage, memory::MemoryStorage},
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (`key = value` per line)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of chunk rings around the origin to bring to the target status
    #[arg(short, long)]
    radius: Option<u32>,

    /// Name of the status to reach (e.g. `full`, `carvers`)
    #[arg(short, long)]
    target: Option<String>,

    /// Name of the dimension
    #[arg(short, long)]
    dimension: Option<String>,

    /// Don't generate any structures
    #[arg(long)]
    no_structures: bool,

    /// Verbosity level (up to -vvv)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Reads the settings file (if any) and lets the command line override it.
    fn settings(&self) -> Result<WorldSettings> {
        let mut settings = match &self.config {
            Some(path) => WorldSettings::load(path)?,
            None => WorldSettings::default(),
        };
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(radius) = self.radius {
            settings.radius = radius;
        }
        if let Some(target) = &self.target {
            settings.target_status = target.clone().into();
        }
        if let Some(dimension) = &self.dimension {
            settings.dimension = dimension.clone().into();
        }
        if self.no_structures {
            settings.generate_structures = false;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // tokio::main makes rust-analyzer fragile,
    // so put the code in a separate place.
    real_main().await
}

async fn real_main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder().filter_level(level).init();

    let settings = args.settings()?;
    debug!("{settings:?}");

    let catalog = Arc::new(vanilla::catalog()?);
    let target = settings.target_status(&catalog)?;
    let Ok(radius) = i32::try_from(settings.radius) else {
        bail!("radius {} is too large", settings.radius);
    };

    let context = Arc::new(WorldGenContext::new(
        settings.seed,
        &settings.dimension,
        settings.generate_structures,
    ));
    let mut map = ChunkMap::new(
        Arc::clone(&catalog),
        Arc::clone(&context),
        Box::new(MemoryStorage::new()),
    )?;

    let start = Instant::now();
    for z in -radius..=radius {
        for x in -radius..=radius {
            let pos = ChunkPos::new(x, z);
            if let Err(error) = map.schedule_generation(pos, target).await {
                error!("generating chunk {pos} failed: {error:#}");
                return Err(error);
            }
        }
    }
    info!(
        "generated {count} chunks around {origin} up to {target} in {elapsed:?}",
        count = map.loaded_count(),
        origin = ChunkPos::ZERO,
        target = catalog.name(target),
        elapsed = start.elapsed(),
    );
    info!(
        "{count} chunks contain structure starts",
        count = context.structure_chunk_count()
    );

    let levels = ChunkLevel::new(map.generation_pyramid(), vanilla::FULL)?;
    for distance in 0..=levels.radius_around_full_chunk() {
        let level = FULL_CHUNK_LEVEL + distance;
        if let Some(status) = levels.generation_status(level) {
            debug!(
                "ring {distance} around a full chunk (level {level}) reaches {status}",
                status = catalog.name(status)
            );
        }
    }

    let saved = map.save_all()?;
    let storage: Box<dyn WorldStorage> = map.into_storage();

    // a fresh map only needs to load what has been generated before
    let start = Instant::now();
    let context = Arc::new(WorldGenContext::new(
        settings.seed,
        &settings.dimension,
        settings.generate_structures,
    ));
    let mut reloaded = ChunkMap::new(Arc::clone(&catalog), context, storage)?;
    reloaded.schedule_generation(ChunkPos::ZERO, target).await?;
    info!(
        "saved {saved} chunks and loaded {loaded} of them back in {elapsed:?}",
        loaded = reloaded.loaded_count(),
        elapsed = start.elapsed(),
    );

    if let Some(chunk) = reloaded.chunk(ChunkPos::ZERO) {
        let content = chunk.content();
        info!(
            "chunk {origin}: biome {biome:?}, surface {surface:?}, {decorations} decorations, light level {light}, {mobs} mobs",
            origin = ChunkPos::ZERO,
            biome = content.biome,
            surface = content.surface,
            decorations = content.decorations,
            light = content.light_level,
            mobs = content.spawned_mobs,
        );
    }

    Ok(())
}
