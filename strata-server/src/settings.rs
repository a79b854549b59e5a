//! Contains the settings of a world, read from a line-oriented settings file.
//!
//! ```text
//! # comments start with a hash
//! seed = 42
//! dimension = overworld
//! generate_structures = true
//! radius = 2
//! target_status = full
//! ```

use std::{
    fs,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context as _, Result, anyhow, bail};
use flexstr::SharedStr;
use log::{debug, warn};
use strata_core::{ChunkStatus, StatusCatalog};

/// Everything needed to generate a piece of a world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSettings {
    /// The seed all generated content is derived from
    pub seed: u64,
    /// Name of the dimension being generated
    pub dimension: SharedStr,
    /// `false` disables structures
    pub generate_structures: bool,
    /// Number of chunk rings around the origin which need to be complete
    pub radius: u32,
    /// Name of the status the requested chunks need to reach
    pub target_status: SharedStr,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            dimension: SharedStr::from_static("overworld"),
            generate_structures: true,
            radius: 0,
            target_status: SharedStr::from_static("full"),
        }
    }
}

impl WorldSettings {
    /// Reads the settings from a file. Settings missing in the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read or contains invalid lines or values.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("loading settings from {}", path.display());
        let reader = fs::File::open(path)
            .with_context(|| format!("couldn't open settings file {}", path.display()))?;
        Self::parse(BufReader::new(reader))
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Reads the settings line by line.
    ///
    /// # Errors
    ///
    /// Fails on malformed lines and invalid values, naming the offending line.
    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut settings = Self::default();
        for (line, line_number) in reader.lines().zip(1_usize..) {
            let line = line?;
            settings
                .parse_line(&line)
                .with_context(|| format!("line {line_number}"))?;
        }
        Ok(settings)
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            bail!("expected `key = value` but found: {line}");
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "seed" => {
                self.seed = value
                    .parse()
                    .with_context(|| format!("invalid seed '{value}'"))?;
            }
            "dimension" => {
                if value.is_empty() {
                    bail!("the dimension needs a name");
                }
                self.dimension = value.to_owned().into();
            }
            "generate_structures" => self.generate_structures = parse_bool(value)?,
            "radius" => {
                self.radius = value
                    .parse()
                    .with_context(|| format!("invalid radius '{value}'"))?;
            }
            "target_status" => self.target_status = value.to_owned().into(),
            _ => warn!("ignoring unknown setting '{key}'"),
        }
        Ok(())
    }

    /// Looks up the target status in the given catalog.
    ///
    /// # Errors
    ///
    /// Fails if the catalog doesn't know a status of that name.
    pub fn target_status(&self, catalog: &StatusCatalog) -> Result<ChunkStatus> {
        catalog
            .by_name(&self.target_status)
            .ok_or_else(|| anyhow!("unknown status '{}'", self.target_status))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("expected a boolean but found '{value}'"),
    }
}
