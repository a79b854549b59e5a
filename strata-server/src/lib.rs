//! Reference world and chunk map built on the strata generation pipeline

pub mod settings;
pub mod world;
