//! Meta-package re-exporting all libraries of strata.

pub use strata_core;
pub use strata_server;
