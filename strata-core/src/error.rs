//! Errors raised while assembling or querying a pipeline.
//!
//! All of these describe a malformed, hand-authored pipeline definition or a query the
//! definition was never built to answer. They are not meant to be recovered from; the usual
//! reaction is to abort startup.

use flexstr::SharedStr;

use crate::ChunkStatus;

/// Errors raised by [`StatusCatalog::register`](crate::StatusCatalog::register).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A status with this name has already been registered.
    #[error("chunk status '{0}' is already registered")]
    DuplicateName(SharedStr),
    /// Only the very first status may be registered without a parent.
    #[error("chunk status '{name}' has no parent but the catalog already has a root")]
    SecondRoot {
        /// name of the rejected status
        name: SharedStr,
    },
    /// The parent doesn't belong to this catalog.
    #[error("parent {parent:?} of chunk status '{name}' is unknown")]
    UnknownParent {
        /// name of the rejected status
        name: SharedStr,
        /// the unknown parent
        parent: ChunkStatus,
    },
    /// Statuses form a single chain, so the parent must be the most recently registered status.
    #[error("parent {parent:?} of chunk status '{name}' is not the last registered status")]
    ParentNotLast {
        /// name of the rejected status
        name: SharedStr,
        /// the parent which already has a successor
        parent: ChunkStatus,
    },
    /// There is no index left for another status.
    #[error("cannot register more than {} chunk statuses", usize::from(u8::MAX) + 1)]
    CatalogFull,
}

/// Errors raised while building steps and pyramids or while querying dependency tables.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A pipeline has to start with the root status of the catalog.
    #[error("not starting with the first status: {status:?}")]
    NotFirstStatus {
        /// the status which has a parent
        status: ChunkStatus,
    },
    /// A step must directly follow the step of its parent status.
    #[error("out of order status {status:?} following {parent:?}")]
    OutOfOrderStatus {
        /// the status of the new step
        status: ChunkStatus,
        /// the target status of the previous step
        parent: ChunkStatus,
    },
    /// A step may only require statuses which come before its own target.
    #[error("status {required:?} can not be required by {target:?}")]
    RequirementNotBefore {
        /// the requested requirement
        required: ChunkStatus,
        /// the target status of the step
        target: ChunkStatus,
    },
    /// The dependency table has no radius for the requested status.
    #[error("requesting {status:?} outside of dependency range (covering {covered} statuses)")]
    StatusNotCovered {
        /// the requested status
        status: ChunkStatus,
        /// number of status indices covered by the table
        covered: usize,
    },
    /// An entry at a larger radius requires more than the chunk at radius 0.
    #[error(
        "requirement {status:?} at radius {radius} exceeds the {covered} statuses covered by radius 0"
    )]
    UncoveredRequirement {
        /// radius of the offending entry
        radius: usize,
        /// the offending entry
        status: ChunkStatus,
        /// number of status indices covered by the radius-0 entry
        covered: usize,
    },
    /// A pyramid needs one step for every status of its catalog.
    #[error("pyramid defines {steps} steps but the catalog has {statuses} statuses")]
    IncompletePyramid {
        /// number of defined steps
        steps: usize,
        /// number of statuses in the catalog
        statuses: usize,
    },
    /// The square of a cache with this radius doesn't fit into memory.
    #[error("a cache with radius {radius} is too large")]
    CacheTooLarge {
        /// the requested radius
        radius: u32,
    },
}
