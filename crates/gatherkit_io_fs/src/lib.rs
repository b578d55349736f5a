//! `gatherkit_io_fs` v1:
//! Rust-side engine that gathers files matching one suffix from a directory
//! tree into a single flat destination.
//!
//! Modules:
//! - `gather` : traversal and copy orchestration
//! - `event`  : per-file progress events
//! - `spec`   : enums/options/errors
//! - `report` : run-time report model
//! - `util`   : shared helper functions

pub mod event;
pub mod gather;
pub mod report;
pub mod spec;
mod util;

pub use event::{EnumGatherOutcome, EventGather};
pub use gather::{gather_tree, gather_tree_with};
pub use report::{ReportGather, ReportGatherBuilder};
pub use spec::{
    C_SUFFIX_DEFAULT, EnumGatherFailureKind, EnumGatherSymlinkStrategy, GatherTreeError,
    N_DISAMBIGUATION_MAX_DEFAULT, SpecGatherError, SpecGatherOptions, SpecScanEntry,
};
