//! Per-file progress events.

use std::fmt;
use std::path::PathBuf;

use crate::spec::{EnumGatherFailureKind, SpecScanEntry};

/// Outcome of processing one matching file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumGatherOutcome {
    /// Copied under its own base name.
    Copied {
        /// Written destination file.
        path_dst: PathBuf,
    },
    /// Base name was taken by different content; copied under a disambiguated name.
    Renamed {
        /// Written destination file.
        path_dst: PathBuf,
    },
    /// A byte-identical copy already exists in the destination.
    SkippedDuplicate {
        /// Existing destination file holding the same bytes.
        path_dst: PathBuf,
    },
    /// The file resolves into the destination tree.
    SkippedInsideDestination,
    /// Symlinked file under `EnumGatherSymlinkStrategy::Skip`.
    SkippedSymlink,
    /// Dry run: the file would be written here.
    Planned {
        /// Destination the copy would receive.
        path_dst: PathBuf,
    },
    /// Copy failed; the run continued.
    Failed {
        /// Failure class.
        kind: EnumGatherFailureKind,
        /// Error text.
        message: String,
    },
}

/// Progress event emitted once per matching file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGather {
    /// Matching file the event is about.
    pub entry: SpecScanEntry,
    /// What happened to it.
    pub outcome: EnumGatherOutcome,
}

fn _display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for EventGather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_rel = self.entry.path_rel.display();
        match &self.outcome {
            EnumGatherOutcome::Copied { .. } => write!(f, "copied: {c_rel}"),
            EnumGatherOutcome::Renamed { path_dst } => {
                write!(f, "renamed: {c_rel} -> {}", _display_name(path_dst))
            }
            EnumGatherOutcome::SkippedDuplicate { path_dst } => write!(
                f,
                "skipped (identical to {}): {c_rel}",
                _display_name(path_dst)
            ),
            EnumGatherOutcome::SkippedInsideDestination => {
                write!(f, "skipped (inside destination): {c_rel}")
            }
            EnumGatherOutcome::SkippedSymlink => write!(f, "skipped (symlink): {c_rel}"),
            EnumGatherOutcome::Planned { path_dst } => {
                write!(f, "would copy: {c_rel} -> {}", _display_name(path_dst))
            }
            EnumGatherOutcome::Failed { kind, message } => {
                write!(f, "failed ({kind}): {c_rel}: {message}")
            }
        }
    }
}
