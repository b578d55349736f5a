//! Gather specification models and top-level error types.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Default match criterion: Datavyu project files.
pub const C_SUFFIX_DEFAULT: &str = ".opf";

/// Default upper bound for `name (n).ext` candidates tried per file.
pub const N_DISAMBIGUATION_MAX_DEFAULT: u32 = 10_000;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy for the source walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumGatherSymlinkStrategy {
    /// Resolve links: copy target bytes, descend into linked directories (cycle-safe).
    Follow,
    /// Matching symlinked files are reported as skipped; linked directories are not entered.
    Skip,
}

/// Reason class of one per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumGatherFailureKind {
    /// The source or destination refused access.
    PermissionDenied,
    /// The destination filesystem ran out of space.
    DestinationFull,
    /// The source file could not be opened or read.
    SourceUnreadable,
    /// No free `name (n).ext` candidate was found.
    NameExhausted,
    /// Any other I/O failure.
    Io,
}

impl EnumGatherFailureKind {
    /// Classify an I/O error raised while writing into the destination.
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::StorageFull => Self::DestinationFull,
            _ => Self::Io,
        }
    }

    /// Short label used in progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::DestinationFull => "destination full",
            Self::SourceUnreadable => "source unreadable",
            Self::NameExhausted => "no free name",
            Self::Io => "i/o error",
        }
    }
}

impl fmt::Display for EnumGatherFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `gather_tree`.
#[derive(Debug, Clone)]
pub struct SpecGatherOptions {
    /// Case-sensitive file-name suffix selecting the files to gather.
    pub suffix: String,
    /// Symlink handling behavior.
    pub rule_symlink: EnumGatherSymlinkStrategy,
    /// Carry permissions, timestamps and xattrs over to each copy.
    pub if_preserve_metadata: bool,
    /// Do not mutate filesystem; report the name each match would get.
    pub if_dry_run: bool,
    /// Maximum number of disambiguated names tried per file.
    pub n_disambiguation_max: u32,
}

impl Default for SpecGatherOptions {
    fn default() -> Self {
        Self {
            suffix: C_SUFFIX_DEFAULT.to_string(),
            rule_symlink: EnumGatherSymlinkStrategy::Follow,
            if_preserve_metadata: true,
            if_dry_run: false,
            n_disambiguation_max: N_DISAMBIGUATION_MAX_DEFAULT,
        }
    }
}

/// One discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecScanEntry {
    /// Path relative to the source root.
    pub path_rel: PathBuf,
    /// Base name of the file.
    pub name_file: OsString,
    /// Absolute path of the file as reached by the walk.
    pub path_src: PathBuf,
}

/// One gather failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGatherError {
    /// Failed source path.
    pub path: PathBuf,
    /// Failure class.
    pub kind: EnumGatherFailureKind,
    /// User-facing error text.
    pub exception: String,
}

/// "Top-level call failed" errors (input validation / setup stage).
#[derive(Debug, Error)]
pub enum GatherTreeError {
    /// The match criterion is empty.
    #[error("File suffix must not be empty.")]
    EmptySuffix,
    /// Source path does not exist.
    #[error("Source does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Source directory cannot be listed.
    #[error("Source is not readable: {} ({message})", .path.display())]
    SourceUnreadable {
        /// Source root.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Source and destination resolve to the same directory.
    #[error("Source and destination are the same directory: {}", .0.display())]
    SourceIsDestination(PathBuf),
    /// Destination exists and is not a directory.
    #[error("Destination is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),
    /// Destination directory initialization failed.
    #[error("Failed to initialize destination {}: {message}", .path.display())]
    DestinationInitFailed {
        /// Destination path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
    /// Destination directory refuses new files.
    #[error("Destination is not writable: {} ({message})", .path.display())]
    DestinationNotWritable {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
