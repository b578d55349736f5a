//! Source tree traversal and flat gather orchestration.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::event::{EnumGatherOutcome, EventGather};
use crate::report::{ReportGather, ReportGatherBuilder};
use crate::spec::{
    EnumGatherFailureKind, EnumGatherSymlinkStrategy, GatherTreeError, SpecGatherOptions,
    SpecScanEntry,
};
use crate::util::{
    ErrorCopyFile, TypeDirIdentity, copy_file_atomic, derive_candidate_name, derive_dir_identity,
    has_suffix, is_content_identical, is_inside_destination, normalize_path, probe_writable,
    remove_stale_partials,
};

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_dir_src_sub: PathBuf,
    name_dir: OsString,
}

#[derive(Debug, Clone)]
struct SpecFileEntry {
    path_file_src: PathBuf,
    name_file: OsString,
    if_is_symlink: bool,
    if_is_broken: bool,
}

/// State of one destination name candidate.
enum EnumCandidateState {
    Free,
    Identical,
    Taken,
}

struct SpecGatherContext<'a> {
    path_dir_src_real: PathBuf,
    path_dir_dst: PathBuf,
    path_dir_dst_real: PathBuf,
    spec_options: SpecGatherOptions,
    builder_report: ReportGatherBuilder,
    set_visited_dirs: HashSet<TypeDirIdentity>,
    /// Dry run only: names handed out so far, mapped to the source that claimed them.
    map_names_planned: HashMap<OsString, PathBuf>,
    on_event: &'a mut dyn FnMut(&EventGather),
}

/// Gather every file under `dir_source` whose name ends with the configured
/// suffix into the flat directory `dir_destination`.
///
/// See [`gather_tree_with`] for the per-file event stream.
pub fn gather_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_options: SpecGatherOptions,
) -> Result<ReportGather, GatherTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    gather_tree_with(dir_source, dir_destination, spec_options, |_| {})
}

/// Gather matching files and call `on_event` once per match.
///
/// This function performs:
/// 1. Input validation and destination preparation (create, probe, clean up
///    partial files from interrupted runs).
/// 2. A deterministic depth-first walk: per directory, entries sorted by name,
///    files before subdirectories. Directories are tracked by real identity so
///    symlink loops terminate; the destination subtree is never entered.
/// 3. Per match: collision resolution (`name (n).ext`), byte-identical
///    duplicate detection, and an all-or-nothing copy.
///
/// Returns [`ReportGather`] when the run completes (per-file failures are
/// stored in the report). Returns [`GatherTreeError`] only for setup failures,
/// in which case nothing has been copied.
pub fn gather_tree_with<P, Q, F>(
    dir_source: P,
    dir_destination: Q,
    spec_options: SpecGatherOptions,
    mut on_event: F,
) -> Result<ReportGather, GatherTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(&EventGather),
{
    if spec_options.suffix.is_empty() {
        return Err(GatherTreeError::EmptySuffix);
    }

    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();

    validate_source(&path_dir_src)?;
    let path_dir_src_real = normalize_path(&path_dir_src);

    prepare_destination(&path_dir_dst, spec_options.if_dry_run)?;
    let path_dir_dst_real = normalize_path(&path_dir_dst);
    if path_dir_dst_real == path_dir_src_real {
        return Err(GatherTreeError::SourceIsDestination(path_dir_src_real));
    }

    let mut builder_report = ReportGatherBuilder::default();
    if !spec_options.if_dry_run {
        probe_writable(&path_dir_dst).map_err(|e| GatherTreeError::DestinationNotWritable {
            path: path_dir_dst.clone(),
            message: e.to_string(),
        })?;
        remove_stale_partials(&path_dir_dst, &mut builder_report);
    }

    info!(
        source = %path_dir_src.display(),
        destination = %path_dir_dst.display(),
        suffix = %spec_options.suffix,
        dry_run = spec_options.if_dry_run,
        "gather started"
    );

    let mut spec_ctx = SpecGatherContext {
        path_dir_src_real,
        path_dir_dst,
        path_dir_dst_real,
        spec_options,
        builder_report,
        set_visited_dirs: HashSet::new(),
        map_names_planned: HashMap::new(),
        on_event: &mut on_event,
    };

    walk_directory(&path_dir_src, Path::new(""), &mut spec_ctx);

    let report = spec_ctx.builder_report.build();
    info!(
        matched = report.cnt_matched,
        copied = report.cnt_copied,
        skipped = report.cnt_skipped,
        failed = report.error_count(),
        "gather finished"
    );
    Ok(report)
}

fn validate_source(path_dir_src: &Path) -> Result<(), GatherTreeError> {
    match fs::metadata(path_dir_src) {
        Ok(meta_src) if !meta_src.is_dir() => {
            return Err(GatherTreeError::SourceNotDirectory(
                path_dir_src.to_path_buf(),
            ));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(GatherTreeError::SourceNotFound(path_dir_src.to_path_buf()));
        }
        Err(e) => {
            return Err(GatherTreeError::SourceUnreadable {
                path: path_dir_src.to_path_buf(),
                message: e.to_string(),
            });
        }
    }
    fs::read_dir(path_dir_src).map_err(|e| GatherTreeError::SourceUnreadable {
        path: path_dir_src.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

fn prepare_destination(path_dir_dst: &Path, if_dry_run: bool) -> Result<(), GatherTreeError> {
    match fs::metadata(path_dir_dst) {
        Ok(meta_dst) if !meta_dst.is_dir() => Err(GatherTreeError::DestinationNotDirectory(
            path_dir_dst.to_path_buf(),
        )),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if if_dry_run {
                return Ok(());
            }
            fs::create_dir_all(path_dir_dst).map_err(|e| GatherTreeError::DestinationInitFailed {
                path: path_dir_dst.to_path_buf(),
                message: e.to_string(),
            })
        }
        Err(e) => Err(GatherTreeError::DestinationInitFailed {
            path: path_dir_dst.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn walk_directory(path_root: &Path, path_rel_root: &Path, spec_ctx: &mut SpecGatherContext) {
    match derive_dir_identity(path_root) {
        Ok(dir_identity) => {
            if !spec_ctx.set_visited_dirs.insert(dir_identity) {
                spec_ctx.builder_report.add_warning(format!(
                    "Directory already visited (symlink loop?): {}",
                    path_root.display()
                ));
                return;
            }
        }
        Err(e) => {
            spec_ctx.builder_report.add_warning(format!(
                "Failed to stat directory {} ({e})",
                path_root.display()
            ));
            return;
        }
    }
    debug!(dir = %path_root.display(), "scanning directory");

    let iter_entries = match fs::read_dir(path_root) {
        Ok(iter) => iter,
        Err(e) => {
            spec_ctx.builder_report.add_warning(format!(
                "Failed to read directory {} ({e})",
                path_root.display()
            ));
            return;
        }
    };

    let enum_rule_symlink = spec_ctx.spec_options.rule_symlink;
    let mut l_dirs: Vec<SpecDirEntry> = Vec::new();
    let mut l_files: Vec<SpecFileEntry> = Vec::new();

    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_ctx.builder_report.add_warning(format!(
                    "Failed to read directory entry under {} ({e})",
                    path_root.display()
                ));
                continue;
            }
        };

        let path_entry = entry.path();
        let name_entry = entry.file_name();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_ctx
                    .builder_report
                    .add_warning(format!("Failed to inspect {} ({e})", path_entry.display()));
                continue;
            }
        };

        if cfg_file_type.is_dir() {
            l_dirs.push(SpecDirEntry {
                path_dir_src_sub: path_entry,
                name_dir: name_entry,
            });
            continue;
        }
        if cfg_file_type.is_file() {
            l_files.push(SpecFileEntry {
                path_file_src: path_entry,
                name_file: name_entry,
                if_is_symlink: false,
                if_is_broken: false,
            });
            continue;
        }
        if !cfg_file_type.is_symlink() {
            warn_special_file(&path_entry, &name_entry, spec_ctx);
            continue;
        }

        match fs::metadata(&path_entry) {
            Ok(meta_target) if meta_target.is_dir() => {
                if enum_rule_symlink == EnumGatherSymlinkStrategy::Follow {
                    l_dirs.push(SpecDirEntry {
                        path_dir_src_sub: path_entry,
                        name_dir: name_entry,
                    });
                } else {
                    debug!(path = %path_entry.display(), "not following directory symlink");
                }
            }
            Ok(meta_target) if !meta_target.is_file() => {
                warn_special_file(&path_entry, &name_entry, spec_ctx);
            }
            res_target => l_files.push(SpecFileEntry {
                path_file_src: path_entry,
                name_file: name_entry,
                if_is_symlink: true,
                if_is_broken: res_target.is_err(),
            }),
        }
    }

    l_files.sort_by(|a, b| a.name_file.cmp(&b.name_file));
    l_dirs.sort_by(|a, b| a.name_dir.cmp(&b.name_dir));

    for _file_entry in l_files {
        handle_file_entry(_file_entry, path_rel_root, spec_ctx);
    }

    for _dir_entry in l_dirs {
        let path_dir_real = normalize_path(&_dir_entry.path_dir_src_sub);
        if is_inside_destination(
            &path_dir_real,
            &spec_ctx.path_dir_dst_real,
            &spec_ctx.path_dir_src_real,
        ) {
            debug!(dir = %_dir_entry.path_dir_src_sub.display(), "not entering destination");
            continue;
        }
        let path_rel_next = path_rel_root.join(&_dir_entry.name_dir);
        walk_directory(&_dir_entry.path_dir_src_sub, &path_rel_next, spec_ctx);
    }
}

fn warn_special_file(path_entry: &Path, name_entry: &OsString, spec_ctx: &mut SpecGatherContext) {
    if has_suffix(name_entry, &spec_ctx.spec_options.suffix) {
        spec_ctx
            .builder_report
            .add_warning(format!("Special file skipped: {}", path_entry.display()));
    }
}

fn handle_file_entry(
    spec_file_entry: SpecFileEntry,
    path_rel_root: &Path,
    spec_ctx: &mut SpecGatherContext,
) {
    spec_ctx.builder_report.add_scanned();
    if !has_suffix(&spec_file_entry.name_file, &spec_ctx.spec_options.suffix) {
        return;
    }
    spec_ctx.builder_report.add_matched();

    let outcome = resolve_file_outcome(&spec_file_entry, spec_ctx);
    let spec_scan_entry = SpecScanEntry {
        path_rel: path_rel_root.join(&spec_file_entry.name_file),
        name_file: spec_file_entry.name_file,
        path_src: spec_file_entry.path_file_src,
    };
    record_outcome(spec_scan_entry, outcome, spec_ctx);
}

fn resolve_file_outcome(
    spec_file_entry: &SpecFileEntry,
    spec_ctx: &mut SpecGatherContext,
) -> EnumGatherOutcome {
    if spec_file_entry.if_is_symlink {
        if spec_ctx.spec_options.rule_symlink == EnumGatherSymlinkStrategy::Skip {
            return EnumGatherOutcome::SkippedSymlink;
        }
        if spec_file_entry.if_is_broken {
            return EnumGatherOutcome::Failed {
                kind: EnumGatherFailureKind::SourceUnreadable,
                message: format!(
                    "Broken symlink: {}",
                    spec_file_entry.path_file_src.display()
                ),
            };
        }
        let path_file_real = match fs::canonicalize(&spec_file_entry.path_file_src) {
            Ok(v) => v,
            Err(e) => {
                return EnumGatherOutcome::Failed {
                    kind: EnumGatherFailureKind::SourceUnreadable,
                    message: e.to_string(),
                };
            }
        };
        if is_inside_destination(
            &path_file_real,
            &spec_ctx.path_dir_dst_real,
            &spec_ctx.path_dir_src_real,
        ) {
            return EnumGatherOutcome::SkippedInsideDestination;
        }
    }

    place_file(
        &spec_file_entry.path_file_src,
        &spec_file_entry.name_file,
        spec_ctx,
    )
}

/// Walk the `name (n).ext` candidates until the file lands, turns out to be a
/// duplicate, or fails.
fn place_file(
    path_file_src: &Path,
    name_file: &OsString,
    spec_ctx: &mut SpecGatherContext,
) -> EnumGatherOutcome {
    let n_disambiguation_max = spec_ctx.spec_options.n_disambiguation_max;
    for n_index in 0..=n_disambiguation_max {
        let name_candidate =
            derive_candidate_name(name_file, &spec_ctx.spec_options.suffix, n_index);
        let path_candidate = spec_ctx.path_dir_dst.join(&name_candidate);

        match inspect_candidate(path_file_src, &path_candidate, &name_candidate, spec_ctx) {
            EnumCandidateState::Free => {}
            EnumCandidateState::Identical => {
                return EnumGatherOutcome::SkippedDuplicate {
                    path_dst: path_candidate,
                };
            }
            EnumCandidateState::Taken => continue,
        }

        if spec_ctx.spec_options.if_dry_run {
            spec_ctx
                .map_names_planned
                .insert(name_candidate, path_file_src.to_path_buf());
            return EnumGatherOutcome::Planned {
                path_dst: path_candidate,
            };
        }

        match copy_file_atomic(
            path_file_src,
            &path_candidate,
            spec_ctx.spec_options.if_preserve_metadata,
        ) {
            Ok(()) if n_index == 0 => {
                return EnumGatherOutcome::Copied {
                    path_dst: path_candidate,
                };
            }
            Ok(()) => {
                return EnumGatherOutcome::Renamed {
                    path_dst: path_candidate,
                };
            }
            Err(ErrorCopyFile::Occupied) => {
                debug!(path = %path_candidate.display(), "name claimed concurrently");
                continue;
            }
            Err(ErrorCopyFile::Source(e)) => {
                let kind = match e.kind() {
                    io::ErrorKind::PermissionDenied => EnumGatherFailureKind::PermissionDenied,
                    _ => EnumGatherFailureKind::SourceUnreadable,
                };
                return EnumGatherOutcome::Failed {
                    kind,
                    message: format!("Failed to read source ({e})"),
                };
            }
            Err(ErrorCopyFile::Destination(e)) => {
                return EnumGatherOutcome::Failed {
                    kind: EnumGatherFailureKind::from_io_error(&e),
                    message: format!("Failed to write {} ({e})", path_candidate.display()),
                };
            }
        }
    }

    EnumGatherOutcome::Failed {
        kind: EnumGatherFailureKind::NameExhausted,
        message: format!(
            "No free destination name after {} attempts",
            u64::from(n_disambiguation_max) + 1
        ),
    }
}

fn inspect_candidate(
    path_file_src: &Path,
    path_candidate: &Path,
    name_candidate: &OsString,
    spec_ctx: &SpecGatherContext,
) -> EnumCandidateState {
    match fs::symlink_metadata(path_candidate) {
        Ok(meta_candidate) if meta_candidate.is_file() => {
            compare_candidate(path_file_src, path_candidate)
        }
        Ok(_) => EnumCandidateState::Taken,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            match spec_ctx.map_names_planned.get(name_candidate) {
                Some(path_planned_src) => compare_candidate(path_file_src, path_planned_src),
                None => EnumCandidateState::Free,
            }
        }
        Err(e) => {
            debug!(path = %path_candidate.display(), "cannot inspect candidate ({e})");
            EnumCandidateState::Taken
        }
    }
}

fn compare_candidate(path_file_src: &Path, path_occupant: &Path) -> EnumCandidateState {
    match is_content_identical(path_file_src, path_occupant) {
        Ok(true) => EnumCandidateState::Identical,
        Ok(false) => EnumCandidateState::Taken,
        Err(e) => {
            debug!(path = %path_occupant.display(), "content compare failed ({e})");
            EnumCandidateState::Taken
        }
    }
}

fn record_outcome(
    spec_scan_entry: SpecScanEntry,
    outcome: EnumGatherOutcome,
    spec_ctx: &mut SpecGatherContext,
) {
    match &outcome {
        EnumGatherOutcome::Copied { .. } => spec_ctx.builder_report.add_copied(),
        EnumGatherOutcome::Renamed { .. } => spec_ctx.builder_report.add_renamed(),
        EnumGatherOutcome::Failed { kind, message } => spec_ctx.builder_report.add_error(
            spec_scan_entry.path_src.clone(),
            *kind,
            message.clone(),
        ),
        EnumGatherOutcome::SkippedDuplicate { .. }
        | EnumGatherOutcome::SkippedInsideDestination
        | EnumGatherOutcome::SkippedSymlink
        | EnumGatherOutcome::Planned { .. } => spec_ctx.builder_report.add_skipped(),
    }

    let event = EventGather {
        entry: spec_scan_entry,
        outcome,
    };
    debug!("{event}");
    (spec_ctx.on_event)(&event);
}
