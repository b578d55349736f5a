use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::report::ReportGatherBuilder;

/// Name prefix of in-flight copies inside the destination.
pub(crate) const C_PARTIAL_PREFIX: &str = ".gatherkit-";
/// Name suffix of in-flight copies inside the destination.
pub(crate) const C_PARTIAL_SUFFIX: &str = ".partial";

const N_BUFFER_BYTES: usize = 64 * 1024;

////////////////////////////////////////////////////////////////////////////////
// #region NameMatching

pub(crate) fn has_suffix(name_file: &OsStr, suffix: &str) -> bool {
    name_file.as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// `n_index == 0` keeps the base name; otherwise the counter goes in front of
/// the matched `suffix` (`x (n).tar.gz`), falling back to `stem (n).ext`.
pub(crate) fn derive_candidate_name(name_file: &OsStr, suffix: &str, n_index: u32) -> OsString {
    if n_index == 0 {
        return name_file.to_os_string();
    }
    if let Some(c_name) = name_file.to_str()
        && let Some(n_split) = _find_counter_position(c_name, suffix)
    {
        let (c_stem, c_tail) = c_name.split_at(n_split);
        return OsString::from(format!("{c_stem} ({n_index}){c_tail}"));
    }
    let path_name = Path::new(name_file);
    let stem = path_name.file_stem().unwrap_or(name_file);
    let mut name_candidate = stem.to_os_string();
    name_candidate.push(format!(" ({n_index})"));
    if let Some(ext) = path_name.extension() {
        name_candidate.push(".");
        name_candidate.push(ext);
    }
    name_candidate
}

/// Byte offset of the counter so the name keeps ending with `suffix`.
/// A suffix without a leading dot is widened back to the nearest dot.
/// `None` when nothing would be left in front of the counter.
fn _find_counter_position(c_name: &str, suffix: &str) -> Option<usize> {
    let n_start = c_name.strip_suffix(suffix)?.len();
    let n_split = if suffix.starts_with('.') {
        n_start
    } else {
        c_name[..n_start].rfind('.').unwrap_or(n_start)
    };
    (n_split > 0).then_some(n_split)
}

fn _is_partial_name(name_file: &OsStr) -> bool {
    let raw = name_file.as_encoded_bytes();
    raw.starts_with(C_PARTIAL_PREFIX.as_bytes()) && raw.ends_with(C_PARTIAL_SUFFIX.as_bytes())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// Resolve symlinks when the path exists, otherwise make it absolute.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    _absolutize_path(path)
}

/// Whether `path_real` lies in the destination subtree.
///
/// A source root nested inside the destination stays in scope, so its own
/// subtree never counts as "inside the destination".
pub(crate) fn is_inside_destination(
    path_real: &Path,
    path_dir_dst_real: &Path,
    path_dir_src_real: &Path,
) -> bool {
    if !path_real.starts_with(path_dir_dst_real) {
        return false;
    }
    !(path_dir_src_real.starts_with(path_dir_dst_real) && path_real.starts_with(path_dir_src_real))
}

/// Identity of a real directory, stable across symlinked paths to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeDirIdentity {
    #[cfg(unix)]
    Inode(u64, u64),
    #[cfg(not(unix))]
    Path(PathBuf),
}

pub(crate) fn derive_dir_identity(path_dir: &Path) -> io::Result<TypeDirIdentity> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let stat_dir = fs::metadata(path_dir)?;
        Ok(TypeDirIdentity::Inode(stat_dir.dev(), stat_dir.ino()))
    }
    #[cfg(not(unix))]
    {
        Ok(TypeDirIdentity::Path(fs::canonicalize(path_dir)?))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ContentCompare

fn _read_full(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut n_filled = 0;
    while n_filled < buffer.len() {
        match reader.read(&mut buffer[n_filled..]) {
            Ok(0) => break,
            Ok(n) => n_filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n_filled)
}

/// Byte-for-byte comparison of two files.
pub(crate) fn is_content_identical(path_a: &Path, path_b: &Path) -> io::Result<bool> {
    if fs::metadata(path_a)?.len() != fs::metadata(path_b)?.len() {
        return Ok(false);
    }

    let mut file_a = File::open(path_a)?;
    let mut file_b = File::open(path_b)?;
    let mut buffer_a = vec![0_u8; N_BUFFER_BYTES];
    let mut buffer_b = vec![0_u8; N_BUFFER_BYTES];
    loop {
        let n_a = _read_full(&mut file_a, &mut buffer_a)?;
        let n_b = _read_full(&mut file_b, &mut buffer_b)?;
        if n_a != n_b || buffer_a[..n_a] != buffer_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AtomicCopy

/// Why a single-file copy did not land.
#[derive(Debug)]
pub(crate) enum ErrorCopyFile {
    /// Reading the source failed.
    Source(io::Error),
    /// Writing or committing into the destination failed.
    Destination(io::Error),
    /// The target name was claimed between the check and the commit.
    Occupied,
}

fn _create_partial_file(path_dir_dst: &Path) -> io::Result<NamedTempFile> {
    Builder::new()
        .prefix(C_PARTIAL_PREFIX)
        .suffix(C_PARTIAL_SUFFIX)
        .tempfile_in(path_dir_dst)
}

/// Copy `path_file_src` to `path_file_dst` as one unit.
///
/// Bytes go to a hidden partial file in the destination directory which is
/// linked into place without clobbering. The partial file is removed on every
/// error path when the temp handle drops.
pub(crate) fn copy_file_atomic(
    path_file_src: &Path,
    path_file_dst: &Path,
    if_preserve_metadata: bool,
) -> Result<(), ErrorCopyFile> {
    let mut file_src = File::open(path_file_src).map_err(ErrorCopyFile::Source)?;
    let path_dir_dst = path_file_dst
        .parent()
        .ok_or_else(|| ErrorCopyFile::Destination(io::Error::other("destination has no parent")))?;
    let mut file_partial = _create_partial_file(path_dir_dst).map_err(ErrorCopyFile::Destination)?;

    let mut buffer = vec![0_u8; N_BUFFER_BYTES];
    loop {
        let n_read = match file_src.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ErrorCopyFile::Source(e)),
        };
        file_partial
            .as_file_mut()
            .write_all(&buffer[..n_read])
            .map_err(ErrorCopyFile::Destination)?;
    }
    file_partial
        .as_file()
        .sync_all()
        .map_err(ErrorCopyFile::Destination)?;

    if if_preserve_metadata
        && let Err(e) = apply_metadata(path_file_src, file_partial.path())
    {
        tracing::debug!(path = %path_file_dst.display(), "metadata not preserved ({e})");
    }

    match file_partial.persist_noclobber(path_file_dst) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Err(ErrorCopyFile::Occupied),
        Err(e) => Err(ErrorCopyFile::Destination(e.error)),
    }
}

fn apply_metadata(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    {
        copy_xattrs_linux(path_file_src, path_file_dst);
    }

    fs::set_permissions(path_file_dst, stat_src.permissions())?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_file_dst, &name, &raw_value);
    }
}

/// Create and drop one partial file to prove the directory accepts new files.
pub(crate) fn probe_writable(path_dir_dst: &Path) -> io::Result<()> {
    let file_probe = _create_partial_file(path_dir_dst)?;
    file_probe.close()
}

/// Remove partial files left behind by an interrupted earlier run.
pub(crate) fn remove_stale_partials(path_dir_dst: &Path, builder: &mut ReportGatherBuilder) {
    let iter_entries = match fs::read_dir(path_dir_dst) {
        Ok(v) => v,
        Err(e) => {
            builder.add_warning(format!(
                "Failed to list destination {} ({e})",
                path_dir_dst.display()
            ));
            return;
        }
    };

    for entry in iter_entries.flatten() {
        if !_is_partial_name(&entry.file_name()) {
            continue;
        }
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let path_partial = entry.path();
        match fs::remove_file(&path_partial) {
            Ok(_) => builder.add_warning(format!(
                "Removed leftover partial copy: {}",
                path_partial.display()
            )),
            Err(e) => builder.add_warning(format!(
                "Failed to remove leftover partial copy {} ({e})",
                path_partial.display()
            )),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
