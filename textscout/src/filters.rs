//! File classification for the scanner.
//!
//! A walked entry becomes a candidate only when all of these hold:
//!
//! 1. its last path component ends with `.` + the requested extension (case-sensitive),
//! 2. it resolves (following symlinks) to a regular file,
//! 3. the current user may read it,
//! 4. it does not match one of the configured ignore globs.
//!
//! Every check fails closed: an I/O error while stat-ing a path means "not a candidate".
//! The cheap name test runs first so that most entries never cost a `stat`.
use glob::Pattern;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Checks if the last path component ends with `.{extension}` (case-sensitive)
pub fn has_valid_extension(path: &Path, extension: &str) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy();
    name.len() > extension.len()
        && name.ends_with(extension)
        && name.as_bytes()[name.len() - extension.len() - 1] == b'.'
}

/// Checks that the path resolves to a regular file readable by the current user
pub fn is_readable_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => can_access(path, Access::Read),
        Ok(_) => false,
        Err(e) => {
            trace!("Cannot stat {}: {}", path.display(), e);
            false
        }
    }
}

/// Checks that the path is a directory the current user may traverse
pub fn is_searchable_dir(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => can_access(path, Access::Execute),
        _ => false,
    }
}

/// Checks if a file should be ignored based on ignore patterns.
/// Patterns are matched against the path relative to `root`.
pub fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    // Normalize separators so patterns written with '/' work everywhere
    let normalized = relative.to_string_lossy().replace('\\', "/");

    ignore_patterns.iter().any(|pattern| match Pattern::new(pattern) {
        Ok(p) => p.matches(&normalized),
        Err(_) => false,
    })
}

/// Determines if a walked entry is a search candidate
pub fn accept(path: &Path, extension: &str) -> bool {
    has_valid_extension(path, extension) && is_readable_file(path)
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Execute,
}

#[cfg(unix)]
fn can_access(path: &Path, access: Access) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    let mode = match access {
        Access::Read => libc::R_OK,
        Access::Execute => libc::X_OK,
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

#[cfg(not(unix))]
fn can_access(path: &Path, access: Access) -> bool {
    match access {
        Access::Read => fs::File::open(path).is_ok(),
        Access::Execute => fs::read_dir(path).is_ok(),
    }
}
