use std::path::{Path, PathBuf};

use crate::error::{Result, SandboxError};

/// Resolve `path` to an absolute, symlink-free form with forward slashes.
///
/// Idempotent: an already canonical path comes back unchanged.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    let resolved = std::fs::canonicalize(path).map_err(|source| SandboxError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(finish(resolved))
}

#[cfg(windows)]
fn finish(resolved: PathBuf) -> PathBuf {
    let raw = resolved.to_string_lossy();
    let plain = if let Some(unc) = raw.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{unc}")
    } else if let Some(local) = raw.strip_prefix(r"\\?\") {
        local.to_string()
    } else {
        raw.into_owned()
    };
    PathBuf::from(normalize_separators(&plain))
}

#[cfg(not(windows))]
fn finish(resolved: PathBuf) -> PathBuf {
    resolved
}

/// Replace every backslash with a forward slash.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
