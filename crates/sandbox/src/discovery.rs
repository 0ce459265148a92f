use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SandboxConfig;
use crate::env::EnvSource;
use crate::error::{Result, SandboxError};

/// Whether `path` can host sandboxes: an existing, writable directory whose
/// length leaves room below `max_path`.
pub fn is_valid_base_path(path: &Path, max_path: usize) -> bool {
    if path.as_os_str().is_empty() || path.as_os_str().len() >= max_path {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => is_writable(path, &meta),
        _ => false,
    }
}

#[cfg(unix)]
fn is_writable(path: &Path, _meta: &std::fs::Metadata) -> bool {
    use nix::unistd::{AccessFlags, access};

    access(path, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(_path: &Path, meta: &std::fs::Metadata) -> bool {
    !meta.permissions().readonly()
}

/// Find the directory sandboxes are created under.
///
/// Candidates in order: each variable in `config.env_vars`, the platform temp
/// directory (when enabled), `config.fallback`, then the current directory.
/// The first valid candidate is returned verbatim.
pub fn find_base_path(config: &SandboxConfig, env: &dyn EnvSource) -> Result<PathBuf> {
    let mut tried = Vec::new();

    for var in &config.env_vars {
        let Some(value) = env.var_os(var) else {
            continue;
        };
        let candidate = PathBuf::from(value);
        if is_valid_base_path(&candidate, config.max_path) {
            debug!(var = %var, path = %candidate.display(), "using temp dir from environment");
            return Ok(candidate);
        }
        debug!(var = %var, path = %candidate.display(), "skipping unusable temp dir");
        tried.push(format!("${var}={}", candidate.display()));
    }

    if config.use_platform_temp {
        let candidate = std::env::temp_dir();
        if is_valid_base_path(&candidate, config.max_path) {
            debug!(path = %candidate.display(), "using platform temp dir");
            return Ok(candidate);
        }
        tried.push(candidate.display().to_string());
    }

    let conventional = config.fallback.iter().map(String::as_str).chain(["."]);
    for candidate in conventional {
        let path = PathBuf::from(candidate);
        if is_valid_base_path(&path, config.max_path) {
            debug!(path = %path.display(), "using fallback temp dir");
            return Ok(path);
        }
        tried.push(candidate.to_string());
    }

    Err(SandboxError::NoUsableBase { tried })
}
