use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::canonical::canonicalize;
use crate::config::SandboxConfig;
use crate::creator::{UniqueDirCreator, validate_template};
use crate::discovery::find_base_path;
use crate::env::EnvSource;
use crate::error::{Result, SandboxError};

/// Creates sandbox directories under a base path that is discovered and
/// canonicalized once, then cached.
pub struct SandboxBuilder {
    config: SandboxConfig,
    creator: Box<dyn UniqueDirCreator>,
    base: Option<PathBuf>,
}

impl SandboxBuilder {
    pub fn new(config: SandboxConfig, creator: Box<dyn UniqueDirCreator>) -> Self {
        Self {
            config,
            creator,
            base: None,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Cached canonical base path, if already resolved.
    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Discover and canonicalize the base path on first call; later calls
    /// return the cached value.
    pub fn resolve_base(&mut self, env: &dyn EnvSource) -> Result<&Path> {
        let base = match self.base.take() {
            Some(base) => base,
            None => {
                let found = find_base_path(&self.config, env)?;
                let canonical = canonicalize(&found)?;
                debug!(found = %found.display(), base = %canonical.display(), "resolved sandbox base");
                canonical
            }
        };
        Ok(self.base.insert(base).as_path())
    }

    /// Create a fresh uniquely named directory directly under `base`.
    pub fn build_in(&self, base: &Path) -> Result<PathBuf> {
        let template = self.config.template();
        validate_template(&template)?;

        let base_len = base.as_os_str().len();
        let needed = base_len + template.len() + 2;
        if needed > self.config.max_path {
            return Err(SandboxError::PathTooLong {
                len: needed,
                max: self.config.max_path,
            });
        }

        let mut raw = OsString::with_capacity(needed);
        raw.push(base.as_os_str());
        if base.as_os_str().as_encoded_bytes().last() != Some(&b'/') {
            raw.push("/");
        }
        raw.push(&template);

        let path = self.creator.create(Path::new(&raw))?;
        info!(path = %path.display(), creator = self.creator.name(), "sandbox created");
        Ok(path)
    }
}
