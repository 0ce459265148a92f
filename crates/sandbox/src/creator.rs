use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::TEMPLATE_SUFFIX;
use crate::error::{Result, SandboxError};

const NAME_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Creates a uniquely named directory from a template path.
///
/// `template` is `<base>/<name>_XXXXXX`. Implementations replace the trailing
/// placeholders with a collision-free token, create the directory with
/// owner-only permissions, and return its path. A directory is either created
/// and returned, or nothing is created and an error is returned.
pub trait UniqueDirCreator: Send + Sync {
    /// Human-readable name of the strategy (e.g. "mkdtemp").
    fn name(&self) -> &str;
    fn create(&self, template: &Path) -> Result<PathBuf>;
}

/// Check that a directory name template is a single path component ending in
/// the six placeholder characters.
pub fn validate_template(template: &str) -> Result<()> {
    let valid = template
        .strip_suffix(TEMPLATE_SUFFIX)
        .is_some_and(|stem| !stem.ends_with('X'))
        && !template.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(SandboxError::InvalidTemplate(template.to_string()))
    }
}

/// Atomic name generation and creation via `mkdtemp(3)`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MkdtempCreator;

#[cfg(unix)]
impl UniqueDirCreator for MkdtempCreator {
    fn name(&self) -> &str {
        "mkdtemp"
    }

    fn create(&self, template: &Path) -> Result<PathBuf> {
        nix::unistd::mkdtemp(template).map_err(|e| SandboxError::Create {
            path: template.to_path_buf(),
            source: std::io::Error::from(e),
        })
    }
}

/// Generates the name first, then creates the directory with mode 0700.
///
/// Used where no atomic primitive exists. The window between generating the
/// name and creating the directory is closed by `mkdir` failing on an existing
/// entry rather than reusing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateThenCreate;

impl GenerateThenCreate {
    fn generate(template: &Path) -> Result<PathBuf> {
        let invalid = || SandboxError::InvalidTemplate(template.display().to_string());
        let raw = template.to_str().ok_or_else(invalid)?;
        let stem = raw.strip_suffix(TEMPLATE_SUFFIX).ok_or_else(invalid)?;
        let token: String = uuid::Uuid::new_v4()
            .as_bytes()
            .iter()
            .filter_map(|b| NAME_ALPHABET.get(usize::from(*b) % NAME_ALPHABET.len()))
            .take(TEMPLATE_SUFFIX.len())
            .map(|b| char::from(*b))
            .collect();
        Ok(PathBuf::from(format!("{stem}{token}")))
    }
}

impl UniqueDirCreator for GenerateThenCreate {
    fn name(&self) -> &str {
        "generate-then-create"
    }

    fn create(&self, template: &Path) -> Result<PathBuf> {
        let path = Self::generate(template)?;

        let mut builder = std::fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&path).map_err(|source| SandboxError::Create {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Best available creator for this host.
pub fn default_creator() -> Box<dyn UniqueDirCreator> {
    #[cfg(unix)]
    let creator: Box<dyn UniqueDirCreator> = Box::new(MkdtempCreator);
    #[cfg(not(unix))]
    let creator: Box<dyn UniqueDirCreator> = Box::new(GenerateThenCreate);
    debug!(creator = creator.name(), "selected unique directory creator");
    creator
}
