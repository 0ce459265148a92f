//! Per-run sandbox lifecycle.
//!
//! A [`SandboxContext`] is owned by one harness run (or one worker process)
//! and moves through these states:
//!
//! ```text
//! Unbuilt --build--> Ready --enter--> Entered --leave--> Unbuilt ...
//!    \                 \                  \
//!     `------------------`------------------`--teardown--> TornDown
//! ```
//!
//! `leave` consumes the sandbox: the directory is removed and the next
//! `enter` builds a new, distinct directory under the cached base path.
//! The base path is discovered and canonicalized once per context.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::builder::SandboxBuilder;
use crate::config::{CleanupPolicy, SandboxConfig};
use crate::creator::{UniqueDirCreator, default_creator};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{Result, SandboxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    /// No directory recorded; the next `build` or `enter` creates one.
    Unbuilt,
    /// A directory exists but the working directory is outside it.
    Ready,
    /// The working directory is the sandbox.
    Entered,
    /// Terminal; no further sandboxes can be built.
    TornDown,
}

#[derive(Debug)]
enum Slot {
    Unbuilt,
    Ready { path: PathBuf },
    Entered { path: PathBuf, previous: PathBuf },
    TornDown,
}

pub struct SandboxContext {
    builder: SandboxBuilder,
    env: Box<dyn EnvSource>,
    slot: Slot,
}

impl SandboxContext {
    /// Context reading the process environment and using the host's best
    /// unique directory creator.
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            builder: SandboxBuilder::new(config, default_creator()),
            env: Box::new(ProcessEnv),
            slot: Slot::Unbuilt,
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    #[must_use]
    pub fn with_creator(mut self, creator: Box<dyn UniqueDirCreator>) -> Self {
        self.builder = SandboxBuilder::new(self.builder.config().clone(), creator);
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        self.builder.config()
    }

    pub fn state(&self) -> SandboxState {
        match self.slot {
            Slot::Unbuilt => SandboxState::Unbuilt,
            Slot::Ready { .. } => SandboxState::Ready,
            Slot::Entered { .. } => SandboxState::Entered,
            Slot::TornDown => SandboxState::TornDown,
        }
    }

    /// Absolute path of the current sandbox, or `None` if none is recorded.
    pub fn current_path(&self) -> Option<&Path> {
        match &self.slot {
            Slot::Ready { path } | Slot::Entered { path, .. } => Some(path),
            Slot::Unbuilt | Slot::TornDown => None,
        }
    }

    /// Create the sandbox directory if none is recorded.
    ///
    /// Returns the recorded path unchanged when a sandbox already exists. On
    /// failure nothing is recorded, so a later call can retry.
    pub fn build(&mut self) -> Result<&Path> {
        if let Slot::Unbuilt = self.slot {
            let base = self.builder.resolve_base(self.env.as_ref())?.to_path_buf();
            let path = self.builder.build_in(&base)?;
            self.slot = Slot::Ready { path };
        }
        self.current_path().ok_or(SandboxError::TornDown)
    }

    /// Build the sandbox if needed and make it the working directory.
    pub fn enter(&mut self) -> Result<&Path> {
        match self.slot {
            Slot::Entered { .. } => return Err(SandboxError::AlreadyEntered),
            Slot::TornDown => return Err(SandboxError::TornDown),
            Slot::Unbuilt | Slot::Ready { .. } => {}
        }

        let path = self.build()?.to_path_buf();
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(&path).map_err(|source| SandboxError::Enter {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "entered sandbox");

        self.slot = Slot::Entered { path, previous };
        self.current_path().ok_or(SandboxError::NotEntered)
    }

    /// Return to the directory that was current before `enter` and remove the
    /// sandbox tree.
    ///
    /// Failing to leave keeps the context entered. A removal failure is
    /// handled per [`CleanupPolicy`]; either way the sandbox is consumed.
    pub fn leave(&mut self) -> Result<()> {
        let (path, previous) = match std::mem::replace(&mut self.slot, Slot::Unbuilt) {
            Slot::Entered { path, previous } => (path, previous),
            other => {
                self.slot = other;
                return Err(SandboxError::NotEntered);
            }
        };

        if let Err(source) = std::env::set_current_dir(&previous) {
            let err = SandboxError::Leave {
                path: previous.clone(),
                source,
            };
            self.slot = Slot::Entered { path, previous };
            return Err(err);
        }
        debug!(path = %path.display(), cwd = %previous.display(), "left sandbox");

        self.remove_tree(&path)
    }

    /// Leave and remove any recorded sandbox, then refuse further builds.
    ///
    /// A no-op when nothing is recorded or after an earlier teardown.
    pub fn teardown(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.slot, Slot::TornDown) {
            Slot::Unbuilt | Slot::TornDown => Ok(()),
            Slot::Ready { path } => self.remove_tree(&path),
            Slot::Entered { path, previous } => {
                if let Err(source) = std::env::set_current_dir(&previous) {
                    let err = SandboxError::Leave {
                        path: previous.clone(),
                        source,
                    };
                    self.slot = Slot::Entered { path, previous };
                    return Err(err);
                }
                self.remove_tree(&path)
            }
        }
    }

    fn remove_tree(&self, path: &Path) -> Result<()> {
        let source = match std::fs::remove_dir_all(path) {
            Ok(()) => {
                info!(path = %path.display(), "sandbox removed");
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "sandbox already removed");
                return Ok(());
            }
            Err(e) => e,
        };

        match self.config().cleanup {
            CleanupPolicy::Fail => Err(SandboxError::Cleanup {
                path: path.to_path_buf(),
                source,
            }),
            CleanupPolicy::Warn => {
                warn!(path = %path.display(), error = %source, "failed to remove sandbox");
                Ok(())
            }
            CleanupPolicy::Ignore => {
                debug!(path = %path.display(), error = %source, "failed to remove sandbox");
                Ok(())
            }
        }
    }
}

impl Drop for SandboxContext {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(error = %e, "sandbox teardown on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use serial_test::serial;

    fn context(base: &Path) -> SandboxContext {
        let config = SandboxConfig::default()
            .with_env_vars(["CLAR_TMP"])
            .with_fallback(None);
        SandboxContext::new(config).with_env(MapEnv::new().with("CLAR_TMP", base))
    }

    #[test]
    fn starts_unbuilt() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        assert_eq!(ctx.state(), SandboxState::Unbuilt);
        assert!(ctx.current_path().is_none());
    }

    #[test]
    fn build_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());

        let first = ctx.build().unwrap().to_path_buf();
        let second = ctx.build().unwrap().to_path_buf();
        assert_eq!(first, second);
        assert_eq!(ctx.state(), SandboxState::Ready);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    struct FailingCreator;

    impl UniqueDirCreator for FailingCreator {
        fn name(&self) -> &str {
            "failing"
        }

        fn create(&self, template: &Path) -> Result<PathBuf> {
            Err(SandboxError::Create {
                path: template.to_path_buf(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    #[test]
    fn build_failure_records_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path()).with_creator(Box::new(FailingCreator));

        let err = ctx.build().unwrap_err();
        assert!(matches!(err, SandboxError::Create { .. }), "got {err:?}");
        assert!(err.to_string().contains("disk full"), "got: {err}");
        assert_eq!(ctx.state(), SandboxState::Unbuilt);
        assert!(ctx.current_path().is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

        // A working creator can retry cleanly afterwards.
        let mut ctx = ctx.with_creator(crate::creator::default_creator());
        assert!(ctx.build().unwrap().is_dir());
    }

    #[test]
    fn capacity_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let limit = tmp.path().as_os_str().len() + 1;
        let config = SandboxConfig::default()
            .with_env_vars(["CLAR_TMP"])
            .with_fallback(None)
            .with_max_path(limit);
        let mut ctx =
            SandboxContext::new(config).with_env(MapEnv::new().with("CLAR_TMP", tmp.path()));

        let err = ctx.build().unwrap_err();
        assert!(matches!(err, SandboxError::PathTooLong { .. }), "got {err:?}");
        assert_eq!(ctx.state(), SandboxState::Unbuilt);
    }

    #[test]
    fn teardown_without_build_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());

        ctx.teardown().unwrap();
        ctx.teardown().unwrap();
        assert_eq!(ctx.state(), SandboxState::TornDown);
    }

    #[test]
    fn teardown_removes_built_sandbox() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        let path = ctx.build().unwrap().to_path_buf();

        ctx.teardown().unwrap();
        assert!(!path.exists());
        assert!(ctx.current_path().is_none());
        assert!(matches!(ctx.build(), Err(SandboxError::TornDown)));
    }

    #[test]
    fn leave_without_enter_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());
        ctx.build().unwrap();

        assert!(matches!(ctx.leave(), Err(SandboxError::NotEntered)));
        assert_eq!(ctx.state(), SandboxState::Ready);
        assert!(ctx.current_path().is_some());

        ctx.teardown().unwrap();
        assert!(matches!(ctx.leave(), Err(SandboxError::NotEntered)));
        assert_eq!(ctx.state(), SandboxState::TornDown);
    }

    #[test]
    #[serial]
    fn enter_then_leave_restores_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let mut ctx = context(tmp.path());

        let path = ctx.enter().unwrap().to_path_buf();
        assert_eq!(std::env::current_dir().unwrap(), path);
        assert_eq!(ctx.state(), SandboxState::Entered);
        assert!(matches!(ctx.enter(), Err(SandboxError::AlreadyEntered)));

        ctx.leave().unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!path.exists());
        assert_eq!(ctx.state(), SandboxState::Unbuilt);
    }

    #[test]
    #[serial]
    fn enter_after_leave_builds_fresh_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path());

        let first = ctx.enter().unwrap().to_path_buf();
        ctx.leave().unwrap();
        let second = ctx.enter().unwrap().to_path_buf();
        ctx.leave().unwrap();

        assert_ne!(first, second);
        assert_eq!(first.parent(), second.parent());
    }

    #[test]
    #[serial]
    fn teardown_while_entered_leaves_first() {
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let mut ctx = context(tmp.path());

        let path = ctx.enter().unwrap().to_path_buf();
        ctx.teardown().unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn drop_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let path = {
            let mut ctx = context(tmp.path());
            ctx.enter().unwrap().to_path_buf()
        };
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(!path.exists());
    }

    #[test]
    #[serial]
    fn test_body_can_remove_its_own_sandbox() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = context(tmp.path()).with_creator(Box::new(crate::GenerateThenCreate));

        let path = ctx.enter().unwrap().to_path_buf();
        std::fs::remove_dir(&path).unwrap();
        ctx.leave().unwrap();
        assert!(!path.exists());
    }
}
