//! Per-test filesystem sandboxes for a test harness.
//!
//! Before each test the harness calls [`SandboxContext::enter`], which creates
//! a private `<base>/<name>_XXXXXX` directory and makes it the working
//! directory. [`SandboxContext::leave`] restores the previous working
//! directory and removes the tree. [`SandboxContext::teardown`] (or dropping
//! the context) releases whatever is left at the end of the run.

mod builder;
mod canonical;
mod config;
mod context;
mod creator;
mod discovery;
mod env;
mod error;
mod runner;

pub use builder::SandboxBuilder;
pub use canonical::{canonicalize, normalize_separators};
pub use config::{
    CleanupPolicy, DEFAULT_NAME, MAX_PATH, OVERRIDE_VAR, SandboxConfig, TEMPLATE_SUFFIX,
};
pub use context::{SandboxContext, SandboxState};
#[cfg(unix)]
pub use creator::MkdtempCreator;
pub use creator::{GenerateThenCreate, UniqueDirCreator, default_creator, validate_template};
pub use discovery::{find_base_path, is_valid_base_path};
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{Result, SandboxError};
pub use runner::{TestOutcome, TestReport, run_isolated};
