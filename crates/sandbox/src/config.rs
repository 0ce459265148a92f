use serde::{Deserialize, Serialize};

/// Upper bound on any sandbox path, in bytes.
#[cfg(windows)]
pub const MAX_PATH: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH: usize = 4096;

/// Directory name prefix. Override at compile time with `CLAR_TMPDIR`.
pub const DEFAULT_NAME: &str = match option_env!("CLAR_TMPDIR") {
    Some(name) => name,
    None => "clar_tmp",
};

/// Placeholder characters replaced by the unique directory creator.
pub const TEMPLATE_SUFFIX: &str = "XXXXXX";

/// Override variable consulted before any platform convention.
pub const OVERRIDE_VAR: &str = "CLAR_TMP";

#[cfg(not(windows))]
pub(crate) const DEFAULT_ENV_VARS: &[&str] =
    &[OVERRIDE_VAR, "TMPDIR", "TMP", "TEMP", "USERPROFILE"];
#[cfg(windows)]
pub(crate) const DEFAULT_ENV_VARS: &[&str] = &[OVERRIDE_VAR];

#[cfg(not(windows))]
pub(crate) const DEFAULT_FALLBACK: Option<&str> = Some("/tmp");
#[cfg(windows)]
pub(crate) const DEFAULT_FALLBACK: Option<&str> = None;

/// What to do when removing a sandbox tree fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Surface the failure as [`SandboxError::Cleanup`](crate::SandboxError::Cleanup).
    Fail,
    /// Log a warning and carry on.
    #[default]
    Warn,
    /// Log at debug level only.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Literal prefix of each sandbox directory (`<name>_XXXXXX`).
    pub name: String,
    /// Environment variables checked in priority order.
    pub env_vars: Vec<String>,
    /// Conventional absolute path tried after the environment (e.g. `/tmp`).
    pub fallback: Option<String>,
    /// Whether the platform temp directory facility is consulted after `env_vars`.
    pub use_platform_temp: bool,
    /// Maximum length of any sandbox path, in bytes.
    pub max_path: usize,
    /// How a failed removal of a sandbox tree is reported.
    pub cleanup: CleanupPolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            env_vars: DEFAULT_ENV_VARS.iter().map(|v| (*v).to_string()).collect(),
            fallback: DEFAULT_FALLBACK.map(String::from),
            use_platform_temp: cfg!(windows),
            max_path: MAX_PATH,
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl SandboxConfig {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_env_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<&str>) -> Self {
        self.fallback = fallback.map(String::from);
        self
    }

    #[must_use]
    pub fn with_platform_temp(mut self, enabled: bool) -> Self {
        self.use_platform_temp = enabled;
        self
    }

    #[must_use]
    pub fn with_max_path(mut self, max_path: usize) -> Self {
        self.max_path = max_path;
        self
    }

    #[must_use]
    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Directory name template handed to the unique directory creator.
    pub fn template(&self) -> String {
        format!("{}_{TEMPLATE_SUFFIX}", self.name)
    }
}
