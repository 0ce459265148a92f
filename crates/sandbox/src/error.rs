use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("no usable temporary directory found (tried: {})", tried.join(", "))]
    NoUsableBase { tried: Vec<String> },

    #[error("failed to canonicalize {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox path too long: {len} bytes exceeds limit of {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("invalid name template {0:?}: must end with six 'X' placeholders")]
    InvalidTemplate(String),

    #[error("failed to create sandbox directory {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to change into sandbox directory {}: {source}", path.display())]
    Enter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to leave sandbox directory for {}: {source}", path.display())]
    Leave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove sandbox directory {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox is not entered")]
    NotEntered,

    #[error("sandbox is already entered")]
    AlreadyEntered,

    #[error("sandbox has been torn down")]
    TornDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
