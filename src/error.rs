use std::path::PathBuf;
use thiserror::Error;

/// Fatal, pre-dispatch configuration problems. Nothing has touched the image
/// source or any backend when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no image source: pass --image or --directory (or use --interactive)")]
    MissingImageSource,

    #[error("no backend enabled: pass --use-saas and/or --use-sdk")]
    NoBackendEnabled,

    #[error("--use-sdk requires at least one --sdk-port")]
    MissingSdkPorts,

    #[error("at most {max} SDK ports are supported, got {got}")]
    TooManySdkTargets { max: usize, got: usize },

    #[error("--sdk-version count ({versions}) must match --sdk-port count ({ports})")]
    SdkCountMismatch { ports: usize, versions: usize },

    #[error("--workers must be at least 1")]
    ZeroWorkers,

    #[error("config file not found: {0}")]
    ConfigFileMissing(PathBuf),

    #[error("invalid config file {path}: {reason}")]
    InvalidConfigFile { path: PathBuf, reason: String },

    #[error("interactive input ended before the configuration was complete")]
    InteractiveAborted,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no images with a recognized extension in directory: {0}")]
    EmptyDirectory(PathBuf),

    #[error("not a recognized image file: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("reading directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("writing report {path}: {reason}")]
pub struct ReportWriteError {
    pub path: PathBuf,
    pub reason: String,
}

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const INTERRUPTED: i32 = 130;
}

pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        exit_code::CONFIG
    } else {
        exit_code::FAILURE
    }
}
