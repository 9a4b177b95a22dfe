//! Scene acquisition from the providers' archives.

use crate::report::BatchReport;
use std::path::Path;
use thiserror::Error;

mod command;
#[cfg(feature = "http")]
mod http;
mod scene;
mod secrets;

pub use command::CommandDownloader;
#[cfg(feature = "http")]
pub use http::HttpDownloader;
pub use scene::{LandsatScene, Scene, SentinelScene};
pub use secrets::{
    resolve_credentials, ChainedSecrets, Credentials, EnvSecrets, PromptSecrets, SecretProvider,
    StoreSecrets,
};

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("malformed scene identifier {0:?}")]
    BadSceneId(String),

    #[error("unterminated placeholder in URL template {0:?}")]
    BadTemplate(String),

    #[error("placeholder {{{0}}} has no value for scene {1}")]
    UnknownPlaceholder(String, String),

    #[error("no value for {0}")]
    MissingCredential(String),

    #[error("`{tool}` not found on PATH. {hint}")]
    ToolMissing { tool: String, hint: String },

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("secret store error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches a batch of scenes into a destination directory.
///
/// Per-scene failures are recorded in the report; only failures that stop
/// the whole batch are returned as errors.
pub trait BulkDownloader {
    fn bulk_download(
        &self,
        scene_ids: &[String],
        credentials: Option<&Credentials>,
        destination: &Path,
    ) -> Result<BatchReport, AcquireError>;
}
