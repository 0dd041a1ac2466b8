//! Errors raised while reading a single content file

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn one content file into a post or page.
///
/// These never abort a whole build; the loader records them per file.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("front matter opened with `{delimiter}` but never closed")]
    Unterminated { delimiter: &'static str },

    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON front matter: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unparseable date `{value}`")]
    InvalidDate { value: String },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
