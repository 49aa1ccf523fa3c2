//! Configuration loading from a dotenv file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::Settings;

/// Canonical name of the dotenv file.
pub const ENV_FILE_NAME: &str = ".env";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigReadError {
    #[error("config file {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

/// Reads settings from a dotenv file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    environment_fallback: bool,
}

impl ConfigSource {
    /// A source reading only the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            environment_fallback: false,
        }
    }

    /// Consult the process environment for keys missing from the file.
    pub fn with_environment_fallback(mut self) -> Self {
        self.environment_fallback = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the dotenv file relative to `base`.
    ///
    /// Checks `base/.env`, then `base/../.env`. When neither exists the
    /// canonical `base/.env` is returned so it can be watched for creation.
    pub fn locate(base: &Path) -> PathBuf {
        let candidates = [base.join(ENV_FILE_NAME), base.join("..").join(ENV_FILE_NAME)];

        for candidate in &candidates {
            if candidate.is_file() {
                tracing::info!(path = %candidate.display(), "Found config file");
                return candidate.clone();
            }
        }

        let fallback = candidates[0].clone();
        tracing::warn!(
            default = %fallback.display(),
            "No config file found in any of the expected locations"
        );
        fallback
    }

    /// Read and interpret the file.
    pub async fn load(&self) -> Result<Settings, ConfigReadError> {
        let path = self.path.clone();
        let pairs = tokio::task::spawn_blocking(move || read_pairs(&path))
            .await
            .map_err(|e| ConfigReadError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })??;
        tracing::debug!(path = %self.path.display(), variables = pairs.len(), "Config file parsed");

        let environment_fallback = self.environment_fallback;
        Ok(Settings::from_lookup(|key| {
            pairs.get(key).cloned().or_else(|| {
                if environment_fallback {
                    std::env::var(key).ok()
                } else {
                    None
                }
            })
        }))
    }

    /// Startup variant of [`load`](Self::load): an unreadable file degrades
    /// to the process environment and defaults instead of failing.
    pub async fn load_or_default(&self) -> Settings {
        match self.load().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Config file unavailable, using environment and defaults");
                let environment_fallback = self.environment_fallback;
                Settings::from_lookup(|key| {
                    if environment_fallback {
                        std::env::var(key).ok()
                    } else {
                        None
                    }
                })
            }
        }
    }
}

/// Parse `path` as dotenv without touching the process environment.
fn read_pairs(path: &Path) -> Result<HashMap<String, String>, ConfigReadError> {
    let to_config_error = |e: dotenv::Error| match e {
        dotenv::Error::Io(source) if source.kind() == std::io::ErrorKind::NotFound => {
            ConfigReadError::Missing {
                path: path.to_path_buf(),
            }
        }
        dotenv::Error::Io(source) => ConfigReadError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => ConfigReadError::Malformed {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    };

    let mut pairs = HashMap::new();
    for item in dotenv::from_path_iter(path).map_err(to_config_error)? {
        let (key, value) = item.map_err(to_config_error)?;
        pairs.insert(key, value);
    }
    Ok(pairs)
}
