use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default name for a merged document when the client supplies none
pub const DEFAULT_OUTPUT_NAME: &str = "merged.pdf";

/// Storage locations for uploaded sources and generated artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding registered source documents
    /// (defaults to $XDG_CACHE_HOME/pdf-merger/uploads)
    pub upload_dir: Option<PathBuf>,

    /// Directory holding merged output artifacts
    /// (defaults to $XDG_CACHE_HOME/pdf-merger/outputs)
    pub output_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| crate::util::storage_root().join("uploads"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| crate::util::storage_root().join("outputs"))
    }
}

/// How long sources and artifacts are kept around
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Seconds an artifact stays downloadable after its first retrieval
    #[serde(default = "default_download_retention_secs")]
    pub download_retention_secs: u64,

    /// Seconds before a never-downloaded artifact is swept
    #[serde(default = "default_unclaimed_artifact_secs")]
    pub unclaimed_artifact_secs: u64,

    /// Seconds before an uploaded source document is swept
    #[serde(default = "default_document_max_age_secs")]
    pub document_max_age_secs: u64,

    /// Interval between background sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_download_retention_secs() -> u64 {
    5
}

const fn default_unclaimed_artifact_secs() -> u64 {
    3600
}

const fn default_document_max_age_secs() -> u64 {
    3600
}

const fn default_sweep_interval_secs() -> u64 {
    300
}

impl RetentionConfig {
    pub const fn download_retention(&self) -> Duration {
        Duration::from_secs(self.download_retention_secs)
    }

    pub const fn unclaimed_artifact_age(&self) -> Duration {
        Duration::from_secs(self.unclaimed_artifact_secs)
    }

    pub const fn document_max_age(&self) -> Duration {
        Duration::from_secs(self.document_max_age_secs)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            download_retention_secs: default_download_retention_secs(),
            unclaimed_artifact_secs: default_unclaimed_artifact_secs(),
            document_max_age_secs: default_document_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum size of a single uploaded file, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    /// Maximum number of files accepted in one upload batch
    #[serde(default = "default_max_files_per_upload")]
    pub max_files_per_upload: usize,
}

const fn default_max_upload_mb() -> u64 {
    100
}

const fn default_max_files_per_upload() -> usize {
    50
}

impl LimitsConfig {
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
            max_files_per_upload: default_max_files_per_upload(),
        }
    }
}

fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage directories
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retention windows
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Upload limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Output file name used when a merge request omits one
    #[serde(default = "default_output_name")]
    pub default_output_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            retention: RetentionConfig::default(),
            limits: LimitsConfig::default(),
            default_output_name: default_output_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/pdf-merger/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-merger").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Reject values that would make uploads or sweeps impossible.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_upload_mb == 0 {
            return Err(Error::ConfigInvalid {
                field: "limits.max_upload_mb".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.limits.max_files_per_upload == 0 {
            return Err(Error::ConfigInvalid {
                field: "limits.max_files_per_upload".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(Error::ConfigInvalid {
                field: "retention.sweep_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.default_output_name.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                field: "default_output_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
