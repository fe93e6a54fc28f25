use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_PATH_VAR: &str = "MEDIATOR_VSS_CONFIG";

/// How responses that failed validation or carried a complaint are counted
/// toward a dealer's quorum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintPolicy {
    /// Only cleanly processed responses advance the counter.
    ApprovedOnly,
    /// Every processed response advances the counter.
    CountAll,
}

impl Default for ComplaintPolicy {
    fn default() -> Self {
        Self::ApprovedOnly
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VssConfig {
    pub group_signing_enabled: bool,
    pub session_timeout_secs: u64,
    pub complaint_policy: ComplaintPolicy,
    pub feed_capacity: usize,
}

impl Default for VssConfig {
    fn default() -> Self {
        Self {
            group_signing_enabled: true,
            session_timeout_secs: 120,
            complaint_policy: ComplaintPolicy::default(),
            feed_capacity: 64,
        }
    }
}

impl VssConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        log::debug!("loaded vss config from: {:?}", path.as_ref());
        Ok(config)
    }

    /// Reads the file named by `MEDIATOR_VSS_CONFIG`, or falls back to defaults.
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(&path).unwrap_or_else(|e| {
                log::warn!("could not load vss config from {}: {}", path, e);
                Self::default()
            }),
            Err(_) => {
                log::debug!("{} not set, using default vss config", CONFIG_PATH_VAR);
                Self::default()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}
