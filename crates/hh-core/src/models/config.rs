use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AgentError, Result};

/// Host-level agent configuration. Defaults match the paths the agent has
/// always used on the host image; a YAML config file can override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Directory holding one cloned project per subdomain.
    pub projects_dir: PathBuf,
    /// File persisting the highest host port allocated so far.
    pub ledger_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from("/mnt/data/projects"),
            ledger_file: PathBuf::from("/mnt/data/last-host-port.txt"),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgentError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_yaml::from_str(&contents)
            .map_err(|e| AgentError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    pub fn project_path(&self, subdomain: &str) -> PathBuf {
        self.projects_dir.join(subdomain)
    }
}
