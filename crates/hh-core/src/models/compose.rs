use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{AgentError, Result};

pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// A parsed `docker-compose.yml`, split into the sections the agent touches
/// plus verbatim pass-through for everything it does not understand.
///
/// Re-serialization emits top-level keys in the fixed order `version`,
/// `services`, `networks` (absent sections omitted), then the pass-through
/// keys in their original relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeDocument {
    version: Option<Value>,
    services: Mapping,
    networks: Option<Value>,
    extra: Vec<(Value, Value)>,
}

impl ComposeDocument {
    pub fn parse(contents: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(contents)?;
        let root = match root {
            Value::Mapping(m) => m,
            _ => {
                return Err(AgentError::MalformedCompose(
                    "top level must be a mapping".to_string(),
                ))
            }
        };

        let mut version = None;
        let mut services = None;
        let mut networks = None;
        let mut extra = Vec::new();

        for (key, value) in root {
            match key.as_str() {
                Some("version") => version = Some(value),
                Some("services") => match value {
                    Value::Mapping(m) => services = Some(m),
                    _ => {
                        return Err(AgentError::MalformedCompose(
                            "services section must be a mapping".to_string(),
                        ))
                    }
                },
                Some("networks") => networks = Some(value),
                _ => extra.push((key, value)),
            }
        }

        let services = services.ok_or_else(|| {
            AgentError::MalformedCompose("missing services section".to_string())
        })?;

        Ok(Self {
            version,
            services,
            networks,
            extra,
        })
    }

    pub fn load(project_dir: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(Self::path(project_dir))?;
        Self::parse(&contents)
    }

    /// Write the descriptor back. The temp-file rename keeps the on-disk
    /// descriptor whole if the process dies mid-write.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = Self::path(project_dir);
        let tmp = path.with_extension("yml.tmp");
        std::fs::write(&tmp, self.to_yaml()?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(COMPOSE_FILENAME)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let mut out = Mapping::new();
        if let Some(version) = &self.version {
            out.insert(Value::from("version"), version.clone());
        }
        out.insert(
            Value::from("services"),
            Value::Mapping(self.services.clone()),
        );
        if let Some(networks) = &self.networks {
            out.insert(Value::from("networks"), networks.clone());
        }
        for (key, value) in &self.extra {
            out.insert(key.clone(), value.clone());
        }
        Ok(serde_yaml::to_string(&out)?)
    }

    pub fn services(&self) -> &Mapping {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Mapping {
        &mut self.services
    }

    pub fn networks(&self) -> Option<&Value> {
        self.networks.as_ref()
    }

    pub fn set_networks(&mut self, networks: Value) {
        self.networks = Some(networks);
    }
}
