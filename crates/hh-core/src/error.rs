use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid subdomain '{0}'")]
    InvalidSubdomain(String),

    #[error("project directory does not exist: {0}")]
    ProjectNotFound(PathBuf),

    #[error("docker-compose.yml does not exist in the root of the cloned repository {0}")]
    ComposeFileMissing(String),

    #[error("malformed docker-compose.yml: {0}")]
    MalformedCompose(String),

    #[error("service '{service}': unsupported port mapping '{entry}': {reason}")]
    UnsupportedPortMapping {
        service: String,
        entry: String,
        reason: String,
    },

    #[error("service '{service}': invalid label entry: {reason}")]
    InvalidLabel { service: String, reason: String },

    #[error("no exposed service found (expected exactly one service labeled 'traefik.enable=true')")]
    NoExposedService,

    #[error("multiple exposed services found: {}", .0.join(", "))]
    MultipleExposedServices(Vec<String>),

    #[error("custom networks are not supported: {0}")]
    CustomNetwork(String),

    #[error("port ledger error: {0}")]
    Ledger(String),

    #[error("git operation failed: {0}")]
    Git(String),

    #[error("docker compose operation failed: {0}")]
    Compose(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
