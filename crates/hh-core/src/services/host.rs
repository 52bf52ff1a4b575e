use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::models::{AgentConfig, ComposeDocument, DeployedService};
use crate::services::{docker, git, routing};

use super::ledger::PortLedger;
use super::mutator::ComposeMutator;

/// The agent's service-lifecycle surface: one instance per process, owning
/// the port ledger and the compose mutator built from it.
pub struct HostAgent {
    config: AgentConfig,
    ledger: Arc<PortLedger>,
    mutator: ComposeMutator,
}

impl HostAgent {
    pub fn new(config: AgentConfig) -> Self {
        let ledger = Arc::new(PortLedger::new(config.ledger_file.clone()));
        let mutator = ComposeMutator::new(ledger.clone());
        Self {
            config,
            ledger,
            mutator,
        }
    }

    /// Every project directory under the projects root, paired with the HEAD
    /// commit of its checkout.
    pub async fn list_services(&self) -> Result<Vec<DeployedService>> {
        let mut services = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.config.projects_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let subdomain = entry.file_name().to_string_lossy().to_string();
            let last_commit = git::head_commit(&entry.path()).await?;
            services.push(DeployedService {
                subdomain,
                last_commit,
            });
        }
        services.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
        Ok(services)
    }

    /// Fresh shallow clone of a project's repository into its subdomain
    /// directory, replacing any previous checkout. The clone must carry a
    /// descriptor at its root or it cannot be deployed.
    pub async fn clone_service(&self, repo_url: &str, subdomain: &str) -> Result<()> {
        validate_subdomain(subdomain)?;
        let project_dir = self.config.project_path(subdomain);
        git::clone_shallow(repo_url, &project_dir).await?;
        if !ComposeDocument::path(&project_dir).exists() {
            return Err(AgentError::ComposeFileMissing(repo_url.to_string()));
        }
        Ok(())
    }

    /// Bring a project up fresh: down, build, rewrite the descriptor (ports
    /// plus routing labels for `subdomain.domain`), up.
    pub async fn rebuild_service(
        &self,
        domain: &str,
        subdomain: &str,
        extra_labels: &[String],
    ) -> Result<()> {
        validate_subdomain(subdomain)?;
        let project_dir = self.config.project_path(subdomain);
        if !project_dir.exists() {
            return Err(AgentError::ProjectNotFound(project_dir));
        }

        // `down` fails when the project was never up; only treat it as fatal
        // when `ps` also fails, meaning compose itself is broken here.
        if let Err(down_err) = docker::down(&project_dir).await {
            if let Err(ps_err) = docker::ps(&project_dir).await {
                return Err(AgentError::Compose(format!(
                    "down failed ({down_err}); ps also failed ({ps_err})"
                )));
            }
            tracing::warn!(subdomain, %down_err, "compose down failed for project that was not up");
        }

        docker::build(&project_dir).await?;

        let labels = routing::routing_labels(domain, subdomain, extra_labels);
        self.mutator.mutate(&project_dir, &labels)?;

        docker::up_detached(&project_dir).await?;
        Ok(())
    }

    /// Take a project down and delete its checkout. Ports it held are never
    /// reissued; the ledger only moves forward.
    pub async fn remove_service(&self, subdomain: &str) -> Result<()> {
        validate_subdomain(subdomain)?;
        let project_dir = self.config.project_path(subdomain);
        if !project_dir.exists() {
            return Err(AgentError::ProjectNotFound(project_dir));
        }
        docker::down(&project_dir).await?;
        tokio::fs::remove_dir_all(&project_dir).await?;
        Ok(())
    }

    /// Restore the ledger to its floor. Full-fleet rebuilds call this before
    /// their first allocation to remap the whole port space from scratch.
    pub fn reset_ledger(&self) -> Result<()> {
        self.ledger.reset()
    }
}

/// Subdomains become path components under the projects root and label
/// values in the descriptor; restrict them to DNS-label characters.
fn validate_subdomain(subdomain: &str) -> Result<()> {
    let valid = !subdomain.is_empty()
        && subdomain.len() <= 63
        && subdomain
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(AgentError::InvalidSubdomain(subdomain.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_in(dir: &tempfile::TempDir) -> HostAgent {
        HostAgent::new(AgentConfig {
            projects_dir: dir.path().join("projects"),
            ledger_file: dir.path().join("last-host-port.txt"),
        })
    }

    #[test]
    fn subdomain_validation() {
        assert!(validate_subdomain("blog").is_ok());
        assert!(validate_subdomain("my-app-2").is_ok());
        assert!(validate_subdomain("").is_err());
        assert!(validate_subdomain("-leading").is_err());
        assert!(validate_subdomain("trailing-").is_err());
        assert!(validate_subdomain("UPPER").is_err());
        assert!(validate_subdomain("../escape").is_err());
        assert!(validate_subdomain("dots.not.allowed").is_err());
    }

    #[tokio::test]
    async fn list_services_on_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_in(&dir);
        std::fs::create_dir_all(dir.path().join("projects")).unwrap();
        assert!(agent.list_services().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rebuild_missing_project_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_in(&dir);
        std::fs::create_dir_all(dir.path().join("projects")).unwrap();
        assert!(matches!(
            agent.rebuild_service("example.com", "ghost", &[]).await,
            Err(AgentError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_missing_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_in(&dir);
        std::fs::create_dir_all(dir.path().join("projects")).unwrap();
        assert!(matches!(
            agent.remove_service("ghost").await,
            Err(AgentError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn reset_ledger_writes_floor() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_in(&dir);
        agent.reset_ledger().unwrap();
        let persisted = std::fs::read_to_string(dir.path().join("last-host-port.txt")).unwrap();
        assert_eq!(persisted, "1024");
    }
}
