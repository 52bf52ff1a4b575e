use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::ComposeDocument;

use super::ledger::PortLedger;
use super::{rewrite, routing};

/// Rewrites a project's compose descriptor for deployment: every port
/// mapping gets a fresh host port and the exposed service gets the routing
/// labels and reserved network injected.
pub struct ComposeMutator {
    ledger: Arc<PortLedger>,
}

impl ComposeMutator {
    pub fn new(ledger: Arc<PortLedger>) -> Self {
        Self { ledger }
    }

    /// Run the full rewrite for one project directory. The ledger lock is
    /// held across the whole read-allocate-write sequence so concurrent
    /// deploys cannot interleave allocations, and so the descriptor and
    /// ledger files always agree on which ports were committed.
    ///
    /// Any failure before the commit leaves both files untouched. The ledger
    /// is committed before the descriptor: a crash between the two writes
    /// burns the allocated ports but can never hand them out twice.
    pub fn mutate(&self, project_dir: &Path, labels: &[String]) -> Result<()> {
        let mut guard = self.ledger.lock()?;
        let mut doc = ComposeDocument::load(project_dir)?;

        rewrite::rewrite_ports(&mut doc, &mut guard)?;
        let exposed = routing::merge_routing(&mut doc, labels)?;

        let last_port = guard.last_port();
        guard.commit()?;
        doc.save(project_dir)?;

        tracing::info!(
            project = %project_dir.display(),
            exposed_service = %exposed,
            last_port,
            "compose descriptor rewritten"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn setup(compose: &str, last_port: u16) -> (tempfile::TempDir, ComposeMutator) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("docker-compose.yml"), compose).unwrap();
        let ledger_path = dir.path().join("last-host-port.txt");
        std::fs::write(&ledger_path, last_port.to_string()).unwrap();
        let mutator = ComposeMutator::new(Arc::new(PortLedger::new(ledger_path)));
        (dir, mutator)
    }

    const SCENARIO: &str = "\
version: '3.8'
services:
  app:
    labels:
      - traefik.enable=true
    ports:
      - \"3000\"
      - \"8000:8000\"
      - target: 22
";

    #[test]
    fn full_rewrite_scenario() {
        let (dir, mutator) = setup(SCENARIO, 1024);
        let labels = routing::routing_labels("example.com", "blog", &[]);
        mutator.mutate(dir.path(), &labels).unwrap();

        let ledger = std::fs::read_to_string(dir.path().join("last-host-port.txt")).unwrap();
        assert_eq!(ledger, "1027");

        let doc = ComposeDocument::load(dir.path()).unwrap();
        let app = doc.services().get("app").and_then(Value::as_mapping).unwrap();
        let ports = app.get("ports").and_then(Value::as_sequence).unwrap();
        assert_eq!(ports[0], Value::from("1025:3000"));
        assert_eq!(ports[1], Value::from("1026:8000"));
        assert_eq!(
            ports[2].as_mapping().unwrap().get("published"),
            Some(&Value::from(1027))
        );

        let networks = doc.networks().and_then(Value::as_mapping).unwrap();
        assert!(networks.contains_key(routing::RESERVED_NETWORK));
    }

    #[test]
    fn failure_leaves_both_files_untouched() {
        let compose = "\
services:
  app:
    labels: [traefik.enable=true]
    ports:
      - \"6060:6060/udp\"
";
        let (dir, mutator) = setup(compose, 1024);
        mutator.mutate(dir.path(), &[]).unwrap_err();

        let ledger = std::fs::read_to_string(dir.path().join("last-host-port.txt")).unwrap();
        assert_eq!(ledger, "1024");
        let descriptor = std::fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
        assert_eq!(descriptor, compose);
    }

    #[test]
    fn second_run_advances_ports_but_not_labels() {
        let (dir, mutator) = setup(SCENARIO, 1024);
        let labels = routing::routing_labels("example.com", "blog", &[]);
        mutator.mutate(dir.path(), &labels).unwrap();
        mutator.mutate(dir.path(), &labels).unwrap();

        let ledger = std::fs::read_to_string(dir.path().join("last-host-port.txt")).unwrap();
        assert_eq!(ledger, "1030", "three more entries allocated on rerun");

        let doc = ComposeDocument::load(dir.path()).unwrap();
        let app = doc.services().get("app").and_then(Value::as_mapping).unwrap();
        let merged_labels = app.get("labels").and_then(Value::as_sequence).unwrap();
        assert_eq!(merged_labels.len(), 2, "labels must not accumulate");
        let ports = app.get("ports").and_then(Value::as_sequence).unwrap();
        assert_eq!(ports[0], Value::from("1028:3000"));
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("last-host-port.txt");
        let mutator = ComposeMutator::new(Arc::new(PortLedger::new(ledger_path)));
        assert!(mutator.mutate(dir.path(), &[]).is_err());
    }
}
