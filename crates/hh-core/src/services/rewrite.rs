use serde_yaml::Value;

use crate::error::{AgentError, Result};
use crate::models::{ComposeDocument, PortMapping};

use super::ledger::LedgerGuard;

/// Rewrite every port mapping in the document to a freshly allocated host
/// port, walking services and entries in source order so repeated runs stay
/// diffable. Container-side ports and bind addresses are never changed.
///
/// The first unsupported entry aborts the whole walk. Nothing has touched
/// disk at that point: the document is in memory and the ledger guard's
/// allocations die with it.
pub fn rewrite_ports(doc: &mut ComposeDocument, ledger: &mut LedgerGuard<'_>) -> Result<()> {
    for (name, service) in doc.services_mut() {
        let service_name = name.as_str().unwrap_or("<non-string>").to_string();
        let service = service.as_mapping_mut().ok_or_else(|| {
            AgentError::MalformedCompose(format!("service '{service_name}' must be a mapping"))
        })?;

        let ports = match service.get_mut("ports") {
            Some(ports) => ports,
            None => continue,
        };
        let entries = match ports {
            Value::Sequence(entries) => entries,
            _ => {
                return Err(AgentError::MalformedCompose(format!(
                    "service '{service_name}': ports must be a sequence"
                )))
            }
        };

        for entry in entries.iter_mut() {
            let mapping = PortMapping::parse(entry).map_err(|reason| {
                AgentError::UnsupportedPortMapping {
                    service: service_name.clone(),
                    entry: display_entry(entry),
                    reason: reason.to_string(),
                }
            })?;
            let host_port = ledger.allocate_next()?;
            *entry = mapping.rewritten(host_port);
        }
    }
    Ok(())
}

fn display_entry(entry: &Value) -> String {
    serde_yaml::to_string(entry)
        .unwrap_or_default()
        .trim()
        .to_string()
}
