use serde_yaml::{Mapping, Value};

use crate::error::{AgentError, Result};
use crate::models::{ComposeDocument, LabelSet};

/// Label marking the one service in a project that receives external traffic.
pub const ENABLE_LABEL: &str = "traefik.enable=true";

/// The externally-managed network the reverse proxy reaches services on.
/// Every exposed service must join it and nothing else.
pub const RESERVED_NETWORK: &str = "traefik-public";

/// Routing labels for a subdomain: the enable marker, the router rule, then
/// any per-project extras, in that order.
pub fn routing_labels(domain: &str, subdomain: &str, extra: &[String]) -> Vec<String> {
    let mut labels = vec![
        ENABLE_LABEL.to_string(),
        format!("traefik.http.routers.{subdomain}.rule=Host(`{subdomain}.{domain}`)"),
    ];
    labels.extend(extra.iter().cloned());
    labels
}

/// Merge `labels` into the single exposed service and enforce the network
/// invariants. Returns the exposed service's name.
///
/// Exactly one service must already carry the enable marker; zero or several
/// is terminal. The exposed service may declare no networks (it is then put
/// on the reserved network) or exactly the reserved network. The document's
/// top-level `networks` section is rewritten to declare the reserved network
/// as external; any other top-level network declaration is refused.
pub fn merge_routing(doc: &mut ComposeDocument, labels: &[String]) -> Result<String> {
    let exposed = find_exposed_service(doc)?;

    let service = doc
        .services_mut()
        .get_mut(exposed.as_str())
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| {
            AgentError::MalformedCompose(format!("service '{exposed}' must be a mapping"))
        })?;

    let mut merged = label_set(&exposed, service)?;
    merged.merge(labels.iter().map(String::as_str));
    service.insert(Value::from("labels"), merged.to_value());

    enforce_service_network(&exposed, service)?;
    enforce_document_networks(doc)?;

    Ok(exposed)
}

fn find_exposed_service(doc: &ComposeDocument) -> Result<String> {
    let mut exposed = Vec::new();
    for (name, service) in doc.services() {
        let name = name.as_str().unwrap_or("<non-string>").to_string();
        let service = service.as_mapping().ok_or_else(|| {
            AgentError::MalformedCompose(format!("service '{name}' must be a mapping"))
        })?;
        if label_set(&name, service)?.contains(ENABLE_LABEL) {
            exposed.push(name);
        }
    }
    match exposed.len() {
        0 => Err(AgentError::NoExposedService),
        1 => Ok(exposed.remove(0)),
        _ => Err(AgentError::MultipleExposedServices(exposed)),
    }
}

fn label_set(service_name: &str, service: &Mapping) -> Result<LabelSet> {
    LabelSet::from_value(service.get("labels")).map_err(|reason| AgentError::InvalidLabel {
        service: service_name.to_string(),
        reason: reason.to_string(),
    })
}

fn enforce_service_network(service_name: &str, service: &mut Mapping) -> Result<()> {
    match service.get("networks") {
        None => {
            service.insert(
                Value::from("networks"),
                Value::Sequence(vec![Value::from(RESERVED_NETWORK)]),
            );
            Ok(())
        }
        Some(Value::Sequence(networks)) => {
            let is_reserved_only =
                networks.len() == 1 && networks[0].as_str() == Some(RESERVED_NETWORK);
            if is_reserved_only {
                Ok(())
            } else {
                Err(AgentError::CustomNetwork(format!(
                    "service '{service_name}' must join only the '{RESERVED_NETWORK}' network"
                )))
            }
        }
        Some(_) => Err(AgentError::CustomNetwork(format!(
            "service '{service_name}': networks must be a list"
        ))),
    }
}

fn enforce_document_networks(doc: &mut ComposeDocument) -> Result<()> {
    if let Some(networks) = doc.networks() {
        let networks = networks.as_mapping().ok_or_else(|| {
            AgentError::MalformedCompose("networks section must be a mapping".to_string())
        })?;
        for (name, _) in networks {
            if name.as_str() != Some(RESERVED_NETWORK) {
                return Err(AgentError::CustomNetwork(format!(
                    "top-level network '{}' is not allowed",
                    name.as_str().unwrap_or("<non-string>")
                )));
            }
        }
    }

    let mut external = Mapping::new();
    external.insert(Value::from("external"), Value::from(true));
    let mut networks = Mapping::new();
    networks.insert(Value::from(RESERVED_NETWORK), Value::Mapping(external));
    doc.set_networks(Value::Mapping(networks));
    Ok(())
}
