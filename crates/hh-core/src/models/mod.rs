pub mod compose;
pub mod config;
pub mod labels;
pub mod port_mapping;
pub mod service;

pub use compose::ComposeDocument;
pub use config::AgentConfig;
pub use labels::LabelSet;
pub use port_mapping::PortMapping;
pub use service::DeployedService;
