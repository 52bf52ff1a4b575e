use serde::{Deserialize, Serialize};

/// One deployed project as reported by `list-services`. Field names are the
/// wire format the deploy driver consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployedService {
    pub subdomain: String,
    pub last_commit: String,
}
