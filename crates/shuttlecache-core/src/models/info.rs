use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Deployment information reported by `getApiInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
