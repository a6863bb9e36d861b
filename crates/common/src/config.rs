use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{FedqError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub connector_id: String,
    pub default_schema: String,
    pub short_query_row_limit: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connector_id: "remote".to_string(),
            default_schema: "default".to_string(),
            short_query_row_limit: 50_000,
        }
    }
}

impl ConnectorConfig {
    pub fn load_from_json(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        serde_json::from_str(&s).map_err(|e| FedqError::InvalidConfig(e.to_string()))
    }
}
