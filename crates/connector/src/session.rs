use std::collections::HashMap;

use fedq_common::{ConnectorConfig, FedqError, QueryId, Result};
use serde::{Deserialize, Serialize};

/// Row cap injected into generated remote queries.
pub const PROP_ROW_LIMIT: &str = "pushdown.row_limit";
/// Largest injected row cap still routed to the remote source's short path.
pub const PROP_SHORT_QUERY_ROW_LIMIT: &str = "pushdown.short_query_row_limit";

/// Per-query session handed to remote query generation.
///
/// Carries the query id for logs and metrics plus free-form string
/// properties with typed accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    query_id: QueryId,
    #[serde(default)]
    properties: HashMap<String, String>,
}

impl Session {
    pub fn new(query_id: QueryId) -> Self {
        Self {
            query_id,
            properties: HashMap::new(),
        }
    }

    /// Session seeded with the connector config's tunables.
    pub fn from_config(query_id: QueryId, config: &ConnectorConfig) -> Self {
        let mut session = Self::new(query_id);
        session.set_property(
            PROP_SHORT_QUERY_ROW_LIMIT,
            &config.short_query_row_limit.to_string(),
        );
        session
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Numeric property lookup, falling back to `default` when unset.
    pub fn u64_property(&self, name: &str, default: u64) -> Result<u64> {
        match self.properties.get(name) {
            Some(v) => v.parse().map_err(|_| {
                FedqError::InvalidConfig(format!(
                    "session property {name} must be a non-negative integer, got '{v}'"
                ))
            }),
            None => Ok(default),
        }
    }
}
