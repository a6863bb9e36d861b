use arrow_schema::DataType;
use serde::{Deserialize, Serialize};

/// Native query produced for the remote source, plus its routing hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    /// Serialized query text in the remote source's native format.
    pub query: String,
    /// True when the remote source can answer on its low-latency path.
    pub is_query_short: bool,
}

/// Column reference on the underlying source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHandle {
    pub column_name: String,
    pub data_type: DataType,
}

/// Table reference on the remote source.
///
/// `generated_query` and `is_query_short` start out empty; the pushdown
/// rewrite installs them when a plan subtree collapses into one remote query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTableHandle {
    pub connector_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub is_query_short: Option<bool>,
    pub generated_query: Option<GeneratedQuery>,
}

impl RemoteTableHandle {
    pub fn new(connector_id: &str, schema_name: &str, table_name: &str) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            is_query_short: None,
            generated_query: None,
        }
    }

    /// Copy of this handle with `query` installed.
    pub fn with_generated_query(&self, query: GeneratedQuery) -> Self {
        Self {
            connector_id: self.connector_id.clone(),
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            is_query_short: Some(query.is_query_short),
            generated_query: Some(query),
        }
    }
}

/// Locally resolved table reference for non-remote sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTableHandle {
    pub table_name: String,
    pub uri: String,
    pub format: String,
}

/// Connector-specific payload behind a table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectorHandle {
    Remote(RemoteTableHandle),
    Local(LocalTableHandle),
}

/// Table reference carried by scan nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHandle {
    pub connector_id: String,
    pub handle: ConnectorHandle,
}

impl TableHandle {
    pub fn remote(handle: RemoteTableHandle) -> Self {
        Self {
            connector_id: handle.connector_id.clone(),
            handle: ConnectorHandle::Remote(handle),
        }
    }

    pub fn local(connector_id: &str, handle: LocalTableHandle) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            handle: ConnectorHandle::Local(handle),
        }
    }

    /// Remote descriptor, when this reference points at the remote source.
    pub fn remote_handle(&self) -> Option<&RemoteTableHandle> {
        match &self.handle {
            ConnectorHandle::Remote(h) => Some(h),
            ConnectorHandle::Local(_) => None,
        }
    }
}
