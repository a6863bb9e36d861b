use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remote-expressible form of one predicate conjunct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteExpr {
    /// Serialized clause in the remote source's filter syntax.
    pub expression: String,
}

/// Verdict for a conjunct the remote source cannot evaluate.
///
/// This is ordinary control flow for the pushdown rewrite, not a
/// [`fedq_common::FedqError`]: the rewrite routes the conjunct to the
/// locally retained side and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("not remote-expressible: {reason}")]
pub struct ClassificationError {
    pub reason: String,
}

/// Where a resolved column selection originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionOrigin {
    /// Direct column of the remote table.
    TableColumn,
    /// Synthesized expression without a direct remote column.
    Derived,
}

/// Resolved selection for one plan variable during classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub expression: String,
    pub origin: SelectionOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_error_displays_reason() {
        let err = ClassificationError {
            reason: "LIKE has no remote form".to_string(),
        };
        assert_eq!(err.to_string(), "not remote-expressible: LIKE has no remote form");
    }
}
