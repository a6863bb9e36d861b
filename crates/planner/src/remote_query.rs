//! Reference remote query generation for sources speaking the JSON query
//! format: a whole-subtree generator plus the matching per-conjunct
//! classifier.

use std::collections::HashSet;

use fedq_common::{FedqError, Result};
use fedq_connector::{
    ClassificationError, ColumnSelection, GeneratedQuery, RemoteExpr, SelectionOrigin, Session,
    PROP_ROW_LIMIT, PROP_SHORT_QUERY_ROW_LIMIT,
};

use crate::logical_plan::{BinaryOp, Expr, LiteralValue, PlanNode, ScanNode};
use crate::optimizer::{
    remote_table_handle, split_conjuncts, PredicateClassifier, RemoteQueryGenerator,
    RemoteQueryResult,
};

const DEFAULT_ROW_LIMIT: u64 = 50_000;

/// Native query document sent to the remote source.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemoteQuerySpec {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub filter: Vec<RemoteFilterClause>,
    pub limit: u64,
}

/// One filter clause in the native query document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemoteFilterClause {
    pub column: String,
    pub op: String,
    pub value: serde_json::Value,
}

/// Classifies conjuncts of the `column <op> literal` family.
///
/// LIKE, OR, NOT, arithmetic, and non-literal operands have no remote form
/// and classify as failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFilterClassifier;

impl PredicateClassifier for JsonFilterClassifier {
    fn classify(
        &self,
        conjunct: &Expr,
        resolver: &dyn Fn(&str) -> ColumnSelection,
    ) -> std::result::Result<RemoteExpr, ClassificationError> {
        let clause = translate_conjunct(conjunct, resolver)?;
        let expression = serde_json::to_string(&clause).map_err(|e| ClassificationError {
            reason: format!("filter clause encode failed: {e}"),
        })?;
        Ok(RemoteExpr { expression })
    }
}

/// Translates a remote scan, optionally under stacked filters whose every
/// conjunct has a remote form, into one [`RemoteQuerySpec`] document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonQueryGenerator;

impl RemoteQueryGenerator for JsonQueryGenerator {
    fn generate(&self, plan: &PlanNode, session: &Session) -> Option<RemoteQueryResult> {
        match build_query(plan, session) {
            Ok(result) => result,
            Err(_) => None,
        }
    }
}

fn build_query(plan: &PlanNode, session: &Session) -> Result<Option<RemoteQueryResult>> {
    let mut conjuncts = Vec::new();
    let mut current = plan;
    let scan = loop {
        match current {
            PlanNode::Filter(filter) => {
                conjuncts.extend(split_conjuncts(filter.predicate.clone()));
                current = filter.input.as_ref();
            }
            PlanNode::Scan(scan) => break scan,
            PlanNode::Other(_) => return Ok(None),
        }
    };
    let Some(handle) = remote_table_handle(scan) else {
        return Ok(None);
    };
    if handle.generated_query.is_some() {
        // already carries a query from an earlier rewrite
        return Ok(None);
    }

    let known: HashSet<&str> = scan
        .assignments
        .iter()
        .map(|(variable, _)| variable.name.as_str())
        .collect();
    let resolver = scan_resolver(scan);
    let mut filter = Vec::with_capacity(conjuncts.len());
    for conjunct in &conjuncts {
        let mut columns = HashSet::new();
        collect_columns(conjunct, &mut columns);
        if !columns.iter().all(|c| known.contains(c.as_str())) {
            return Ok(None);
        }
        match translate_conjunct(conjunct, &resolver) {
            Ok(clause) => filter.push(clause),
            Err(_) => return Ok(None),
        }
    }

    let row_limit = session.u64_property(PROP_ROW_LIMIT, DEFAULT_ROW_LIMIT)?;
    let short_limit = session.u64_property(PROP_SHORT_QUERY_ROW_LIMIT, DEFAULT_ROW_LIMIT)?;
    let spec = RemoteQuerySpec {
        schema: handle.schema_name.clone(),
        table: handle.table_name.clone(),
        columns: scan
            .assignments
            .iter()
            .map(|(_, column)| column.column_name.clone())
            .collect(),
        filter,
        limit: row_limit,
    };
    let encoded = serde_json::to_string(&spec)
        .map_err(|e| FedqError::Planning(format!("remote query encode failed: {e}")))?;
    Ok(Some(RemoteQueryResult {
        query: GeneratedQuery {
            query: encoded,
            is_query_short: row_limit <= short_limit,
        },
        assignments: scan.assignments.clone(),
    }))
}

fn scan_resolver(scan: &ScanNode) -> impl Fn(&str) -> ColumnSelection + '_ {
    move |name: &str| {
        for (variable, column) in &scan.assignments {
            if variable.name == name {
                return ColumnSelection {
                    expression: column.column_name.clone(),
                    origin: SelectionOrigin::TableColumn,
                };
            }
        }
        ColumnSelection {
            expression: name.to_string(),
            origin: SelectionOrigin::Derived,
        }
    }
}

fn translate_conjunct(
    conjunct: &Expr,
    resolver: &dyn Fn(&str) -> ColumnSelection,
) -> std::result::Result<RemoteFilterClause, ClassificationError> {
    let Expr::BinaryOp { left, op, right } = conjunct else {
        return Err(ClassificationError {
            reason: "only `column <op> literal` comparisons have a remote form".to_string(),
        });
    };
    let Some(op_text) = comparison_op_text(*op) else {
        return Err(ClassificationError {
            reason: format!("operator {op:?} has no remote form"),
        });
    };
    if let (Some(column), Some(value)) = (filter_column(left, resolver), filter_literal(right)) {
        return Ok(RemoteFilterClause {
            column,
            op: op_text.to_string(),
            value,
        });
    }
    // literal-first operand order is only sound for symmetric comparisons
    if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
        if let (Some(column), Some(value)) = (filter_column(right, resolver), filter_literal(left))
        {
            return Ok(RemoteFilterClause {
                column,
                op: op_text.to_string(),
                value,
            });
        }
    }
    Err(ClassificationError {
        reason: "expected `column <op> literal` operands".to_string(),
    })
}

fn comparison_op_text(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Eq => Some("="),
        BinaryOp::NotEq => Some("!="),
        BinaryOp::Lt => Some("<"),
        BinaryOp::LtEq => Some("<="),
        BinaryOp::Gt => Some(">"),
        BinaryOp::GtEq => Some(">="),
        BinaryOp::Plus
        | BinaryOp::Minus
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Like => None,
    }
}

fn filter_column(e: &Expr, resolver: &dyn Fn(&str) -> ColumnSelection) -> Option<String> {
    match e {
        Expr::Column(c) => Some(resolver(c).expression),
        _ => None,
    }
}

fn filter_literal(e: &Expr) -> Option<serde_json::Value> {
    match e {
        Expr::Literal(LiteralValue::Int64(v)) => Some(serde_json::Value::from(*v)),
        Expr::Literal(LiteralValue::Float64(v)) => Some(serde_json::Value::from(*v)),
        Expr::Literal(LiteralValue::Utf8(v)) => Some(serde_json::Value::from(v.clone())),
        Expr::Literal(LiteralValue::Boolean(v)) => Some(serde_json::Value::from(*v)),
        _ => None,
    }
}

fn collect_columns(e: &Expr, out: &mut HashSet<String>) {
    match e {
        Expr::Column(c) => {
            out.insert(c.clone());
        }
        Expr::Literal(_) => {}
        Expr::BinaryOp { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_columns(a, out);
            collect_columns(b, out);
        }
        Expr::Not(inner) => collect_columns(inner, out),
    }
}
