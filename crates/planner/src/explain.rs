use fedq_connector::ConnectorHandle;

use crate::logical_plan::{Expr, PlanNode};

/// Render a plan tree as human-readable multiline text.
pub fn explain_plan(plan: &PlanNode) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &PlanNode, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match plan {
        PlanNode::Scan(scan) => {
            match &scan.table.handle {
                ConnectorHandle::Remote(handle) => {
                    out.push_str(&format!(
                        "{pad}Scan remote {}.{} connector={}\n",
                        handle.schema_name, handle.table_name, scan.table.connector_id
                    ));
                    match &handle.generated_query {
                        Some(q) => out.push_str(&format!(
                            "{pad}  query={} short={}\n",
                            q.query, q.is_query_short
                        )),
                        None => out.push_str(&format!("{pad}  query=none\n")),
                    }
                }
                ConnectorHandle::Local(handle) => {
                    out.push_str(&format!(
                        "{pad}Scan local {} format={}\n",
                        handle.table_name, handle.format
                    ));
                }
            }
            let outputs: Vec<&str> = scan
                .output_variables
                .iter()
                .map(|v| v.name.as_str())
                .collect();
            out.push_str(&format!("{pad}  outputs={outputs:?}\n"));
        }
        PlanNode::Filter(filter) => {
            out.push_str(&format!("{pad}Filter {}\n", fmt_expr(&filter.predicate)));
            fmt_plan(&filter.input, indent + 1, out);
        }
        PlanNode::Other(other) => {
            out.push_str(&format!("{pad}{}\n", other.operator));
            for child in &other.children {
                fmt_plan(child, indent + 1, out);
            }
        }
    }
}

fn fmt_expr(e: &Expr) -> String {
    match e {
        Expr::Column(c) => c.clone(),
        Expr::Literal(v) => format!("{v:?}"),
        Expr::Not(x) => format!("NOT ({})", fmt_expr(x)),
        Expr::And(a, b) => format!("({}) AND ({})", fmt_expr(a), fmt_expr(b)),
        Expr::Or(a, b) => format!("({}) OR ({})", fmt_expr(a), fmt_expr(b)),
        Expr::BinaryOp { left, op, right } => {
            format!("({}) {:?} ({})", fmt_expr(left), op, fmt_expr(right))
        }
    }
}
