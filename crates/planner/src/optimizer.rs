use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use fedq_common::metrics::global_metrics;
use fedq_common::{FedqError, PlanNodeId, Result};
use fedq_connector::{
    ClassificationError, ColumnHandle, ColumnSelection, GeneratedQuery, RemoteExpr,
    RemoteTableHandle, SelectionOrigin, Session, TableHandle,
};
use tracing::debug;

use crate::logical_plan::{
    Constraint, Expr, FilterNode, LiteralValue, OtherNode, PlanNode, PlanNodeIdAllocator, ScanNode,
    Variable,
};

/// Configuration knobs for the pushdown rewrite.
#[derive(Debug, Clone, Copy)]
pub struct PushdownConfig {
    /// Disable to return plans unchanged.
    pub enabled: bool,
    /// Disable to skip conjunct splitting; whole-subtree attempts still run.
    pub filter_split_enabled: bool,
}

impl Default for PushdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_split_enabled: true,
        }
    }
}

/// Successful whole-subtree translation produced by a generator.
#[derive(Debug, Clone)]
pub struct RemoteQueryResult {
    /// Native query that replaces the translated subtree.
    pub query: GeneratedQuery,
    /// Output variable to column assignments, in the generator's output
    /// order; keys are unique.
    pub assignments: Vec<(Variable, ColumnHandle)>,
}

/// Translates whole plan subtrees into native remote queries.
pub trait RemoteQueryGenerator: Send + Sync {
    /// All-or-nothing translation of the subtree rooted at `plan`.
    ///
    /// `None` declines the subtree and is ordinary control flow; there is no
    /// partial success.
    fn generate(&self, plan: &PlanNode, session: &Session) -> Option<RemoteQueryResult>;
}

/// Tests single conjuncts for remote expressibility.
pub trait PredicateClassifier: Send + Sync {
    /// Translate one conjunct into the remote source's filter syntax.
    ///
    /// `resolver` maps a column name to its selection; the rewrite passes a
    /// resolver that synthesizes a derived selection for every name.
    fn classify(
        &self,
        conjunct: &Expr,
        resolver: &dyn Fn(&str) -> ColumnSelection,
    ) -> std::result::Result<RemoteExpr, ClassificationError>;
}

/// Collapses remote-source subtrees into single scans carrying generated
/// native queries.
///
/// The rewrite never changes plan semantics: a declined subtree is left
/// exactly as it was, and conjuncts the remote source cannot evaluate stay in
/// local filters above the scan.
pub struct PushdownOptimizer {
    generator: Arc<dyn RemoteQueryGenerator>,
    classifier: Arc<dyn PredicateClassifier>,
}

impl std::fmt::Debug for PushdownOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushdownOptimizer").finish()
    }
}

impl PushdownOptimizer {
    pub fn new(
        generator: Arc<dyn RemoteQueryGenerator>,
        classifier: Arc<dyn PredicateClassifier>,
    ) -> Self {
        Self {
            generator,
            classifier,
        }
    }

    /// Rewrite one plan fragment.
    ///
    /// The fragment must contain exactly one scan, and that scan must
    /// reference the remote source; anything else is a caller bug reported as
    /// [`FedqError::Internal`]. Walking the tree:
    /// 1. each filter predicate is split once by per-conjunct classification
    /// 2. every node's whole subtree is offered to the generator
    /// 3. declined subtrees recurse into children and reassemble, preserving
    ///    untouched nodes exactly
    pub fn optimize(
        &self,
        plan: PlanNode,
        session: &Session,
        config: PushdownConfig,
        ids: &mut PlanNodeIdAllocator,
    ) -> Result<PlanNode> {
        if !config.enabled {
            return Ok(plan);
        }
        let started = Instant::now();
        let query_id = session.query_id().to_string();

        let scans = collect_scan_nodes(&plan);
        let anchor = only_remote_scan(&scans).ok_or_else(|| {
            FedqError::Internal(format!(
                "expected exactly one remote-source scan in the fragment, found {} candidate scans",
                scans.len()
            ))
        })?;
        let mut visitor = PushdownVisitor::new(
            anchor,
            self.generator.as_ref(),
            self.classifier.as_ref(),
            session,
            config,
            ids,
        )?;

        global_metrics().set_plan_nodes(&query_id, "before", count_nodes(&plan));
        let optimized = visitor.dispatch(plan);
        global_metrics().set_plan_nodes(&query_id, "after", count_nodes(&optimized));
        global_metrics().record_optimize_time(&query_id, started.elapsed().as_secs_f64());
        debug!(
            query_id = %query_id,
            operator = "PushdownOptimizer",
            "fragment rewrite finished"
        );
        Ok(optimized)
    }
}

// -----------------------------
// 1) Scan location
// -----------------------------

/// Every scan node in `plan`, in depth-first order.
pub fn collect_scan_nodes(plan: &PlanNode) -> Vec<&ScanNode> {
    let mut scans = Vec::new();
    collect_scans(plan, &mut scans);
    scans
}

fn collect_scans<'a>(plan: &'a PlanNode, out: &mut Vec<&'a ScanNode>) {
    if let PlanNode::Scan(scan) = plan {
        out.push(scan);
    }
    for child in plan.children() {
        collect_scans(child, out);
    }
}

/// Remote descriptor of `scan`, when it targets the remote source.
pub fn remote_table_handle(scan: &ScanNode) -> Option<&RemoteTableHandle> {
    scan.table.remote_handle()
}

fn only_remote_scan<'a>(scans: &[&'a ScanNode]) -> Option<&'a ScanNode> {
    if scans.len() != 1 {
        return None;
    }
    let scan = scans[0];
    remote_table_handle(scan).map(|_| scan)
}

fn count_nodes(plan: &PlanNode) -> u64 {
    1 + plan.children().into_iter().map(count_nodes).sum::<u64>()
}

// -----------------------------
// 2) Conjunct utilities
// -----------------------------

/// Split a predicate into its top-level AND conjuncts.
pub fn split_conjuncts(e: Expr) -> Vec<Expr> {
    match e {
        Expr::And(a, b) => {
            let mut v = split_conjuncts(*a);
            v.extend(split_conjuncts(*b));
            v
        }
        other => vec![other],
    }
}

/// Recombine conjuncts into one predicate; empty input is literal `true`.
pub fn combine_conjuncts(mut v: Vec<Expr>) -> Expr {
    if v.is_empty() {
        return Expr::Literal(LiteralValue::Boolean(true));
    }
    let first = v.remove(0);
    v.into_iter()
        .fold(first, |acc, e| Expr::And(Box::new(acc), Box::new(e)))
}

// -----------------------------
// 3) Pushdown visitor
// -----------------------------

/// Plan-walking state for one fragment rewrite.
///
/// `split_filters` keys filters by node identity so each filter node is split
/// at most once; synthesized filters are marked before the trailing
/// self-recursion, which is what makes the walk terminate.
struct PushdownVisitor<'a> {
    generator: &'a dyn RemoteQueryGenerator,
    classifier: &'a dyn PredicateClassifier,
    session: &'a Session,
    ids: &'a mut PlanNodeIdAllocator,
    query_id: String,
    filter_split_enabled: bool,
    anchor_handle: RemoteTableHandle,
    current_constraint: Constraint,
    enforced_constraint: Constraint,
    split_filters: HashSet<PlanNodeId>,
}

impl<'a> PushdownVisitor<'a> {
    fn new(
        anchor: &ScanNode,
        generator: &'a dyn RemoteQueryGenerator,
        classifier: &'a dyn PredicateClassifier,
        session: &'a Session,
        config: PushdownConfig,
        ids: &'a mut PlanNodeIdAllocator,
    ) -> Result<Self> {
        let anchor_handle = remote_table_handle(anchor)
            .ok_or_else(|| {
                FedqError::Internal("anchor scan is missing its remote table handle".to_string())
            })?
            .clone();
        Ok(Self {
            generator,
            classifier,
            session,
            ids,
            query_id: session.query_id().to_string(),
            filter_split_enabled: config.filter_split_enabled,
            anchor_handle,
            current_constraint: anchor.current_constraint.clone(),
            enforced_constraint: anchor.enforced_constraint.clone(),
            split_filters: HashSet::new(),
        })
    }

    fn dispatch(&mut self, node: PlanNode) -> PlanNode {
        match node {
            PlanNode::Filter(filter) => self.visit_filter(filter),
            other => self.visit(other),
        }
    }

    /// Generic node handling: whole-subtree attempt first, then recurse.
    ///
    /// A node whose children all come back identity-unchanged is reassembled
    /// under its original id; any changed child forces a fresh id so that id
    /// equality stays a sound identity test further up the tree.
    fn visit(&mut self, node: PlanNode) -> PlanNode {
        if let Some(replacement) = self.try_whole_subtree_pushdown(&node) {
            return replacement;
        }
        match node {
            PlanNode::Scan(scan) => PlanNode::Scan(scan),
            PlanNode::Filter(filter) => {
                let FilterNode {
                    id,
                    predicate,
                    input,
                } = filter;
                let old_child = input.id();
                let input = Box::new(self.dispatch(*input));
                let id = if input.id() == old_child {
                    id
                } else {
                    self.ids.next_id()
                };
                PlanNode::Filter(FilterNode {
                    id,
                    predicate,
                    input,
                })
            }
            PlanNode::Other(other) => {
                let OtherNode {
                    id,
                    operator,
                    children,
                } = other;
                let old_children: Vec<PlanNodeId> = children.iter().map(PlanNode::id).collect();
                let children: Vec<PlanNode> = children
                    .into_iter()
                    .map(|child| self.dispatch(child))
                    .collect();
                let unchanged = children
                    .iter()
                    .map(PlanNode::id)
                    .eq(old_children.iter().copied());
                let id = if unchanged { id } else { self.ids.next_id() };
                PlanNode::Other(OtherNode {
                    id,
                    operator,
                    children,
                })
            }
        }
    }

    /// Filter handling: split the predicate once per filter identity, stack
    /// the pushable layer below the retained layer, then re-dispatch so the
    /// synthesized stack gets its own whole-subtree attempt.
    fn visit_filter(&mut self, filter: FilterNode) -> PlanNode {
        if !self.filter_split_enabled || self.split_filters.contains(&filter.id) {
            return self.visit(PlanNode::Filter(filter));
        }
        // Mark before any rewrite so the trailing self-recursion terminates.
        self.split_filters.insert(filter.id);

        let derived = |name: &str| ColumnSelection {
            expression: name.to_string(),
            origin: SelectionOrigin::Derived,
        };
        let mut pushable = Vec::new();
        let mut non_pushable = Vec::new();
        for conjunct in split_conjuncts(filter.predicate.clone()) {
            match self.classifier.classify(&conjunct, &derived) {
                Ok(_) => pushable.push(conjunct),
                Err(_) => non_pushable.push(conjunct),
            }
        }
        debug!(
            query_id = %self.query_id,
            filter_id = %filter.id,
            pushable = pushable.len(),
            non_pushable = non_pushable.len(),
            operator = "PushdownVisitor",
            "split filter conjuncts"
        );
        global_metrics().record_filter_split(
            &self.query_id,
            pushable.len() as u64,
            non_pushable.len() as u64,
        );

        let node_to_recurse_into = if pushable.is_empty() {
            filter
        } else {
            let pushable_filter = FilterNode {
                id: self.ids.next_id(),
                predicate: combine_conjuncts(pushable),
                input: filter.input,
            };
            self.split_filters.insert(pushable_filter.id);
            if non_pushable.is_empty() {
                pushable_filter
            } else {
                let non_pushable_filter = FilterNode {
                    id: self.ids.next_id(),
                    predicate: combine_conjuncts(non_pushable),
                    input: Box::new(PlanNode::Filter(pushable_filter)),
                };
                self.split_filters.insert(non_pushable_filter.id);
                non_pushable_filter
            }
        };
        self.visit_filter(node_to_recurse_into)
    }

    /// Offer the whole subtree to the generator; on success build the
    /// replacement scan from the anchor's pristine handle and the generated
    /// query.
    fn try_whole_subtree_pushdown(&mut self, node: &PlanNode) -> Option<PlanNode> {
        let Some(result) = self.generator.generate(node, self.session) else {
            global_metrics().record_pushdown_attempt(&self.query_id, "declined");
            return None;
        };
        global_metrics().record_pushdown_attempt(&self.query_id, "accepted");
        debug!(
            query_id = %self.query_id,
            node_id = %node.id(),
            short = result.query.is_query_short,
            operator = "PushdownVisitor",
            "whole-subtree pushdown accepted"
        );
        let RemoteQueryResult { query, assignments } = result;
        let table = TableHandle::remote(self.anchor_handle.with_generated_query(query));
        let output_variables = assignments
            .iter()
            .map(|(variable, _)| variable.clone())
            .collect();
        Some(PlanNode::Scan(ScanNode {
            id: self.ids.next_id(),
            table,
            output_variables,
            assignments,
            current_constraint: self.current_constraint.clone(),
            enforced_constraint: self.enforced_constraint.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{combine_conjuncts, split_conjuncts};
    use crate::logical_plan::{BinaryOp, Expr, LiteralValue, PlanNodeIdAllocator};

    fn col_gt(name: &str, value: i64) -> Expr {
        Expr::BinaryOp {
            left: Box::new(Expr::Column(name.to_string())),
            op: BinaryOp::Gt,
            right: Box::new(Expr::Literal(LiteralValue::Int64(value))),
        }
    }

    #[test]
    fn split_flattens_nested_and_chains() {
        let e = Expr::And(
            Box::new(col_gt("a", 1)),
            Box::new(Expr::And(
                Box::new(col_gt("b", 2)),
                Box::new(col_gt("c", 3)),
            )),
        );
        let parts = split_conjuncts(e);
        assert_eq!(parts.len(), 3);
        let rendered: Vec<String> = parts.iter().map(|p| format!("{p:?}")).collect();
        assert!(rendered[0].contains("\"a\""));
        assert!(rendered[2].contains("\"c\""));
    }

    #[test]
    fn split_keeps_non_and_expressions_whole() {
        let e = Expr::Or(Box::new(col_gt("a", 1)), Box::new(col_gt("b", 2)));
        assert_eq!(split_conjuncts(e).len(), 1);
    }

    #[test]
    fn combine_of_empty_is_literal_true() {
        match combine_conjuncts(Vec::new()) {
            Expr::Literal(LiteralValue::Boolean(true)) => {}
            other => panic!("expected literal true, got {other:?}"),
        }
    }

    #[test]
    fn split_of_combine_preserves_conjunct_order() {
        let parts = vec![col_gt("a", 1), col_gt("b", 2), col_gt("c", 3)];
        let rendered: Vec<String> = parts.iter().map(|p| format!("{p:?}")).collect();
        let back = split_conjuncts(combine_conjuncts(parts));
        let back_rendered: Vec<String> = back.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(back_rendered, rendered);
    }

    #[test]
    fn id_allocator_never_reuses_ids() {
        let mut ids = PlanNodeIdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn for_plan_resumes_past_existing_ids() {
        use crate::logical_plan::{FilterNode, PlanNode};

        let mut ids = PlanNodeIdAllocator::new();
        let leaf_id = ids.next_id();
        let root_id = ids.next_id();
        let plan = PlanNode::Filter(FilterNode {
            id: root_id,
            predicate: col_gt("a", 1),
            input: Box::new(PlanNode::Filter(FilterNode {
                id: leaf_id,
                predicate: col_gt("b", 2),
                input: Box::new(PlanNode::Other(crate::logical_plan::OtherNode {
                    id: ids.next_id(),
                    operator: "Values".to_string(),
                    children: Vec::new(),
                })),
            })),
        });

        let mut resumed = PlanNodeIdAllocator::for_plan(&plan);
        let next = resumed.next_id();
        assert!(next.0 > root_id.0);
        assert!(next.0 > leaf_id.0);
    }
}
