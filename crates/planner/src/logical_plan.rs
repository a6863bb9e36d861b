use arrow_schema::DataType;
use fedq_common::ids::PlanNodeId;
use fedq_connector::{ColumnHandle, TableHandle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Column(String),
    Literal(LiteralValue),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Like,
}

/// Named, typed output variable produced by a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub data_type: DataType,
}

impl Variable {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Opaque predicate summary carried through rewrites unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    All,
    Summary(String),
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::All
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanNode {
    pub id: PlanNodeId,
    pub table: TableHandle,
    /// Output variables, in output order.
    pub output_variables: Vec<Variable>,
    /// Variable-to-column assignments; keys are unique and ordered to match
    /// `output_variables`.
    pub assignments: Vec<(Variable, ColumnHandle)>,
    pub current_constraint: Constraint,
    pub enforced_constraint: Constraint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: PlanNodeId,
    pub predicate: Expr,
    pub input: Box<PlanNode>,
}

/// Operator outside the rewrite's specialized surface, traversed through the
/// generic children sequence only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherNode {
    pub id: PlanNodeId,
    pub operator: String,
    pub children: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanNode {
    Scan(ScanNode),
    Filter(FilterNode),
    Other(OtherNode),
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Scan(scan) => scan.id,
            PlanNode::Filter(filter) => filter.id,
            PlanNode::Other(other) => other.id,
        }
    }

    /// Children in order. Scans are leaves.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Scan(_) => Vec::new(),
            PlanNode::Filter(filter) => vec![filter.input.as_ref()],
            PlanNode::Other(other) => other.children.iter().collect(),
        }
    }
}

/// Hands out plan node ids for one rewrite scope.
///
/// Ids are never reused: two construction calls get distinct ids even for
/// structurally identical nodes, which is what lets id equality stand in for
/// node identity.
#[derive(Debug)]
pub struct PlanNodeIdAllocator {
    next: u64,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocator whose ids start after every id already present in `plan`.
    pub fn for_plan(plan: &PlanNode) -> Self {
        fn max_id(plan: &PlanNode) -> u64 {
            let mut max = plan.id().0;
            for child in plan.children() {
                max = max.max(max_id(child));
            }
            max
        }
        Self {
            next: max_id(plan) + 1,
        }
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

impl Default for PlanNodeIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
