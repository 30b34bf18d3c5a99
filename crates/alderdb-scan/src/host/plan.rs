//! Generic plan-node shapes consumed from the host planner.
//!
//! The bridge only ever sees the bitmap-producing corner of the host plan
//! surface; these types model exactly that corner.

use crate::{engine::descr::IndexId, error::InternalError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

///
/// Value
///
/// Host literal/datum model for qualifiers, projections, and tuples.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    /// Compare two values of the same type; `None` for mixed or null operands.
    #[must_use]
    pub fn compare_same_type(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{value}'"),
        }
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn admits(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

///
/// Expr
///
/// Minimal host expression shape: column references, literals, and
/// column-vs-literal comparisons. Qualifier lists are conjunctive.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
}

impl Expr {
    /// Evaluate this expression as a boolean qualifier against one tuple.
    ///
    /// `columns` is the owning relation's ordered column list. Comparisons
    /// against missing or differently-typed values are false, not errors;
    /// non-boolean expression shapes are a host contract violation.
    pub fn matches(&self, tuple: &Tuple, columns: &[String]) -> Result<bool, InternalError> {
        match self {
            Self::Literal(Value::Bool(value)) => Ok(*value),
            Self::Compare { field, op, value } => {
                let Some(position) = columns.iter().position(|column| column == field) else {
                    return Ok(false);
                };
                let Some(actual) = tuple.values.get(position) else {
                    return Ok(false);
                };
                Ok(actual
                    .compare_same_type(value)
                    .is_some_and(|ordering| op.admits(ordering)))
            }
            Self::Literal(_) | Self::Column(_) => Err(InternalError::executor_invariant(format!(
                "non-boolean qualifier expression: {self}"
            ))),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => f.write_str(name),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Compare { field, op, value } => write!(f, "({field} {op} {value})"),
        }
    }
}

/// Render a conjunctive qualifier list the way the host renders scan quals.
#[must_use]
pub fn render_qual_list(quals: &[Expr]) -> String {
    let rendered: Vec<String> = quals.iter().map(ToString::to_string).collect();
    rendered.join(" AND ")
}

///
/// TargetEntry
///
/// One projection-list entry.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TargetEntry {
    pub expr: Expr,
    pub name: String,
}

impl TargetEntry {
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expr: Expr::Column(name.clone()),
            name,
        }
    }
}

///
/// Tuple
///
/// Full-width row produced by the engine before projection.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

///
/// SubPlan
///
/// Bitmap-producing plan subtree: AND/OR combinators over single-index
/// bitmap producers. Owned by the custom plan node once lowered.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SubPlan {
    And(Vec<SubPlan>),
    Or(Vec<SubPlan>),
    IndexScan(BitmapIndexScanPlan),
}

///
/// BitmapIndexScanPlan
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BitmapIndexScanPlan {
    pub index_id: IndexId,
    pub index_quals: Vec<Expr>,
}

///
/// BitmapHeapScanPlan
///
/// The native bitmap-heap plan the rewriter's custom path wraps. The
/// recheck list is the original (pre-rewrite) qualifier set, kept for
/// display; `qual` is the residual filter evaluated per fetched row.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BitmapHeapScanPlan {
    pub target_list: Vec<TargetEntry>,
    pub qual: Vec<Expr>,
    pub recheck_quals: Vec<Expr>,
    pub bitmap_subplan: SubPlan,
}

///
/// Plan
///
/// Host plan nodes the builder may receive as already-planned sub-plans.
/// Planners may wrap a plan in a trivial single-child pass-through node.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Plan {
    BitmapHeapScan(BitmapHeapScanPlan),
    PassThrough(Box<Plan>),
}

impl Plan {
    /// Strip degenerate pass-through wrappers down to the real plan.
    #[must_use]
    pub fn unwrap_pass_through(&self) -> &Self {
        let mut plan = self;
        while let Self::PassThrough(inner) = plan {
            plan = inner;
        }
        plan
    }
}
