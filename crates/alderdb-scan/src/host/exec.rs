//! Host executor surface: execution context, sub-plan execution state, and
//! the generic projection step.

use crate::{
    engine::{arena::QueryArena, descr::IndexId, snapshot::Snapshot},
    error::InternalError,
    host::plan::{Expr, SubPlan, TargetEntry, Tuple, Value},
};

///
/// ExecContext
///
/// Per-query executor context handed to scan nodes. The scan captures the
/// active snapshot by value at open; later context changes must not affect
/// an in-progress scan.
///

pub struct ExecContext {
    pub active_snapshot: Snapshot,
    pub arena: QueryArena,
    pub analyze: bool,
}

impl ExecContext {
    #[must_use]
    pub fn new(active_snapshot: Snapshot, analyze: bool) -> Self {
        Self {
            active_snapshot,
            arena: QueryArena::new(),
            analyze,
        }
    }
}

///
/// BitmapIndexScanState
///
/// Execution state for one single-index bitmap producer.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BitmapIndexScanState {
    pub index_id: IndexId,
    pub index_quals: Vec<Expr>,
}

///
/// SubPlanState
///
/// Execution-state tree mirroring the bitmap-producing sub-plan. The
/// pass-through variant is the wrapper state the host produces for
/// trivially wrapped plans; the bridge never builds one and the explain
/// walker rejects it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubPlanState {
    And(Vec<SubPlanState>),
    Or(Vec<SubPlanState>),
    IndexScan(BitmapIndexScanState),
    PassThrough(Box<SubPlanState>),
}

impl SubPlanState {
    /// Initialize execution state for a bitmap sub-plan tree.
    #[must_use]
    pub fn init(plan: &SubPlan) -> Self {
        match plan {
            SubPlan::And(children) => Self::And(children.iter().map(Self::init).collect()),
            SubPlan::Or(children) => Self::Or(children.iter().map(Self::init).collect()),
            SubPlan::IndexScan(scan) => Self::IndexScan(BitmapIndexScanState {
                index_id: scan.index_id,
                index_quals: scan.index_quals.clone(),
            }),
        }
    }

    /// Shut the execution-state tree down, releasing node state depth-first.
    pub fn end(self) {
        match self {
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.end();
                }
            }
            Self::IndexScan(_) => {}
            Self::PassThrough(inner) => inner.end(),
        }
    }
}

///
/// Projection
///
/// Generic projection step. Scan strategies must route every result through
/// it, including empty fetches, so the caller contract stays uniform.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Projection {
    columns: Vec<ProjectedColumn>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum ProjectedColumn {
    Input(usize),
    Literal(Value),
}

impl Projection {
    /// Resolve a projection list against the relation's ordered columns.
    pub fn from_targets(
        targets: &[TargetEntry],
        columns: &[String],
    ) -> Result<Self, InternalError> {
        let resolved = targets
            .iter()
            .map(|target| match &target.expr {
                Expr::Column(name) => columns
                    .iter()
                    .position(|column| column == name)
                    .map(ProjectedColumn::Input)
                    .ok_or_else(|| {
                        InternalError::executor_invariant(format!(
                            "projection references unknown column: {name}"
                        ))
                    }),
                Expr::Literal(value) => Ok(ProjectedColumn::Literal(value.clone())),
                Expr::Compare { .. } => Err(InternalError::executor_invariant(format!(
                    "projection entry is not projectable: {}",
                    target.expr
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns: resolved })
    }

    /// Project one fetched tuple, or acknowledge an empty fetch.
    #[must_use]
    pub fn apply(&self, input: Option<&Tuple>) -> Option<Tuple> {
        let input = input?;
        let values = self
            .columns
            .iter()
            .map(|column| match column {
                ProjectedColumn::Input(position) => {
                    input.values.get(*position).cloned().unwrap_or(Value::Null)
                }
                ProjectedColumn::Literal(value) => value.clone(),
            })
            .collect();

        Some(Tuple::new(values))
    }
}
