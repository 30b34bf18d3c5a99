//! Host planner/executor framework boundary.
//!
//! The bridge consumes a narrow slice of the host's path, plan, executor,
//! and visualization surfaces; these modules model exactly that slice.

pub mod exec;
pub mod explain;
pub mod path;
pub mod plan;

pub use exec::{BitmapIndexScanState, ExecContext, Projection, SubPlanState};
pub use explain::{ExplainFormat, ExplainGroup, ExplainOutput, ExplainState};
pub use path::{
    BitmapHeapPath, BitmapQualPath, IndexCandidate, NativePath, PathCost, PathEntry, PathInfo,
    PathKey, PlainScanKind, RelPathSet,
};
pub use plan::{
    BitmapHeapScanPlan, BitmapIndexScanPlan, CompareOp, Expr, Plan, SubPlan, TargetEntry, Tuple,
    Value, render_qual_list,
};
