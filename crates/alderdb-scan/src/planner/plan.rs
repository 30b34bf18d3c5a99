//! The serializable custom plan node produced by plan lowering.

use crate::{
    engine::descr::{KeyType, RelationId},
    host::{
        path::PathCost,
        plan::{Expr, SubPlan, TargetEntry},
    },
};
use serde::{Deserialize, Serialize};

///
/// PlanStrategy
///
/// Closed plan-kind tag carried by the custom plan node, with the opaque
/// payload each strategy needs at execution time.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PlanStrategy {
    BitmapHeap { key_type: KeyType },
}

///
/// CustomScanPlan
///
/// Produced once per query by plan lowering, immutable afterward, and
/// reusable across cached plan executions. Owns the bitmap-producing
/// sub-plan tree; cost fields are filled by the caller's generic plan
/// costing after lowering returns.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CustomScanPlan {
    pub strategy: PlanStrategy,
    pub relation: RelationId,
    pub target_list: Vec<TargetEntry>,
    pub residual_quals: Vec<Expr>,
    /// Original (pre-rewrite) qualifiers, kept for display only.
    pub recheck_quals: Vec<Expr>,
    pub bitmap_subplan: SubPlan,
    pub cost: PathCost,
    pub rows: f64,
}

impl CustomScanPlan {
    #[must_use]
    pub const fn is_bitmap_heap(&self) -> bool {
        matches!(self.strategy, PlanStrategy::BitmapHeap { .. })
    }

    /// Fill cost estimates from generic plan costing.
    pub const fn set_cost_estimates(&mut self, cost: PathCost, rows: f64) {
        self.cost = cost;
        self.rows = rows;
    }
}
