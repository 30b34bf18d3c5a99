//! Plan lowering: chosen custom path + planned sub-plans → custom plan node.

use crate::{
    engine::cursor::ScanSource,
    engine::descr::RelationId,
    error::InternalError,
    host::{
        path::PathCost,
        plan::Plan,
    },
    obs::{self, MetricsEvent},
    planner::{
        path::{CustomPath, PathStrategy},
        plan::{CustomScanPlan, PlanStrategy},
    },
};

/// Lower a chosen custom path into a custom scan plan node.
///
/// The relation descriptor is borrowed only for the duration of this call,
/// purely to resolve index shape; nothing of it escapes. Cost fields are
/// left for the caller's generic plan costing.
pub fn build_custom_plan<S: ScanSource>(
    source: &S,
    relation: RelationId,
    path: &CustomPath,
    sub_plans: &[Plan],
) -> Result<CustomScanPlan, InternalError> {
    let descr = source.relation_descr(relation).ok_or_else(|| {
        InternalError::planner_invariant(format!(
            "custom plan lowering for non-engine relation: {relation}"
        ))
    })?;

    let first = sub_plans.first().ok_or_else(|| {
        InternalError::planner_invariant("custom path lowered without a planned sub-plan")
    })?;
    let plan = first.unwrap_pass_through();

    match path.strategy {
        PathStrategy::BitmapHeap => {
            let Plan::BitmapHeapScan(bh_scan) = plan else {
                return Err(InternalError::planner_invariant(
                    "bitmap-heap custom path requires a bitmap-heap sub-plan",
                ));
            };

            let primary = descr.primary().ok_or_else(|| {
                InternalError::planner_invariant(format!(
                    "engine relation \"{}\" has no primary index",
                    descr.name
                ))
            })?;
            if primary.fields.len() != 1 {
                return Err(InternalError::planner_invariant(format!(
                    "primary index \"{}\" has {} key fields; bitmap-heap scans \
                     currently require a single-field primary key",
                    primary.name,
                    primary.fields.len()
                )));
            }
            let key_type = primary.fields[0].1;

            obs::record(MetricsEvent::PlanBuilt);

            Ok(CustomScanPlan {
                strategy: PlanStrategy::BitmapHeap { key_type },
                relation,
                target_list: bh_scan.target_list.clone(),
                residual_quals: bh_scan.qual.clone(),
                recheck_quals: bh_scan.recheck_quals.clone(),
                bitmap_subplan: bh_scan.bitmap_subplan.clone(),
                cost: PathCost::zero(),
                rows: 0.0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::descr::KeyType;
    use crate::test_support::{MemEngine, employees_bitmap_path, employees_bitmap_plan};

    #[test]
    fn lowering_copies_projection_and_quals_verbatim() {
        let engine = MemEngine::employees();
        let relation = engine.employees_relation();
        let path = employees_bitmap_path();
        let bh_plan = employees_bitmap_plan();

        let plan = build_custom_plan(
            &engine,
            relation,
            &path,
            &[Plan::BitmapHeapScan(bh_plan.clone())],
        )
        .unwrap();

        assert_eq!(plan.target_list, bh_plan.target_list);
        assert_eq!(plan.residual_quals, bh_plan.qual);
        assert_eq!(plan.recheck_quals, bh_plan.recheck_quals);
        assert_eq!(plan.bitmap_subplan, bh_plan.bitmap_subplan);
        assert_eq!(
            plan.strategy,
            PlanStrategy::BitmapHeap {
                key_type: KeyType::Int
            }
        );
        // Costs are the caller's job.
        assert_eq!(plan.cost, PathCost::zero());
        assert_eq!(plan.rows, 0.0);
    }

    #[test]
    fn pass_through_wrappers_are_unwrapped() {
        let engine = MemEngine::employees();
        let relation = engine.employees_relation();
        let path = employees_bitmap_path();
        let wrapped = Plan::PassThrough(Box::new(Plan::BitmapHeapScan(employees_bitmap_plan())));

        let plan = build_custom_plan(&engine, relation, &path, &[wrapped]).unwrap();
        assert!(plan.is_bitmap_heap());
    }

    #[test]
    fn composite_primary_key_is_an_explicit_limitation() {
        let engine = MemEngine::composite_pk();
        let relation = engine.composite_relation();
        let path = employees_bitmap_path();

        let err = build_custom_plan(
            &engine,
            relation,
            &path,
            &[Plan::BitmapHeapScan(employees_bitmap_plan())],
        )
        .unwrap_err();

        assert!(err.is_invariant_violation());
        assert!(err.message.contains("single-field primary key"));
    }

    #[test]
    fn missing_sub_plan_is_an_invariant_violation() {
        let engine = MemEngine::employees();
        let relation = engine.employees_relation();
        let path = employees_bitmap_path();

        let err = build_custom_plan(&engine, relation, &path, &[]).unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
