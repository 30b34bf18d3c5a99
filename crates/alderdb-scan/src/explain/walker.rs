//! Plan-visualization walker for the bitmap combinator tree.
//!
//! Reproduces the nested AND/OR structure the native visualizer would
//! print, injecting per-index instrumentation counters at each leaf.

use crate::{
    engine::{
        counters::{ScanCounters, render_index_counters},
        cursor::ScanSource,
        descr::TableDescr,
    },
    error::InternalError,
    executor::scan_state::BitmapScanState,
    host::{
        exec::SubPlanState,
        explain::{ExplainFormat, ExplainState},
        plan::render_qual_list,
    },
    planner::plan::PlanStrategy,
};

// Indentation increment for combinator children, matching the native
// visualizer's bitmap rendering.
const INDENT_STEP: usize = 3;

/// Render one custom bitmap-heap scan, including its combinator tree.
///
/// Indentation and group bookkeeping are fully unwound before returning,
/// so callers may continue rendering sibling content immediately.
pub fn explain_scan<S: ScanSource>(
    state: &BitmapScanState<'_, S>,
    es: &mut ExplainState,
) -> Result<(), InternalError> {
    let descr = state
        .source()
        .relation_descr(state.relation())
        .ok_or_else(|| {
            InternalError::explain_invariant(format!(
                "explain of scan over non-engine relation: {}",
                state.relation()
            ))
        })?;

    match state.strategy() {
        PlanStrategy::BitmapHeap { .. } => {}
    }

    match es.format() {
        ExplainFormat::Text => es.line("Bitmap heap scan"),
        ExplainFormat::Tree => es.property("Custom Scan Subtype", "Bitmap Heap Scan"),
    }

    if !state.recheck_quals().is_empty() {
        es.property("Recheck Cond", render_qual_list(state.recheck_quals()));
        if es.analyze() {
            es.property("Rows Removed by Index Recheck", state.rows_removed_by_recheck());
        }
    }
    if !state.residual_quals().is_empty() && es.analyze() {
        es.property("Rows Removed by Filter", state.rows_removed_by_filter());
    }

    if let Some(tree) = state.subplan_state() {
        es.open_group("Plans");
        walk_node(tree, descr, state.counters(), es)?;
        es.close_group("Plans");
    }

    Ok(())
}

// Pre-order walk: the node's own summary first, then its children one
// indent step deeper, then an exact unwind.
fn walk_node(
    node: &SubPlanState,
    descr: &TableDescr,
    counters: Option<&ScanCounters>,
    es: &mut ExplainState,
) -> Result<(), InternalError> {
    match node {
        SubPlanState::And(children) => {
            walk_combinator("Bitmap And", children, descr, counters, es)?;
        }
        SubPlanState::Or(children) => {
            walk_combinator("Bitmap Or", children, descr, counters, es)?;
        }
        SubPlanState::IndexScan(leaf) => {
            let position = owning_index_position(descr, leaf.index_id)?;
            let index = &descr.indexes[position];

            es.begin_plan_node(&format!("Bitmap Index Scan on {}", index.name));
            es.inc_depth(INDENT_STEP);
            if !leaf.index_quals.is_empty() {
                es.property("Index Cond", render_qual_list(&leaf.index_quals));
            }
            // Counters may legitimately be absent (no instrumentation, or
            // the scan was restarted); skip output instead of faulting.
            if let Some(counters) = counters {
                if let Some(slot) = counters.get(position) {
                    render_index_counters(es, slot);
                }
            }
            es.dec_depth(INDENT_STEP);
            es.end_plan_node();
        }
        SubPlanState::PassThrough(_) => {
            return Err(InternalError::explain_invariant(
                "cannot explain plan-state node kind: pass-through",
            ));
        }
    }

    Ok(())
}

fn walk_combinator(
    label: &str,
    children: &[SubPlanState],
    descr: &TableDescr,
    counters: Option<&ScanCounters>,
    es: &mut ExplainState,
) -> Result<(), InternalError> {
    // The node renders alone; this walker, not the generic renderer,
    // drives recursion into the children.
    es.begin_plan_node(label);
    es.inc_depth(INDENT_STEP);
    for child in children {
        walk_node(child, descr, counters, es)?;
    }
    es.dec_depth(INDENT_STEP);
    es.end_plan_node();
    Ok(())
}

// The leaf's owning index, located by identifier in the table's ordered
// descriptor list. Exactly one match is an engine/plan consistency
// requirement.
fn owning_index_position(
    descr: &TableDescr,
    index_id: crate::engine::descr::IndexId,
) -> Result<usize, InternalError> {
    let mut matches = descr
        .indexes
        .iter()
        .enumerate()
        .filter(|(_, index)| index.id == index_id)
        .map(|(position, _)| position);

    let Some(position) = matches.next() else {
        return Err(InternalError::explain_invariant(format!(
            "bitmap leaf references unknown index {index_id} on \"{}\"",
            descr.name
        )));
    };
    if matches.next().is_some() {
        return Err(InternalError::explain_invariant(format!(
            "bitmap leaf index {index_id} matches more than one descriptor on \"{}\"",
            descr.name
        )));
    }

    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::snapshot::Snapshot;
    use crate::host::exec::{BitmapIndexScanState, ExecContext};
    use crate::host::explain::{ExplainGroup, ExplainOutput};
    use crate::test_support::{MemEngine, employees_custom_plan_or_and, employees_custom_plan_with};

    fn run_to_end<S: ScanSource>(state: &mut BitmapScanState<'_, S>) {
        while state.execute().unwrap().is_some() {}
    }

    #[test]
    fn or_and_tree_renders_leaves_in_pre_order_and_restores_depth() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_or_and(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);
        state.open(&ctx).unwrap();
        run_to_end(&mut state);

        let mut es = ExplainState::new(ExplainFormat::Text, false);
        let depth_before = es.depth();
        explain_scan(&state, &mut es).unwrap();
        assert_eq!(es.depth(), depth_before);

        let ExplainOutput::Text(text) = es.finish() else {
            panic!("expected text output");
        };

        let or_at = text.find("->  Bitmap Or").unwrap();
        let dept_at = text.find("->  Bitmap Index Scan on employees_dept_idx").unwrap();
        let and_at = text.find("->  Bitmap And").unwrap();
        let age_at = text.find("->  Bitmap Index Scan on employees_age_idx").unwrap();
        let pkey_at = text.find("->  Bitmap Index Scan on employees_pkey").unwrap();
        assert!(or_at < dept_at);
        assert!(dept_at < and_at);
        assert!(and_at < age_at);
        assert!(age_at < pkey_at);

        state.close().unwrap();
    }

    #[test]
    fn analyze_scan_injects_counters_at_each_leaf() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_or_and(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), true);
        state.open(&ctx).unwrap();
        run_to_end(&mut state);

        let mut es = ExplainState::new(ExplainFormat::Tree, true);
        explain_scan(&state, &mut es).unwrap();
        let ExplainOutput::Tree(root) = es.finish() else {
            panic!("expected tree output");
        };

        let plans = &root.children[0];
        let or_node = &plans.children[0];
        let leaves: Vec<&ExplainGroup> = collect_leaves(or_node);
        assert_eq!(leaves.len(), 3);
        for leaf in leaves {
            assert_eq!(leaf.property("Index Scans"), Some("1"));
            assert!(leaf.property("Tuples Fetched").is_some());
        }

        state.close().unwrap();
    }

    fn collect_leaves(group: &ExplainGroup) -> Vec<&ExplainGroup> {
        if group.children.is_empty() {
            return vec![group];
        }
        group.children.iter().flat_map(collect_leaves).collect()
    }

    #[test]
    fn formats_carry_identical_logical_content() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), true);
        state.open(&ctx).unwrap();
        run_to_end(&mut state);

        let mut text_es = ExplainState::new(ExplainFormat::Text, true);
        explain_scan(&state, &mut text_es).unwrap();
        let ExplainOutput::Text(text) = text_es.finish() else {
            panic!("expected text output");
        };

        let mut tree_es = ExplainState::new(ExplainFormat::Tree, true);
        explain_scan(&state, &mut tree_es).unwrap();
        let ExplainOutput::Tree(root) = tree_es.finish() else {
            panic!("expected tree output");
        };

        assert!(text.contains("Recheck Cond: (dept = 'eng')"));
        assert_eq!(root.property("Recheck Cond"), Some("(dept = 'eng')"));
        assert!(text.contains("Rows Removed by Index Recheck: 0"));
        assert_eq!(root.property("Rows Removed by Index Recheck"), Some("0"));
        assert!(text.contains("Bitmap Index Scan on employees_dept_idx"));
        let json = serde_json::to_string(&root).unwrap();
        assert!(json.contains("Bitmap Index Scan on employees_dept_idx"));

        state.close().unwrap();
    }

    #[test]
    fn explain_after_rescan_skips_counters() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), true);
        state.open(&ctx).unwrap();
        run_to_end(&mut state);
        state.rescan().unwrap();

        let mut es = ExplainState::new(ExplainFormat::Text, true);
        explain_scan(&state, &mut es).unwrap();
        let ExplainOutput::Text(text) = es.finish() else {
            panic!("expected text output");
        };
        assert!(text.contains("Bitmap Index Scan on employees_dept_idx"));
        assert!(!text.contains("Index Scans:"));

        state.close().unwrap();
    }

    #[test]
    fn unknown_plan_state_kind_is_fatal() {
        let engine = MemEngine::employees();
        let descr = engine.relation_descr(engine.employees_relation()).unwrap();
        let node = SubPlanState::PassThrough(Box::new(SubPlanState::IndexScan(
            BitmapIndexScanState {
                index_id: crate::engine::descr::IndexId(11),
                index_quals: vec![],
            },
        )));

        let mut es = ExplainState::new(ExplainFormat::Text, false);
        let err = walk_node(&node, descr, None, &mut es).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn leaf_with_unknown_index_is_fatal() {
        let engine = MemEngine::employees();
        let descr = engine.relation_descr(engine.employees_relation()).unwrap();
        let node = SubPlanState::IndexScan(BitmapIndexScanState {
            index_id: crate::engine::descr::IndexId(99),
            index_quals: vec![],
        });

        let mut es = ExplainState::new(ExplainFormat::Text, false);
        let err = walk_node(&node, descr, None, &mut es).unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(err.message.contains("idx:99"));
    }
}
