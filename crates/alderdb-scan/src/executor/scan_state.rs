//! Runtime scan state for custom bitmap-heap scans.
//!
//! Phase machine: created → opened → executing → rescanned → closed.
//! The bitmap cursor is live only strictly between the first execute after
//! open/rescan and the next rescan/close.

use crate::{
    engine::{
        arena::ScanArena,
        counters::ScanCounters,
        cursor::{BitmapCursor, BitmapScanRequest, ScanSource},
        descr::{KeyType, RelationId},
        snapshot::Snapshot,
    },
    error::InternalError,
    host::{
        exec::{ExecContext, Projection, SubPlanState},
        plan::{Expr, SubPlan, TargetEntry, Tuple},
    },
    obs::{self, MetricsEvent},
    planner::plan::{CustomScanPlan, PlanStrategy},
};
use std::rc::Rc;

///
/// ScanPhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanPhase {
    Created,
    Opened,
    Executing,
    Rescanned,
    Closed,
}

///
/// ScanStats
///
/// Node-level runtime accounting surfaced by plan visualization.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanStats {
    pub rows_removed_by_recheck: u64,
    pub rows_removed_by_filter: u64,
}

///
/// BitmapScanState
///
/// One active scan invocation over an engine-backed relation. Owned and
/// driven by a single execution thread; rescan restarts tuple production
/// without destroying the state.
///

pub struct BitmapScanState<'a, S: ScanSource> {
    source: &'a S,
    strategy: PlanStrategy,
    relation: RelationId,
    key_type: KeyType,
    subplan: SubPlan,
    target_list: Vec<TargetEntry>,
    residual_quals: Vec<Expr>,
    recheck_quals: Vec<Expr>,
    phase: ScanPhase,
    analyze: bool,
    columns: Vec<String>,
    subplan_state: Option<SubPlanState>,
    cursor: Option<Box<dyn BitmapCursor + 'a>>,
    snapshot: Option<Snapshot>,
    arena: Option<Rc<ScanArena>>,
    counters: Option<ScanCounters>,
    projection: Option<Projection>,
    stats: ScanStats,
}

impl<'a, S: ScanSource> BitmapScanState<'a, S> {
    /// Instantiate scan state from a custom plan node.
    ///
    /// Deep-copies the bitmap sub-plan tree and the original qualifier list
    /// (the latter is kept for display, never re-evaluated).
    #[must_use]
    pub fn create(source: &'a S, plan: &CustomScanPlan) -> Self {
        let PlanStrategy::BitmapHeap { key_type } = plan.strategy;

        Self {
            source,
            strategy: plan.strategy,
            relation: plan.relation,
            key_type,
            subplan: plan.bitmap_subplan.clone(),
            target_list: plan.target_list.clone(),
            residual_quals: plan.residual_quals.clone(),
            recheck_quals: plan.recheck_quals.clone(),
            phase: ScanPhase::Created,
            analyze: false,
            columns: Vec::new(),
            subplan_state: None,
            cursor: None,
            snapshot: None,
            arena: None,
            counters: None,
            projection: None,
            stats: ScanStats::default(),
        }
    }

    /// Prepare the scan: resolve the relation, allocate instrumentation if
    /// requested, initialize the sub-plan state tree, capture the snapshot
    /// by value, and allocate the scan-scoped arena.
    pub fn open(&mut self, ctx: &ExecContext) -> Result<(), InternalError> {
        if self.phase != ScanPhase::Created {
            return Err(InternalError::executor_invariant(format!(
                "scan opened in phase {:?}",
                self.phase
            )));
        }

        let descr = self.source.relation_descr(self.relation).ok_or_else(|| {
            InternalError::executor_invariant(format!(
                "scan opened on non-engine relation: {}",
                self.relation
            ))
        })?;

        self.analyze = ctx.analyze;
        if self.analyze {
            self.counters = Some(ScanCounters::new_zeroed(descr.indexes.len()));
        }

        self.columns = descr.columns.clone();
        self.projection = Some(Projection::from_targets(&self.target_list, &self.columns)?);
        self.subplan_state = Some(SubPlanState::init(&self.subplan));
        self.snapshot = Some(ctx.active_snapshot);
        self.arena = Some(Rc::new(ctx.arena.child_scan_arena("alderdb scan data")));

        obs::record(MetricsEvent::ScanOpened);
        self.phase = ScanPhase::Opened;
        Ok(())
    }

    /// Produce at most one projected tuple. The bitmap cursor is built
    /// lazily on the first call after open or rescan; end-of-scan is an
    /// empty result and stays empty until the scan is restarted.
    pub fn execute(&mut self) -> Result<Option<Tuple>, InternalError> {
        match self.phase {
            ScanPhase::Opened | ScanPhase::Executing | ScanPhase::Rescanned => {}
            ScanPhase::Created => {
                return Err(InternalError::executor_invariant("scan executed before open"));
            }
            ScanPhase::Closed => {
                return Err(InternalError::executor_invariant("scan executed after close"));
            }
        }

        if self.cursor.is_none() {
            self.begin_cursor()?;
        }

        loop {
            let Some(cursor) = self.cursor.as_mut() else {
                return Err(InternalError::executor_invariant(
                    "bitmap cursor vanished during execute",
                ));
            };
            let fetched = cursor.fetch(self.counters.as_mut())?;

            let projection = self.projection.as_ref().ok_or_else(|| {
                InternalError::executor_invariant("scan executed without a projection")
            })?;

            match fetched {
                // Projection runs for the empty fetch too, keeping the
                // caller's contract uniform across strategies.
                None => return Ok(projection.apply(None)),
                Some(tuple) => {
                    if !quals_pass(&self.residual_quals, &tuple, &self.columns)? {
                        self.stats.rows_removed_by_filter += 1;
                        continue;
                    }
                    obs::record(MetricsEvent::TupleFetched);
                    return Ok(projection.apply(Some(&tuple)));
                }
            }
        }
    }

    /// Restart tuple production. Releases the live cursor and frees the
    /// instrumentation counters; only open allocates counters, so a scan
    /// explained after a rescan has none to show.
    pub fn rescan(&mut self) -> Result<(), InternalError> {
        match self.phase {
            ScanPhase::Opened | ScanPhase::Executing | ScanPhase::Rescanned => {}
            ScanPhase::Created => {
                return Err(InternalError::executor_invariant("scan rescanned before open"));
            }
            ScanPhase::Closed => {
                return Err(InternalError::executor_invariant("scan rescanned after close"));
            }
        }

        self.release_cursor()?;
        self.counters = None;

        obs::record(MetricsEvent::ScanRescanned);
        self.phase = ScanPhase::Rescanned;
        Ok(())
    }

    /// Tear the scan down. Terminal and safe to repeat; the scan arena is
    /// released exactly once however often close is called.
    pub fn close(&mut self) -> Result<(), InternalError> {
        if self.phase == ScanPhase::Closed {
            return Ok(());
        }

        if let Some(state) = self.subplan_state.take() {
            state.end();
        }
        self.release_cursor()?;
        self.counters = None;
        if let Some(arena) = self.arena.take() {
            arena.release();
        }

        obs::record(MetricsEvent::ScanClosed);
        self.phase = ScanPhase::Closed;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn phase(&self) -> ScanPhase {
        self.phase
    }

    #[must_use]
    pub const fn strategy(&self) -> PlanStrategy {
        self.strategy
    }

    #[must_use]
    pub const fn relation(&self) -> RelationId {
        self.relation
    }

    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.key_type
    }

    #[must_use]
    pub const fn source(&self) -> &'a S {
        self.source
    }

    #[must_use]
    pub fn recheck_quals(&self) -> &[Expr] {
        &self.recheck_quals
    }

    #[must_use]
    pub fn residual_quals(&self) -> &[Expr] {
        &self.residual_quals
    }

    #[must_use]
    pub const fn subplan_state(&self) -> Option<&SubPlanState> {
        self.subplan_state.as_ref()
    }

    /// Whether call-level instrumentation was requested at open. Counters
    /// may still be absent after a rescan even when this is true.
    #[must_use]
    pub const fn instrumentation_requested(&self) -> bool {
        self.analyze
    }

    #[must_use]
    pub const fn counters(&self) -> Option<&ScanCounters> {
        self.counters.as_ref()
    }

    #[must_use]
    pub const fn captured_snapshot(&self) -> Option<Snapshot> {
        self.snapshot
    }

    /// Rows dropped by the engine's qualifier recheck, including the live
    /// cursor's accounting.
    #[must_use]
    pub fn rows_removed_by_recheck(&self) -> u64 {
        let live = self
            .cursor
            .as_ref()
            .map_or(0, |cursor| cursor.stats().recheck_dropped);
        self.stats.rows_removed_by_recheck + live
    }

    #[must_use]
    pub const fn rows_removed_by_filter(&self) -> u64 {
        self.stats.rows_removed_by_filter
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_cursor(&mut self) -> Result<(), InternalError> {
        let snapshot = self.snapshot.ok_or_else(|| {
            InternalError::executor_invariant("scan has no captured snapshot")
        })?;
        let producer = self.subplan_state.as_ref().ok_or_else(|| {
            InternalError::executor_invariant("scan has no bitmap producer state")
        })?;
        let arena = self.arena.as_ref().ok_or_else(|| {
            InternalError::executor_invariant("scan has no scoped arena")
        })?;

        let request = BitmapScanRequest {
            relation: self.relation,
            key_type: self.key_type,
            snapshot,
            producer,
            arena: Rc::clone(arena),
        };
        let cursor = self.source.begin_bitmap_scan(request, self.counters.as_mut())?;

        self.cursor = Some(cursor);
        self.phase = ScanPhase::Executing;
        Ok(())
    }

    // Release engine-side cursor resources synchronously and fold its
    // recheck accounting into the node-level stats.
    fn release_cursor(&mut self) -> Result<(), InternalError> {
        if let Some(cursor) = self.cursor.take() {
            self.stats.rows_removed_by_recheck += cursor.stats().recheck_dropped;
            cursor.release()?;
        }
        Ok(())
    }
}

fn quals_pass(quals: &[Expr], tuple: &Tuple, columns: &[String]) -> Result<bool, InternalError> {
    for qual in quals {
        if !qual.matches(tuple, columns)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::plan::Value;
    use crate::test_support::{
        MemEngine, dept_eq, employees_custom_plan_with, employees_custom_plan_with_filter,
    };

    fn exec_all<S: ScanSource>(state: &mut BitmapScanState<'_, S>) -> Vec<Tuple> {
        let mut out = Vec::new();
        while let Some(tuple) = state.execute().unwrap() {
            out.push(tuple);
        }
        out
    }

    #[test]
    fn cursor_opens_track_open_and_rescan_transitions() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        assert_eq!(engine.cursor_opens(), 0);

        let first = exec_all(&mut state);
        assert_eq!(engine.cursor_opens(), 1);

        // Repeated end-of-scan fetches do not reopen the cursor.
        assert_eq!(state.execute().unwrap(), None);
        assert_eq!(engine.cursor_opens(), 1);

        state.rescan().unwrap();
        let second = exec_all(&mut state);
        assert_eq!(engine.cursor_opens(), 2);
        assert_eq!(first, second);

        state.close().unwrap();
        assert_eq!(ctx.arena.live_scan_arenas(), 0);
    }

    #[test]
    fn close_releases_the_arena_exactly_once_and_is_idempotent() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        assert_eq!(ctx.arena.live_scan_arenas(), 1);
        state.execute().unwrap();

        state.close().unwrap();
        assert_eq!(ctx.arena.live_scan_arenas(), 0);
        assert_eq!(state.phase(), ScanPhase::Closed);

        // Terminal and idempotent-safe.
        state.close().unwrap();
        assert_eq!(ctx.arena.live_scan_arenas(), 0);
        assert!(state.execute().unwrap_err().is_invariant_violation());
    }

    #[test]
    fn tuple_production_terminates_and_stays_empty_until_rescan() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        let rows = exec_all(&mut state);
        assert_eq!(rows.len(), 2);

        for _ in 0..3 {
            assert_eq!(state.execute().unwrap(), None);
        }

        state.rescan().unwrap();
        assert_eq!(exec_all(&mut state).len(), 2);
        state.close().unwrap();
    }

    #[test]
    fn snapshot_is_captured_at_open_and_survives_rescan() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);

        // Row 4 is committed at csn 5 and invisible under csn 1.
        let ctx = ExecContext::new(Snapshot::new(1), false);
        state.open(&ctx).unwrap();
        assert_eq!(state.captured_snapshot(), Some(Snapshot::new(1)));
        assert_eq!(exec_all(&mut state).len(), 2);

        // A plain rescan reuses the originally captured snapshot.
        state.rescan().unwrap();
        assert_eq!(exec_all(&mut state).len(), 2);
        state.close().unwrap();

        let mut late = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(5), false);
        late.open(&ctx).unwrap();
        assert_eq!(exec_all(&mut late).len(), 3);
        late.close().unwrap();
    }

    #[test]
    fn counters_are_threaded_only_when_instrumentation_is_requested() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), true);

        state.open(&ctx).unwrap();
        assert!(state.counters().is_some());
        exec_all(&mut state);

        assert_eq!(engine.counters_seen_at_open(), vec![true]);
        assert!(engine.counters_seen_at_fetch().iter().all(|seen| *seen));
        state.close().unwrap();

        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut plain = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);
        plain.open(&ctx).unwrap();
        assert!(plain.counters().is_none());
        exec_all(&mut plain);
        assert_eq!(engine.counters_seen_at_open(), vec![false]);
        assert!(engine.counters_seen_at_fetch().iter().all(|seen| !*seen));
        plain.close().unwrap();
    }

    #[test]
    fn rescan_frees_counters_without_reallocating() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), true);

        state.open(&ctx).unwrap();
        exec_all(&mut state);
        assert!(state.counters().is_some());

        state.rescan().unwrap();
        assert!(state.counters().is_none());
        assert!(state.instrumentation_requested());

        // Counters stay gone for the rest of this scan's life.
        exec_all(&mut state);
        assert!(state.counters().is_none());
        state.close().unwrap();
    }

    #[test]
    fn recheck_drops_lossy_candidates_and_counts_them() {
        let engine = MemEngine::lossy_employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        let rows = exec_all(&mut state);
        // Lossy bitmap hands all three visible rows over; the recheck
        // drops the "ops" row.
        assert_eq!(rows.len(), 2);
        assert_eq!(state.rows_removed_by_recheck(), 1);

        // The accounting survives the cursor teardown on rescan.
        state.rescan().unwrap();
        assert_eq!(state.rows_removed_by_recheck(), 1);
        state.close().unwrap();
    }

    #[test]
    fn residual_filter_drops_rows_and_counts_them() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with_filter(&engine, dept_eq("eng"));
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        let rows = exec_all(&mut state);
        // All three visible rows are bitmap candidates; "ops" is filtered.
        assert_eq!(rows.len(), 2);
        assert_eq!(state.rows_removed_by_filter(), 1);
        state.close().unwrap();
    }

    #[test]
    fn projection_reshapes_tuples_to_the_target_list() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);
        let ctx = ExecContext::new(Snapshot::new(1), false);

        state.open(&ctx).unwrap();
        let rows = exec_all(&mut state);
        for row in rows {
            assert_eq!(row.values.len(), 2);
            assert!(matches!(row.values[0], Value::Int(_)));
            assert!(matches!(row.values[1], Value::Text(_)));
        }
        state.close().unwrap();
    }

    #[test]
    fn lifecycle_misuse_is_an_invariant_violation() {
        let engine = MemEngine::employees();
        let plan = employees_custom_plan_with(&engine);
        let mut state = BitmapScanState::create(&engine, &plan);

        assert!(state.execute().unwrap_err().is_invariant_violation());
        assert!(state.rescan().unwrap_err().is_invariant_violation());

        let ctx = ExecContext::new(Snapshot::new(1), false);
        state.open(&ctx).unwrap();
        assert!(state.open(&ctx).unwrap_err().is_invariant_violation());
    }
}
