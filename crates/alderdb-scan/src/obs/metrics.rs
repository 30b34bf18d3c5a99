//! Process-local metrics state for the scan bridge.

use serde::Serialize;
use std::cell::RefCell;

///
/// OpsCounters
///
/// Cumulative operation counters since the last reset.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OpsCounters {
    pub paths_rewritten: u64,
    pub partial_paths_dropped: u64,
    pub plans_built: u64,
    pub scans_opened: u64,
    pub tuples_fetched: u64,
    pub scan_rescans: u64,
    pub scans_closed: u64,
}

thread_local! {
    static STATE: RefCell<OpsCounters> = RefCell::new(OpsCounters::default());
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut OpsCounters) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub(crate) fn snapshot() -> OpsCounters {
    STATE.with(|state| *state.borrow())
}

pub(crate) fn reset_all() {
    STATE.with(|state| {
        *state.borrow_mut() = OpsCounters::default();
    });
}
