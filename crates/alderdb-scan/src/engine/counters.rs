//! Per-index instrumentation counters for bitmap scans.
//!
//! Counters exist only when the caller requested call-level instrumentation;
//! they are allocated zeroed at scan open, mutated during execute, read by
//! plan visualization, and freed (not reallocated) on rescan.

use crate::host::explain::ExplainState;
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};

///
/// IndexCounters
///
/// Accumulated activity for one index, identified by its position in the
/// owning table's ordered index list.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexCounters {
    pub scans: u64,
    pub tuples_fetched: u64,
    pub tuples_rechecked: u64,
    pub tuples_dropped: u64,
}

///
/// ScanCounters
///
/// One `IndexCounters` slot per table index, in descriptor order.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, PartialEq)]
pub struct ScanCounters(Vec<IndexCounters>);

impl ScanCounters {
    /// Allocate zeroed counters for a table with `index_count` indexes.
    #[must_use]
    pub fn new_zeroed(index_count: usize) -> Self {
        Self(vec![IndexCounters::default(); index_count])
    }
}

/// Render one index's counters into the current visualization scope.
///
/// This is the engine's counter-rendering routine; the explain walker calls
/// it once per leaf after locating the owning index.
pub fn render_index_counters(es: &mut ExplainState, counters: &IndexCounters) {
    es.property("Index Scans", counters.scans);
    es.property("Tuples Fetched", counters.tuples_fetched);
    es.property("Tuples Rechecked", counters.tuples_rechecked);
    es.property("Tuples Dropped", counters.tuples_dropped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_counters_have_one_slot_per_index() {
        let counters = ScanCounters::new_zeroed(3);
        assert_eq!(counters.len(), 3);
        assert_eq!(counters.get(2), Some(&IndexCounters::default()));
        assert_eq!(counters.get(3), None);
    }

    #[test]
    fn slot_mutation_is_positional() {
        let mut counters = ScanCounters::new_zeroed(2);
        counters.get_mut(1).unwrap().scans += 1;
        assert_eq!(counters.get(0).unwrap().scans, 0);
        assert_eq!(counters.get(1).unwrap().scans, 1);
    }
}
