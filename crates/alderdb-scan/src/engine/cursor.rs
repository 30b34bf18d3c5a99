//! Bitmap cursor lifecycle contract at the storage-engine boundary.
//!
//! The engine owns index iteration, visibility, and recheck machinery; this
//! module fixes only the contract the scan state machine depends on:
//! explicit construction from a snapshot-scoped request, fetch-one
//! iteration with in-band end-of-scan, and synchronous release.

use crate::{
    engine::{
        arena::ScanArena,
        counters::ScanCounters,
        descr::{KeyType, RelationId, TableDescr},
        snapshot::Snapshot,
    },
    error::InternalError,
    host::{exec::SubPlanState, plan::Tuple},
};
use std::rc::Rc;

///
/// BitmapScanRequest
///
/// Everything the engine needs to open a snapshot-consistent bitmap cursor:
/// the captured snapshot, the scan-scoped arena, the relation, the recorded
/// primary-key value type, and the bitmap-producing sub-plan state.
///

pub struct BitmapScanRequest<'a> {
    pub relation: RelationId,
    pub key_type: KeyType,
    pub snapshot: Snapshot,
    pub producer: &'a SubPlanState,
    pub arena: Rc<ScanArena>,
}

///
/// CursorStats
///
/// Cumulative recheck accounting for one cursor's lifetime.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CursorStats {
    pub tuples_rechecked: u64,
    pub recheck_dropped: u64,
}

///
/// BitmapCursor
///
/// Fetch-one iterator over bitmap candidate rows. End-of-scan is an empty
/// result, never an error; once empty it stays empty until the owning scan
/// is restarted. Instrumentation counters are threaded in explicitly per
/// call and must not be retained across calls.
///

pub trait BitmapCursor {
    fn fetch(
        &mut self,
        counters: Option<&mut ScanCounters>,
    ) -> Result<Option<Tuple>, InternalError>;

    fn stats(&self) -> CursorStats;

    /// Release engine-side resources synchronously.
    fn release(self: Box<Self>) -> Result<(), InternalError>;
}

///
/// ScanSource
///
/// Storage-engine surface the bridge consumes: descriptor resolution for
/// engine-backed relations, and bitmap-cursor construction.
///

pub trait ScanSource {
    /// Descriptor for `relation` when it is backed by this engine.
    fn relation_descr(&self, relation: RelationId) -> Option<&TableDescr>;

    /// Open a bitmap cursor. Building the row-identifier bitmap may drive
    /// the producer's index scans, so counters are threaded here as well.
    /// The producer is borrowed for the duration of this call only; the
    /// returned cursor must not retain it.
    fn begin_bitmap_scan<'a>(
        &'a self,
        request: BitmapScanRequest<'_>,
        counters: Option<&mut ScanCounters>,
    ) -> Result<Box<dyn BitmapCursor + 'a>, InternalError>;
}
