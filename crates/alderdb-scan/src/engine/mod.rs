//! Storage-engine boundary: descriptors, snapshots, arenas, counters, and
//! the bitmap-cursor contract.

pub mod arena;
pub mod counters;
pub mod cursor;
pub mod descr;
pub mod snapshot;

pub use arena::{QueryArena, ScanArena};
pub use counters::{IndexCounters, ScanCounters, render_index_counters};
pub use cursor::{BitmapCursor, BitmapScanRequest, CursorStats, ScanSource};
pub use descr::{IndexDescr, IndexId, KeyType, RelationId, TableDescr};
pub use snapshot::Snapshot;
