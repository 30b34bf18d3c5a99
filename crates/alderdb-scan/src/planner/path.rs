//! Opaque custom paths the rewriter substitutes for native strategies.

use crate::host::path::{BitmapHeapPath, PathInfo};

///
/// PathStrategy
///
/// Closed strategy tag carried by a custom path. One variant per supported
/// strategy; dispatch is by exhaustive matching so a new strategy is a
/// compile-time-checked extension point.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathStrategy {
    BitmapHeap,
}

///
/// CustomPath
///
/// Planner path entry standing in for an unsupported native strategy.
/// Cost, row estimate, ordering, and parallel-safety fields are copied
/// verbatim from the wrapped source path; the wrapped path itself is kept
/// for plan lowering.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CustomPath {
    pub info: PathInfo,
    pub strategy: PathStrategy,
    pub source: BitmapHeapPath,
}

impl CustomPath {
    /// Wrap a native bitmap-heap path.
    #[must_use]
    pub fn from_bitmap_heap(source: BitmapHeapPath) -> Self {
        Self {
            info: source.info.clone(),
            strategy: PathStrategy::BitmapHeap,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::descr::IndexId;
    use crate::host::path::{BitmapQualPath, PathCost, PathKey};

    #[test]
    fn wrapping_copies_source_fields_verbatim() {
        let source = BitmapHeapPath {
            info: PathInfo {
                cost: PathCost::new(1.5, 42.0),
                rows: 17.0,
                path_keys: vec![PathKey {
                    field: "id".to_string(),
                    descending: false,
                }],
                parallel_aware: false,
                parallel_safe: true,
                parallel_workers: 0,
            },
            bitmap_qual: BitmapQualPath::IndexPath {
                index_id: IndexId(3),
                index_quals: vec![],
            },
        };

        let custom = CustomPath::from_bitmap_heap(source.clone());
        assert_eq!(custom.info, source.info);
        assert_eq!(custom.strategy, PathStrategy::BitmapHeap);
        assert_eq!(custom.source, source);
    }
}
