//! Planner-owned access-path surface consumed by the path rewriter.

use crate::{
    engine::descr::IndexId,
    host::plan::{Expr, TargetEntry},
    planner::path::CustomPath,
};
use serde::{Deserialize, Serialize};

///
/// PathCost
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PathCost {
    pub startup: f64,
    pub total: f64,
}

impl PathCost {
    #[must_use]
    pub const fn new(startup: f64, total: f64) -> Self {
        Self { startup, total }
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self {
            startup: 0.0,
            total: 0.0,
        }
    }
}

///
/// PathKey
///
/// One ordering key carried by a path.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathKey {
    pub field: String,
    pub descending: bool,
}

///
/// PathInfo
///
/// Cost, cardinality, ordering, and parallel-safety fields common to every
/// candidate path. The rewriter copies these verbatim when wrapping.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PathInfo {
    pub cost: PathCost,
    pub rows: f64,
    pub path_keys: Vec<PathKey>,
    pub parallel_aware: bool,
    pub parallel_safe: bool,
    pub parallel_workers: u32,
}

impl PathInfo {
    #[must_use]
    pub const fn serial(cost: PathCost, rows: f64) -> Self {
        Self {
            cost,
            rows,
            path_keys: Vec::new(),
            parallel_aware: false,
            parallel_safe: false,
            parallel_workers: 0,
        }
    }
}

///
/// PlainScanKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlainScanKind {
    SeqScan,
    SampleScan,
}

///
/// BitmapQualPath
///
/// Path-time shape of the bitmap producer: AND/OR combinators over
/// single-index candidates.
///

#[derive(Clone, Debug, PartialEq)]
pub enum BitmapQualPath {
    IndexPath {
        index_id: IndexId,
        index_quals: Vec<Expr>,
    },
    And(Vec<BitmapQualPath>),
    Or(Vec<BitmapQualPath>),
}

///
/// BitmapHeapPath
///

#[derive(Clone, Debug, PartialEq)]
pub struct BitmapHeapPath {
    pub info: PathInfo,
    pub bitmap_qual: BitmapQualPath,
}

///
/// NativePath
///

#[derive(Clone, Debug, PartialEq)]
pub enum NativePath {
    Plain { kind: PlainScanKind, info: PathInfo },
    BitmapHeap(BitmapHeapPath),
}

impl NativePath {
    #[must_use]
    pub const fn info(&self) -> &PathInfo {
        match self {
            Self::Plain { info, .. } => info,
            Self::BitmapHeap(path) => &path.info,
        }
    }
}

///
/// PathEntry
///
/// One slot in a relation's candidate path list. Custom entries are the
/// extension point foreign scan providers use.
///

#[derive(Clone, Debug, PartialEq)]
pub enum PathEntry {
    Native(NativePath),
    Custom(CustomPath),
}

impl PathEntry {
    #[must_use]
    pub const fn info(&self) -> &PathInfo {
        match self {
            Self::Native(path) => path.info(),
            Self::Custom(path) => &path.info,
        }
    }

    #[must_use]
    pub const fn is_plain_native(&self) -> bool {
        matches!(self, Self::Native(NativePath::Plain { .. }))
    }
}

///
/// RelPathSet
///
/// The planner's accumulated candidate paths for one relation: the full
/// path list plus the partial (parallel-candidate) list.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelPathSet {
    pub paths: Vec<PathEntry>,
    pub partial_paths: Vec<PathEntry>,
}

///
/// IndexCandidate
///
/// Planner-owned metadata for one index considered for this relation.
/// Mutable in place by providers that reshape index output.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexCandidate {
    pub index_id: IndexId,
    pub columns: Vec<String>,
    pub can_return: Vec<bool>,
    pub target_list: Vec<TargetEntry>,
    pub predicate: Option<Expr>,
    pub predicate_proven: bool,
}

impl IndexCandidate {
    #[must_use]
    pub fn covering(index_id: IndexId, columns: Vec<String>) -> Self {
        let can_return = vec![true; columns.len()];
        let target_list = columns
            .iter()
            .map(|column| TargetEntry::column(column.as_str()))
            .collect();
        Self {
            index_id,
            columns,
            can_return,
            target_list,
            predicate: None,
            predicate_proven: false,
        }
    }

    /// Re-run restriction-clause matching for this candidate.
    ///
    /// True when at least one restriction clause can be matched to one of
    /// the candidate's columns, mirroring the planner's clause matcher.
    #[must_use]
    pub fn matches_restriction_clauses(&self, clauses: &[Expr]) -> bool {
        clauses.iter().any(|clause| match clause {
            Expr::Compare { field, .. } => self.columns.iter().any(|column| column == field),
            Expr::Column(_) | Expr::Literal(_) => false,
        })
    }
}
