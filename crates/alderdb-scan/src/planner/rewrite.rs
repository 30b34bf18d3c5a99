//! Planning-time path rewrite for engine-backed relations.
//!
//! Replaces native scan strategies the engine cannot execute with opaque
//! custom paths, strips parallel candidates, and reshapes index candidates
//! so the planner can discover index-only opportunities.

use crate::{
    engine::{cursor::ScanSource, descr::RelationId, descr::TableDescr},
    error::InternalError,
    host::{
        path::{IndexCandidate, NativePath, PathEntry, PlainScanKind, RelPathSet},
        plan::{Expr, TargetEntry},
    },
    obs::{self, MetricsEvent},
    planner::path::CustomPath,
};

/// Previously-installed relation path hook, invoked after this rewriter.
pub type RelPathHook<'a> = &'a dyn Fn(RelationId, &mut RelPathSet);

/// Rewrite a relation's candidate paths for engine execution.
///
/// Relations not backed by the engine pass through untouched.
pub fn rewrite_rel_paths<S: ScanSource>(
    source: &S,
    relation: RelationId,
    set: &mut RelPathSet,
) -> Result<(), InternalError> {
    rewrite_rel_paths_chained(source, relation, set, None)
}

/// Rewrite a relation's candidate paths, then delegate to a previously
/// installed hook when one exists.
pub fn rewrite_rel_paths_chained<S: ScanSource>(
    source: &S,
    relation: RelationId,
    set: &mut RelPathSet,
    prev_hook: Option<RelPathHook<'_>>,
) -> Result<(), InternalError> {
    if let Some(descr) = source.relation_descr(relation) {
        reject_sample_scans(descr, set)?;
        wrap_bitmap_heap_paths(set);
        strip_partial_paths(set);
    }

    if let Some(hook) = prev_hook {
        hook(relation, set);
    }

    Ok(())
}

// Sample scans have no engine equivalent and are not degraded; fail the
// whole rewrite before any mutation so the path list stays intact.
fn reject_sample_scans(descr: &TableDescr, set: &RelPathSet) -> Result<(), InternalError> {
    let sampled = set.paths.iter().any(|entry| {
        matches!(
            entry,
            PathEntry::Native(NativePath::Plain {
                kind: PlainScanKind::SampleScan,
                ..
            })
        )
    });

    if sampled {
        return Err(InternalError::sample_scan_unsupported(&descr.name));
    }
    Ok(())
}

// Replace each bitmap-heap entry, in position, with an opaque custom path.
// The list is rebuilt into a fresh sequence and swapped in, preserving
// relative order without positional deletes.
fn wrap_bitmap_heap_paths(set: &mut RelPathSet) {
    let paths = std::mem::take(&mut set.paths);
    let mut rebuilt = Vec::with_capacity(paths.len());

    for entry in paths {
        match entry {
            PathEntry::Native(NativePath::BitmapHeap(path)) => {
                obs::record(MetricsEvent::PathRewritten);
                rebuilt.push(PathEntry::Custom(CustomPath::from_bitmap_heap(path)));
            }
            other => rebuilt.push(other),
        }
    }

    set.paths = rebuilt;
}

// Parallel bitmap-heap execution is unsupported; drop every partial
// candidate that is not a plain native path. A silent drop, not an error:
// the planner is free to fall back to another parallel-safe strategy.
fn strip_partial_paths(set: &mut RelPathSet) {
    let partial = std::mem::take(&mut set.partial_paths);
    let mut kept = Vec::with_capacity(partial.len());

    for entry in partial {
        if entry.is_plain_native() {
            kept.push(entry);
        } else {
            obs::record(MetricsEvent::PartialPathDropped);
        }
    }

    set.partial_paths = kept;
}

/// Extend secondary index candidates with the table's primary-key columns
/// so the planner's cost model can discover index-only execution.
///
/// Candidates whose partial-index predicate is not proven satisfiable are
/// left visibly non-matching for clause matching. Returns `true` when,
/// after augmentation, no candidate still matches a restriction clause;
/// the planner uses this for column-presence optimization eligibility.
pub fn augment_index_candidates(
    descr: &TableDescr,
    candidates: &mut [IndexCandidate],
    restriction_clauses: &[Expr],
) -> bool {
    let Some(primary) = descr.primary() else {
        return true;
    };

    for (pk_field, _) in &primary.fields {
        for candidate in candidates.iter_mut() {
            let member = candidate.columns.iter().any(|column| column == pk_field);
            if member {
                continue;
            }
            candidate.columns.push(pk_field.clone());
            candidate.can_return.push(true);
            candidate.target_list.push(TargetEntry::column(pk_field.clone()));
        }
    }

    let mut any_match = false;
    for candidate in candidates.iter() {
        if candidate.predicate.is_some() && !candidate.predicate_proven {
            continue;
        }
        if candidate.matches_restriction_clauses(restriction_clauses) {
            any_match = true;
        }
    }

    !any_match
}
