//! Planning-time half of the bridge: path rewrite and plan lowering.

pub mod build;
pub mod codec;
pub mod fingerprint;
pub mod path;
pub mod plan;
pub mod rewrite;

pub use build::build_custom_plan;
pub use codec::{decode_plan, encode_plan};
pub use fingerprint::PlanFingerprint;
pub use path::{CustomPath, PathStrategy};
pub use plan::{CustomScanPlan, PlanStrategy};
pub use rewrite::{
    RelPathHook, augment_index_candidates, rewrite_rel_paths, rewrite_rel_paths_chained,
};
