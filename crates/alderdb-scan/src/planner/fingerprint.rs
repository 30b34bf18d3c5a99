//! Deterministic fingerprinting for custom scan plans.

use crate::{
    host::plan::{Expr, SubPlan, TargetEntry},
    planner::plan::{CustomScanPlan, PlanStrategy},
};
use sha2::{Digest, Sha256};

///
/// PlanFingerprint
///
/// Stable, deterministic fingerprint for custom scan plans. Cost fields
/// are excluded: two plans that differ only in caller-filled estimates
/// fingerprint identically.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PlanFingerprint([u8; 32]);

impl PlanFingerprint {
    #[must_use]
    pub fn as_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl std::fmt::Display for PlanFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl CustomScanPlan {
    /// Compute a stable fingerprint for this plan.
    #[must_use]
    pub fn fingerprint(&self) -> PlanFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"scanplanfp:v1");

        write_tag(&mut hasher, 0x01);
        match self.strategy {
            PlanStrategy::BitmapHeap { key_type } => {
                write_tag(&mut hasher, 0x10);
                write_str(&mut hasher, &key_type.to_string());
            }
        }

        write_tag(&mut hasher, 0x02);
        hasher.update(self.relation.0.to_be_bytes());

        write_tag(&mut hasher, 0x03);
        hash_targets(&mut hasher, &self.target_list);

        write_tag(&mut hasher, 0x04);
        hash_quals(&mut hasher, &self.residual_quals);

        write_tag(&mut hasher, 0x05);
        hash_quals(&mut hasher, &self.recheck_quals);

        write_tag(&mut hasher, 0x06);
        hash_subplan(&mut hasher, &self.bitmap_subplan);

        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        PlanFingerprint(out)
    }
}

fn hash_targets(hasher: &mut Sha256, targets: &[TargetEntry]) {
    write_len(hasher, targets.len());
    for target in targets {
        write_str(hasher, &target.name);
        write_str(hasher, &target.expr.to_string());
    }
}

fn hash_quals(hasher: &mut Sha256, quals: &[Expr]) {
    write_len(hasher, quals.len());
    for qual in quals {
        write_str(hasher, &qual.to_string());
    }
}

fn hash_subplan(hasher: &mut Sha256, plan: &SubPlan) {
    match plan {
        SubPlan::And(children) => {
            write_tag(hasher, 0x20);
            write_len(hasher, children.len());
            for child in children {
                hash_subplan(hasher, child);
            }
        }
        SubPlan::Or(children) => {
            write_tag(hasher, 0x21);
            write_len(hasher, children.len());
            for child in children {
                hash_subplan(hasher, child);
            }
        }
        SubPlan::IndexScan(scan) => {
            write_tag(hasher, 0x22);
            hasher.update(scan.index_id.0.to_be_bytes());
            hash_quals(hasher, &scan.index_quals);
        }
    }
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}

fn write_len(hasher: &mut Sha256, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::path::PathCost;
    use crate::test_support::employees_custom_plan;

    #[test]
    fn fingerprint_is_stable_across_clones() {
        let plan = employees_custom_plan();
        assert_eq!(plan.fingerprint(), plan.clone().fingerprint());
    }

    #[test]
    fn fingerprint_ignores_caller_filled_costs() {
        let plan = employees_custom_plan();
        let mut costed = plan.clone();
        costed.set_cost_estimates(PathCost::new(1.0, 99.0), 42.0);
        assert_eq!(plan.fingerprint(), costed.fingerprint());
    }

    #[test]
    fn fingerprint_differs_for_different_subplans() {
        let plan = employees_custom_plan();
        let mut other = plan.clone();
        other.bitmap_subplan = crate::host::plan::SubPlan::And(vec![plan.bitmap_subplan.clone()]);
        assert_ne!(plan.fingerprint(), other.fingerprint());
    }

    #[test]
    fn hex_rendering_is_64_chars() {
        let plan = employees_custom_plan();
        assert_eq!(plan.fingerprint().as_hex().len(), 64);
    }
}
