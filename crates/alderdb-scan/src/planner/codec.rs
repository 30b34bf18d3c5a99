//! Custom-plan payload codec for cached-plan transport.

use crate::{error::InternalError, planner::plan::CustomScanPlan};

/// Encode a custom scan plan for transport or caching.
pub fn encode_plan(plan: &CustomScanPlan) -> Result<Vec<u8>, InternalError> {
    serde_cbor::to_vec(plan).map_err(|err| {
        InternalError::serialize_internal(format!("failed to encode custom scan plan: {err}"))
    })
}

/// Decode a custom scan plan produced by [`encode_plan`].
pub fn decode_plan(bytes: &[u8]) -> Result<CustomScanPlan, InternalError> {
    serde_cbor::from_slice(bytes).map_err(|err| {
        InternalError::serialize_internal(format!("failed to decode custom scan plan: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::employees_custom_plan;

    #[test]
    fn encoded_plans_decode_to_the_same_fingerprint() {
        let plan = employees_custom_plan();
        let bytes = encode_plan(&plan).unwrap();
        let decoded = decode_plan(&bytes).unwrap();
        assert_eq!(decoded.fingerprint(), plan.fingerprint());
    }

    #[test]
    fn garbage_bytes_fail_with_a_serialize_error() {
        let err = decode_plan(&[0xff, 0x00, 0x13]).unwrap_err();
        assert_eq!(err.origin, crate::error::ErrorOrigin::Serialize);
    }
}
