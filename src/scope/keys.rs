//! Well-known metadata tags and lifecycle request kinds
//!
//! The `@@scopemux/` prefix keeps these out of the way of ordinary
//! application request kinds and metadata keys.

/// Metadata key carrying the target namespace
pub const NAMESPACE_TAG: &str = "@@scopemux/NAMESPACE";

/// Metadata key carrying the target instance id (or a map of ids for bulk register)
pub const INSTANCE_TAG: &str = "@@scopemux/INSTANCE";

/// Request kind that allocates one or more instance slices
pub const REGISTER: &str = "@@scopemux/REGISTER";

/// Request kind that removes one or more instance slices
pub const UNREGISTER: &str = "@@scopemux/UNREGISTER";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct_and_prefixed() {
        let keys = [NAMESPACE_TAG, INSTANCE_TAG, REGISTER, UNREGISTER];
        for (i, a) in keys.iter().enumerate() {
            assert!(a.starts_with("@@scopemux/"));
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
