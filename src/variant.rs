//! Deterministic weighted variant assignment.
//!
//! A user's bucket is `crc32(flag_name ++ user_id) % 100`; variants claim
//! cumulative weight ranges in definition order. Pure function of its
//! inputs, so the same user always sees the same variant for a given flag
//! configuration — including when analytics re-derives historical
//! attribution.

use crate::model::Variant;

/// Bucket in `[0, 99]` for a `(flag, user)` pair.
///
/// CRC-32 (IEEE) of the flag name concatenated with the string user id.
/// The checksum matches zlib/PHP `crc32`, keeping buckets reproducible
/// across processes and implementations.
pub fn bucket(flag_name: &str, user_id: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(flag_name.as_bytes());
    hasher.update(user_id.as_bytes());
    hasher.finalize() % 100
}

/// The variant whose cumulative weight range contains the user's bucket,
/// or `None` when the flag has no variants or the weights sum to less than
/// `bucket + 1`.
pub fn assign<'a>(flag_name: &str, user_id: &str, variants: &'a [Variant]) -> Option<&'a str> {
    pick(bucket(flag_name, user_id), variants)
}

fn pick(bucket: u32, variants: &[Variant]) -> Option<&str> {
    let mut cumulative: u32 = 0;
    for variant in variants {
        cumulative = cumulative.saturating_add(variant.weight);
        if bucket < cumulative {
            return Some(&variant.name);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab(a: u32, b: u32) -> Vec<Variant> {
        vec![Variant::new("control", a), Variant::new("treatment", b)]
    }

    #[test]
    fn assignment_is_deterministic() {
        let variants = ab(50, 50);
        let first = assign("FF-rollout", "alice", &variants);
        for _ in 0..100 {
            assert_eq!(assign("FF-rollout", "alice", &variants), first);
        }
    }

    #[test]
    fn known_crc32_vectors() {
        // zlib.crc32("FF-rollout" + id) % 100, precomputed:
        //   alice → 33, bob → 16, carol → 77, dave → 66
        assert_eq!(bucket("FF-rollout", "alice"), 33);
        assert_eq!(bucket("FF-rollout", "bob"), 16);
        assert_eq!(bucket("FF-rollout", "carol"), 77);
        assert_eq!(bucket("FF-rollout", "dave"), 66);

        let variants = ab(50, 50);
        assert_eq!(assign("FF-rollout", "alice", &variants), Some("control"));
        assert_eq!(assign("FF-rollout", "bob", &variants), Some("control"));
        assert_eq!(assign("FF-rollout", "carol", &variants), Some("treatment"));
        assert_eq!(assign("FF-rollout", "dave", &variants), Some("treatment"));
    }

    #[test]
    fn buckets_partition_with_no_overlap_or_gap() {
        let variants = vec![
            Variant::new("a", 10),
            Variant::new("b", 40),
            Variant::new("c", 50),
        ];
        for bucket in 0..100 {
            let expected = match bucket {
                0..=9 => "a",
                10..=49 => "b",
                _ => "c",
            };
            assert_eq!(pick(bucket, &variants), Some(expected), "bucket {}", bucket);
        }
    }

    #[test]
    fn order_determines_ranges() {
        let forward = ab(30, 70);
        let reversed = vec![Variant::new("treatment", 70), Variant::new("control", 30)];
        assert_eq!(pick(10, &forward), Some("control"));
        assert_eq!(pick(10, &reversed), Some("treatment"));
    }

    #[test]
    fn underweight_leaves_high_buckets_unassigned() {
        // carol buckets at 77; 30+30 covers only [0, 59]
        let variants = ab(30, 30);
        assert_eq!(assign("FF-rollout", "carol", &variants), None);
        assert_eq!(assign("FF-rollout", "dave", &variants), None);
        assert_eq!(assign("FF-rollout", "bob", &variants), Some("control"));
    }

    #[test]
    fn no_variants_means_no_assignment() {
        assert_eq!(assign("FF-rollout", "alice", &[]), None);
    }
}
