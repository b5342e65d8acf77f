// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS - feepool-core
//
// Codec and threshold invariants over arbitrary inputs.
// Run: cargo test -p feepool-core --test prop_core
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use feepool_core::codec::{
    decode_cache_history, decode_distribution, decode_recipients, encode_cache_history,
    encode_distribution,
};
use feepool_core::{distribution_threshold, CacheHistory, DistributionData, Recipients};
use proptest::prelude::*;

proptest! {
    /// PROPERTY: any set of unique (block, amount) pairs survives encode → decode
    #[test]
    fn prop_cache_history_round_trip(
        history in prop::collection::btree_map(any::<u64>(), 0i64..=i64::MAX, 0..64),
    ) {
        let history: CacheHistory = history;
        let encoded = encode_cache_history(&history);
        let (decoded, errors) = decode_cache_history(&encoded);
        prop_assert!(errors.is_empty());
        prop_assert_eq!(decoded, history);
    }

    /// PROPERTY: encoded cache values never carry a trailing separator
    #[test]
    fn prop_cache_value_has_no_trailing_separator(
        history in prop::collection::btree_map(any::<u64>(), 0i64..=i64::MAX, 1..16),
    ) {
        let encoded = encode_cache_history(&history);
        prop_assert!(!encoded.ends_with(','));
        prop_assert_eq!(encoded.matches(',').count(), history.len() - 1);
    }

    /// PROPERTY: decoding arbitrary text never panics and yields only non-negative amounts
    #[test]
    fn prop_cache_decode_total(raw in ".{0,128}") {
        let (decoded, _) = decode_cache_history(&raw);
        prop_assert!(decoded.values().all(|v| *v >= 0));
    }

    /// PROPERTY: distribution header and recipients survive encode → decode
    #[test]
    fn prop_distribution_round_trip(
        block in any::<u64>(),
        asset_id in any::<u32>(),
        recipients in prop::collection::btree_map("[a-zA-Z0-9]{1,34}", 0i64..1_000_000_000, 0..20),
    ) {
        let recipients: Recipients = recipients;
        let total: i64 = recipients.values().sum();
        let data = DistributionData { asset_id, block, total };
        let encoded = encode_distribution(&data, &recipients);
        let (decoded, raw_recipients) = decode_distribution(&encoded).unwrap();
        prop_assert_eq!(decoded, data);
        let (decoded_recipients, errors) = decode_recipients(raw_recipients);
        prop_assert!(errors.is_empty());
        prop_assert_eq!(decoded_recipients, recipients);
    }

    /// PROPERTY: threshold is never below 1 for any non-negative supply
    #[test]
    fn prop_threshold_at_least_one(supply in 0i64..=i64::MAX, divisor in 1i64..=1_000_000_000) {
        prop_assert!(distribution_threshold(supply, divisor) >= 1);
    }

    /// PROPERTY: threshold never exceeds total supply once supply reaches 1
    #[test]
    fn prop_threshold_bounded_by_supply(supply in 1i64..=i64::MAX, divisor in 1i64..=1_000_000_000) {
        prop_assert!(distribution_threshold(supply, divisor) <= supply);
    }
}
