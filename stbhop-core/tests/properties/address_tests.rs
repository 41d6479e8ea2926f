//! Property-based tests for device address validation

use proptest::prelude::*;
use stbhop_core::{HopError, is_valid_address, parse_device_address};

// ========== Strategies ==========

/// Four octets in range, rendered without leading zeros
fn arb_valid_address() -> impl Strategy<Value = String> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
}

/// One octet out of range
fn arb_out_of_range_address() -> impl Strategy<Value = String> {
    (256u32..1000, 0usize..4, any::<[u8; 4]>()).prop_map(|(bad, slot, octets)| {
        let parts: Vec<String> = octets
            .iter()
            .enumerate()
            .map(|(i, o)| if i == slot { bad.to_string() } else { o.to_string() })
            .collect();
        parts.join(".")
    })
}

/// Wrong number of octets
fn arb_wrong_arity_address() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..4),
        prop::collection::vec(any::<u8>(), 5..8),
    ]
    .prop_map(|octets| {
        octets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn in_range_quads_are_valid(address in arb_valid_address()) {
        prop_assert!(is_valid_address(&address), "{} should be valid", address);
        prop_assert_eq!(parse_device_address(&address).ok(), Some(address.as_str()));
    }

    #[test]
    fn out_of_range_octets_are_rejected(address in arb_out_of_range_address()) {
        prop_assert!(!is_valid_address(&address), "{} should be invalid", address);
        prop_assert!(matches!(parse_device_address(&address), Err(HopError::InvalidAddress(_))));
    }

    #[test]
    fn wrong_octet_count_is_rejected(address in arb_wrong_arity_address()) {
        prop_assert!(!is_valid_address(&address), "{} should be invalid", address);
    }

    #[test]
    fn surrounding_text_is_rejected(
        address in arb_valid_address(),
        prefix in "[ a-z:/]{0,3}",
        suffix in "[ a-z:/\n]{0,3}",
    ) {
        prop_assume!(!prefix.is_empty() || !suffix.is_empty());
        let candidate = format!("{prefix}{address}{suffix}");
        prop_assert!(!is_valid_address(&candidate), "{:?} should be invalid", candidate);
    }

    #[test]
    fn validation_agrees_with_std_parser_for_canonical_input(s in "[0-9.]{1,16}") {
        // std rejects leading zeros, which this validator accepts
        let canonical = s.split('.').all(|p| p.len() <= 1 || !p.starts_with('0'));
        if canonical {
            prop_assert_eq!(is_valid_address(&s), s.parse::<std::net::Ipv4Addr>().is_ok());
        }
    }
}
