//! Property tests for endpoint normalization.

use proptest::prelude::*;
use request_governor::governor::normalizer::{normalize, ID_TOKEN, MAX_KEY_LEN};

fn url_like() -> impl Strategy<Value = String> {
    let origin = prop_oneof![
        Just(String::new()),
        "https?://[a-z]{1,10}(\\.[a-z]{2,3})?(:[0-9]{2,4})?",
    ];
    let segment = prop_oneof![
        "[a-z_-]{1,12}",
        "[0-9]{1,9}",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "v[0-9]",
    ];
    let query = prop_oneof![Just(String::new()), "\\?[a-z]{1,5}=[a-z0-9]{0,8}(&[a-z]{1,5}=[0-9]{1,3})?"];

    (origin, prop::collection::vec(segment, 0..40), query)
        .prop_map(|(origin, segments, query)| {
            let path: String = segments.iter().map(|s| format!("/{s}")).collect();
            format!("{origin}{path}{query}")
        })
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in url_like()) {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_output_is_bounded_path(raw in url_like()) {
        let normalized = normalize(&raw);
        prop_assert!(normalized.len() <= MAX_KEY_LEN);
        prop_assert!(normalized.starts_with('/'));
        prop_assert!(!normalized.contains('?'));
        prop_assert!(!normalized.contains("://"));
    }

    #[test]
    fn normalize_leaves_no_numeric_segments(raw in url_like()) {
        let normalized = normalize(&raw);
        for segment in normalized.split('/') {
            prop_assert!(
                segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()),
                "numeric segment survived in {}", normalized
            );
        }
    }

    #[test]
    fn ids_collapse_to_one_key(a in 0u64..1_000_000, b in 0u64..1_000_000) {
        prop_assert_eq!(
            normalize(&format!("/items/{a}/reviews")),
            normalize(&format!("https://api.example.com/items/{b}/reviews?page=2"))
        );
        prop_assert_eq!(normalize(&format!("/items/{a}")), format!("/items/{ID_TOKEN}"));
    }

    #[test]
    fn arbitrary_input_never_panics(raw in ".{0,300}") {
        let normalized = normalize(&raw);
        prop_assert!(normalized.len() <= MAX_KEY_LEN);
    }
}
