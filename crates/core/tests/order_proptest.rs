//! Property-based tests for the portable value order.
//!
//! Every bound-strength and disjointness decision relies on `compare_values`
//! being a total order that agrees with structural equality.

use proptest::prelude::*;
use std::cmp::Ordering;
use strata_core::{compare_values, JsonObject, JsonValue};

/// Strategy for scalar values, including NaN and mixed types.
fn scalar_strategy() -> impl Strategy<Value = JsonValue> {
    prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        (-100i64..100).prop_map(JsonValue::from),
        prop_oneof![Just(f64::NAN), -10.0f64..10.0].prop_map(JsonValue::Number),
        "[a-c]{0,3}".prop_map(JsonValue::from),
    ]
}

/// Strategy for nested values.
fn value_strategy() -> impl Strategy<Value = JsonValue> {
    scalar_strategy().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
            prop::collection::vec(("[a-c]", inner), 0..3).prop_map(|entries| {
                let mut obj = JsonObject::new();
                for (k, v) in entries {
                    obj.insert(k, v);
                }
                JsonValue::Object(obj)
            }),
        ]
    })
}

proptest! {
    /// Property: the order is antisymmetric.
    #[test]
    fn order_is_antisymmetric(a in value_strategy(), b in value_strategy()) {
        prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
    }

    /// Property: the order is transitive.
    #[test]
    fn order_is_transitive(a in value_strategy(), b in value_strategy(), c in value_strategy()) {
        if compare_values(&a, &b) != Ordering::Greater && compare_values(&b, &c) != Ordering::Greater {
            prop_assert_ne!(compare_values(&a, &c), Ordering::Greater);
        }
    }

    /// Property: `Equal` coincides with structural equality.
    #[test]
    fn equal_iff_structurally_equal(a in value_strategy(), b in value_strategy()) {
        prop_assert_eq!(compare_values(&a, &b) == Ordering::Equal, a == b);
    }

    /// Property: text serialization of values without NaN or infinities is
    /// stable after one round trip; the others have no text form.
    #[test]
    fn text_round_trip(a in value_strategy()) {
        match a.to_json_string() {
            Ok(text) => {
                prop_assert!(a.is_finite());
                let parsed = JsonValue::parse(&text).unwrap();
                prop_assert_eq!(parsed.to_json_string().unwrap(), text);
            }
            Err(_) => prop_assert!(!a.is_finite()),
        }
    }
}
