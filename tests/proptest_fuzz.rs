// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for input handling.
//!
//! Uses proptest to generate random/malformed inputs and verify the service
//! never panics, only returns clean errors.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use country_service::cache::envelope;
use country_service::record::RawCountry;
use country_service::{CacheKey, CountryQuery, CountryRecord, ImageEntry, SortDirection, SortField};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn sort_field_strategy() -> impl Strategy<Value = SortField> {
    prop::sample::select(SortField::ALL.to_vec())
}

fn direction_strategy() -> impl Strategy<Value = SortDirection> {
    prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)]
}

fn query_strategy() -> impl Strategy<Value = CountryQuery> {
    (prop::option::of(1i64..10_000), sort_field_strategy(), direction_strategy())
        .prop_map(|(limit, field, dir)| CountryQuery::new(limit, field, dir).unwrap())
}

// =============================================================================
// Cache envelope decoding
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary cache content never panics the decoder
    #[test]
    fn fuzz_envelope_decode_arbitrary_string(raw in ".*") {
        let _ = envelope::decode::<CountryRecord>(&raw);
        let _ = envelope::decode::<Vec<CountryRecord>>(&raw);
        let _ = envelope::decode::<Vec<ImageEntry>>(&raw);
    }

    /// Arbitrary JSON, wrapped or not, never panics the decoder
    #[test]
    fn fuzz_envelope_decode_arbitrary_json(data in arbitrary_json_strategy(), v in any::<u32>()) {
        let bare = data.to_string();
        let wrapped = json!({"kind": "country", "v": v, "data": data}).to_string();
        let _ = envelope::decode::<CountryRecord>(&bare);
        let _ = envelope::decode::<CountryRecord>(&wrapped);
        let _ = envelope::decode::<Vec<CountryRecord>>(&wrapped);
    }

    /// A stored record always decodes back under its own kind only
    #[test]
    fn fuzz_envelope_kind_is_checked(
        name in "[A-Za-z ]{1,20}",
        population in 0u64..10_000_000_000,
        area in 0.001f64..20_000_000.0,
    ) {
        let record = CountryRecord::new(name, "Region", population, area).unwrap();
        let raw = envelope::encode(&record).unwrap();
        prop_assert_eq!(envelope::decode::<CountryRecord>(&raw).unwrap(), record);
        prop_assert!(envelope::decode::<Vec<CountryRecord>>(&raw).is_err());
        prop_assert!(envelope::decode::<Vec<ImageEntry>>(&raw).is_err());
    }
}

// =============================================================================
// Upstream payload parsing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary upstream entries produce a record or a clean error
    #[test]
    fn fuzz_raw_country_arbitrary_json(value in arbitrary_json_strategy(), index in 0usize..1000) {
        if let Ok(raw) = RawCountry::from_value(index, &value) {
            let _ = raw.into_record();
        }
    }

    /// Density is exactly population / area whenever area is positive
    #[test]
    fn fuzz_density_invariant(
        population in any::<u32>(),
        area in 0.0001f64..1e9,
    ) {
        let value = json!({
            "name": {"common": "Somewhere"},
            "region": "Nowhere",
            "population": population,
            "area": area,
        });
        let record = RawCountry::from_value(0, &value).unwrap().into_record().unwrap();
        prop_assert_eq!(record.population_density, f64::from(population) / area);
    }

    /// Zero or negative area is refused
    #[test]
    fn fuzz_non_positive_area_rejected(population in any::<u32>(), area in -1e9f64..=0.0) {
        prop_assert!(CountryRecord::new("Somewhere", "Nowhere", u64::from(population), area).is_err());
    }
}

// =============================================================================
// Query validation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary parameter strings parse or fail, never panic
    #[test]
    fn fuzz_query_parse_arbitrary(
        limit in prop::option::of(".*"),
        sort_by in prop::option::of(".*"),
        order in prop::option::of(".*"),
    ) {
        let _ = CountryQuery::parse(limit.as_deref(), sort_by.as_deref(), order.as_deref());
    }

    /// Non-positive limits are always rejected
    #[test]
    fn fuzz_non_positive_limit_rejected(limit in i64::MIN..=0) {
        let raw = limit.to_string();
        prop_assert!(CountryQuery::parse(Some(&raw), None, None).is_err());
        prop_assert!(CountryQuery::new(Some(limit), SortField::Name, SortDirection::Asc).is_err());
    }

    /// Unknown sort fields and directions are rejected
    #[test]
    fn fuzz_unknown_sort_rejected(word in "[a-z]{1,12}") {
        let known_field = word.parse::<SortField>().is_ok();
        prop_assert_eq!(CountryQuery::parse(None, Some(&word), None).is_ok(), known_field);
        prop_assert!(CountryQuery::parse(None, None, Some(&word)).is_err() || word == "asc" || word == "desc");
    }

    /// Distinct queries never share a cache key
    #[test]
    fn fuzz_cache_keys_distinct(queries in prop::collection::vec(query_strategy(), 1..40)) {
        let distinct: HashSet<CountryQuery> = queries.iter().copied().collect();
        let keys: HashSet<String> = distinct.iter().map(|q| CacheKey::from(q).to_string()).collect();
        prop_assert_eq!(keys.len(), distinct.len());
    }

    /// A country key never collides with a list key
    #[test]
    fn fuzz_country_key_namespace(name in "[A-Za-z ]{1,30}", query in query_strategy()) {
        let country = CacheKey::country(&name).to_string();
        let images = CacheKey::images(&name).to_string();
        let list = CacheKey::from(&query).to_string();
        prop_assert!(country.starts_with("country:"));
        prop_assert!(images.starts_with("images:"));
        prop_assert_ne!(&country, &list);
        prop_assert_ne!(&images, &list);
    }
}

// =============================================================================
// Sorting
// =============================================================================

proptest! {
    /// Applying a query yields a sorted prefix no longer than the limit
    #[test]
    fn prop_apply_sorted_and_bounded(
        pops in prop::collection::vec(0u64..1_000_000, 0..50),
        query in query_strategy(),
    ) {
        let mut records: Vec<CountryRecord> = pops
            .iter()
            .enumerate()
            .map(|(i, p)| CountryRecord::new(format!("C{:03}", i), "R", *p, 1.0 + i as f64).unwrap())
            .collect();
        let total = records.len();
        query.apply(&mut records);

        if let Some(limit) = query.limit() {
            prop_assert!(records.len() <= limit as usize);
        }
        prop_assert!(records.len() <= total);
        for pair in records.windows(2) {
            let ord = query.sort_by().compare(&pair[0], &pair[1]);
            match query.order() {
                SortDirection::Asc => prop_assert!(ord != std::cmp::Ordering::Greater),
                SortDirection::Desc => prop_assert!(ord != std::cmp::Ordering::Less),
            }
        }
    }
}
