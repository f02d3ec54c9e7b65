//! Lookup Test Utilities
//!
//! Centralized test infrastructure for the lookup workspace:
//! - Fixture tables matching the default registry
//! - Proptest generators for requests and tables
//! - Custom assertions for paging invariants

// Re-export mock source from its storage crate
pub use lookup_storage::{mock_row, MockLookupSource, MockRow};

// Re-export core types for convenience
pub use lookup_core::{
    EngineConfig, FilterValue, LookupDefinition, LookupError, LookupItem, LookupRegistry,
    LookupRequest, LookupResponse, LookupResult, LookupStrategy, PagedLookupResult,
    ValidationError,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Seed data for the default registry's tables.

    use super::*;

    /// Countries in `Ref_Country`: `(IsoCode, CountryName)`.
    pub const COUNTRIES: &[(&str, &str)] = &[
        ("CA", "Canada"),
        ("DE", "Germany"),
        ("FR", "France"),
        ("GB", "United Kingdom"),
        ("MX", "Mexico"),
        ("US", "United States"),
    ];

    /// States in `Ref_State`: `(Id, StateName, CountryId)`.
    pub const STATES: &[(&str, &str, Option<&str>)] = &[
        ("1", "Alabama", Some("US")),
        ("2", "Alaska", Some("US")),
        ("3", "California", Some("US")),
        ("4", "Texas", Some("US")),
        ("5", "Ontario", Some("CA")),
        ("6", "Quebec", Some("CA")),
        ("7", "Bavaria", Some("DE")),
        ("8", "Unassigned Territory", None),
    ];

    /// Registry with the standard lookups.
    pub fn registry() -> LookupRegistry {
        LookupRegistry::with_defaults().expect("default registry should build")
    }

    /// `n` providers named `Provider 001`..; every third is a clinic.
    pub fn provider_rows(n: usize) -> Vec<MockRow> {
        (1..=n)
            .map(|i| {
                let id = i.to_string();
                let name = if i % 3 == 0 {
                    format!("Clinic {i:03}")
                } else {
                    format!("Provider {i:03}")
                };
                mock_row([("Id", Some(id.as_str())), ("DisplayName", Some(name.as_str()))])
            })
            .collect()
    }

    /// Users in `AppUsers`, including labels with pattern metacharacters.
    pub fn user_rows() -> Vec<MockRow> {
        [
            ("u1", "Alice Smith"),
            ("u2", "Bob Smith"),
            ("u3", "Carol Jones"),
            ("u4", "Dan 100% Real"),
            ("u5", "Eve_Underscore"),
        ]
        .into_iter()
        .map(|(id, name)| mock_row([("UserId", Some(id)), ("FullName", Some(name))]))
        .collect()
    }

    /// Mock source holding every default table, with `providers` rows in
    /// `MedicalProviders`.
    pub fn source_with_providers(providers: usize) -> MockLookupSource {
        MockLookupSource::new()
            .with_table(
                "Ref_Country",
                COUNTRIES
                    .iter()
                    .map(|(code, name)| {
                        mock_row([("IsoCode", Some(*code)), ("CountryName", Some(*name))])
                    })
                    .collect(),
            )
            .with_table(
                "Ref_State",
                STATES
                    .iter()
                    .map(|(id, name, country)| {
                        mock_row([
                            ("Id", Some(*id)),
                            ("StateName", Some(*name)),
                            ("CountryId", *country),
                        ])
                    })
                    .collect(),
            )
            .with_table("MedicalProviders", provider_rows(providers))
            .with_table("AppUsers", user_rows())
    }

    /// Mock source with the default tables and 45 providers.
    pub fn source() -> MockLookupSource {
        source_with_providers(45)
    }

    /// Number of states whose `CountryId` is `country`.
    pub fn states_in(country: &str) -> usize {
        STATES.iter().filter(|(_, _, c)| *c == Some(country)).count()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for lookup requests.

    use super::*;
    use proptest::prelude::*;

    /// A syntactically valid lookup key.
    pub fn arb_lookup_key() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_]{1,50}"
    }

    /// A key that fails validation: empty, too long, or with bad characters.
    pub fn arb_invalid_lookup_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[A-Za-z0-9_]{51,80}",
            "[A-Za-z0-9_]{0,10}[ ;'\\-.%][A-Za-z0-9_]{0,10}",
        ]
    }

    /// A filter parameter of any accepted JSON kind.
    pub fn arb_filter_value() -> impl Strategy<Value = FilterValue> {
        prop_oneof![
            Just(FilterValue::Null),
            any::<bool>().prop_map(FilterValue::from),
            any::<i64>().prop_map(FilterValue::from),
            "[A-Za-z0-9]{0,8}".prop_map(FilterValue::from),
        ]
    }

    /// Valid `(page, page_size)` for the default limits.
    pub fn arb_paging() -> impl Strategy<Value = (i64, i64)> {
        (1i64..20, 1i64..=100)
    }

    /// A search term, sometimes blank.
    pub fn arb_search_term() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("   ".to_string())),
            "[a-z0-9 ]{1,6}".prop_map(Some),
        ]
    }

    /// A request against one of the default lookups.
    pub fn arb_default_request() -> impl Strategy<Value = LookupRequest> {
        (
            prop::sample::select(vec!["Countries", "States", "MedicalProviders", "Users"]),
            arb_search_term(),
            arb_paging(),
        )
            .prop_map(|(key, search, (page, page_size))| {
                let mut request = LookupRequest::new(key).with_page(page, page_size);
                request.search_term = search;
                request
            })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over lookup results.

    use super::*;

    /// Assert that a LookupResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &LookupResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a LookupResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &LookupResult<T>) {
        match result {
            Err(LookupError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a LookupResult is a Source error.
    #[track_caller]
    pub fn assert_source_error<T: std::fmt::Debug>(result: &LookupResult<T>) {
        match result {
            Err(LookupError::Source(_)) => {}
            other => panic!("Expected Source error, got: {:?}", other),
        }
    }

    /// Assert that a LookupResult is a cancellation or timeout.
    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &LookupResult<T>) {
        match result {
            Err(e) if e.is_cancelled() => {}
            other => panic!("Expected Cancelled or Timeout, got: {:?}", other),
        }
    }

    /// Assert the paging invariants of one page of a filtered set of
    /// `total` rows starting at `offset`.
    #[track_caller]
    pub fn assert_page_consistent(result: &PagedLookupResult, offset: u64, page_size: u64) {
        let expected = result.total_count.saturating_sub(offset).min(page_size);
        assert_eq!(
            result.items.len() as u64,
            expected,
            "page holds {} items, expected {} (total {}, offset {}, size {})",
            result.items.len(),
            expected,
            result.total_count,
            offset,
            page_size
        );
        assert_eq!(
            result.has_more,
            offset + page_size < result.total_count,
            "has_more disagrees with offset {} + size {} vs total {}",
            offset,
            page_size,
            result.total_count
        );
    }

    /// Assert that a whole-set result is self-consistent.
    #[track_caller]
    pub fn assert_whole_set(result: &PagedLookupResult) {
        assert_eq!(result.total_count, result.items.len() as u64);
        assert!(!result.has_more, "whole-set result must not report more");
    }
}
