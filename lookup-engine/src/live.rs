//! Live strategy: page and filter in the data source.

use lookup_core::{LookupDefinition, LookupRequest, PagedLookupResult};
use lookup_storage::{PageQuery, PageRows, Predicate};

/// Translate a request into a [`PageQuery`].
///
/// Identifiers come only from the definition; the search term and the
/// filter parameter travel as values.
pub fn page_query(definition: &LookupDefinition, request: &LookupRequest) -> PageQuery {
    let limit = u64::try_from(request.page_size).unwrap_or(0);
    let mut query = PageQuery::for_definition(definition, limit).with_offset(request.offset());

    if let Some(term) = request.effective_search() {
        query = query.with_predicate(Predicate::LabelContains {
            column: definition.label_column.clone(),
            term: term.to_string(),
        });
    }

    if let Some(column) = &definition.filter_column {
        if let Some(value) = request.parameter(column.as_str()) {
            let predicate = match value.canonical() {
                Some(value) => Predicate::Equals {
                    column: column.clone(),
                    value,
                },
                None => Predicate::IsNull {
                    column: column.clone(),
                },
            };
            query = query.with_predicate(predicate);
        }
    }

    query
}

/// Wrap source rows as a page of the result.
pub fn to_result(rows: PageRows, query: &PageQuery) -> PagedLookupResult {
    PagedLookupResult::page(rows.items, rows.total_count, query.offset, query.limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::{FilterValue, LookupItem};

    fn providers() -> LookupDefinition {
        LookupDefinition::live("Providers", "MedicalProviders", "Id", "DisplayName")
            .unwrap()
            .with_filter_column("SpecialtyId")
            .unwrap()
    }

    #[test]
    fn test_offset_from_page() {
        let query = page_query(&providers(), &LookupRequest::new("Providers").with_page(3, 20));
        assert_eq!(query.offset, 40);
        assert_eq!(query.limit, 20);
        assert!(query.predicates.is_empty());
    }

    #[test]
    fn test_predicates_from_search_and_parameter() {
        let request = LookupRequest::new("Providers")
            .with_search("smith")
            .with_parameter("SpecialtyId", 7i64);
        let query = page_query(&providers(), &request);
        assert_eq!(
            query.predicates,
            vec![
                Predicate::LabelContains {
                    column: providers().label_column,
                    term: "smith".to_string(),
                },
                Predicate::Equals {
                    column: providers().filter_column.unwrap(),
                    value: "7".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_null_parameter_becomes_is_null() {
        let request =
            LookupRequest::new("Providers").with_parameter("SpecialtyId", FilterValue::Null);
        let query = page_query(&providers(), &request);
        assert!(matches!(query.predicates[0], Predicate::IsNull { .. }));
    }

    #[test]
    fn test_parameter_without_filter_column_is_ignored() {
        let def = LookupDefinition::live("Users", "AppUsers", "UserId", "FullName").unwrap();
        let request = LookupRequest::new("Users").with_parameter("SpecialtyId", 7i64);
        assert!(page_query(&def, &request).predicates.is_empty());
    }

    #[test]
    fn test_has_more_from_window() {
        let query = page_query(&providers(), &LookupRequest::new("Providers").with_page(2, 20));
        let rows = PageRows {
            items: vec![LookupItem::new("1", "A"); 20],
            total_count: 45,
        };
        assert!(to_result(rows.clone(), &query).has_more);
        let last = page_query(&providers(), &LookupRequest::new("Providers").with_page(3, 20));
        assert!(!to_result(rows, &last).has_more);
    }
}
