//! Translation of request parameters into a filter and read controls.
//!
//! Query parameters fall into two groups. The reserved keys ([`RESERVED_KEYS`])
//! steer how records are read: projection, population, sort order, offset and
//! limit. Every other key becomes one condition of the filter, and all
//! conditions must hold.
//!
//! # Value coercion
//!
//! Each non-reserved value is coerced by the first rule that applies:
//!
//! 1. `""` matches null (or a missing field).
//! 2. `"true"` / `"false"`, in any case, match the boolean.
//! 3. A leading `!` matches records whose field is *not* equal to the rest of
//!    the value, taken literally.
//! 4. A value containing `,` matches any of the comma separated alternatives.
//! 5. Anything else matches the string exactly.
//!
//! Rule 3 wins over rule 4: `!a,b` means "not equal to `a,b`", never "none of
//! `a` and `b`". Clients depending on negated membership must not expect it.
//!
//! A repeated key (`?tag=a&tag=b`) matches any of its values.
//!
//! # Search
//!
//! A `search_term` path parameter adds a condition matching records where any
//! of the configured [`search_columns`](CrudOptions::search_columns) contains
//! the term, ignoring case. The term is used as a regular expression fragment.

use std::collections::BTreeMap;

use bson::Bson;
use tracing::trace;

use crate::{
    error::CrudResult,
    model::FindOptions,
    options::CrudOptions,
    page::{Pagination, parse_count, parse_limit},
    query::{Expr, Filter},
    request::{QueryValue, Request},
};

/// Query keys that control reading and never become filter conditions.
pub const RESERVED_KEYS: [&str; 5] = ["sort", "populate", "columns", "offset", "limit"];

/// Path parameter carrying a free-text search term.
pub const SEARCH_TERM_PARAM: &str = "search_term";

/// Returns whether `key` is one of the [`RESERVED_KEYS`].
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Everything a list request needs: which records, and how to read them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Conditions every returned record satisfies, `None` for all records.
    pub filter: Option<Expr>,
    /// Projection, population, sort and pagination.
    pub options: FindOptions,
}

/// Translates a request into a [`ListQuery`].
///
/// # Errors
///
/// Returns a configuration error when the request carries a `search_term` but
/// `options` has no search columns.
pub fn translate(request: &Request, options: &CrudOptions) -> CrudResult<ListQuery> {
    let query = ListQuery {
        filter: filter(request, options)?,
        options: find_options(&request.query),
    };

    trace!(target: "crudlayer::translate", filter = ?query.filter, options = ?query.options, "translated list request");

    Ok(query)
}

/// Extracts the read controls from the reserved query keys.
///
/// `columns` and `populate` are lists joined with spaces; a single value counts
/// as a one-element list. `sort` is passed through untouched. `offset` and
/// `limit` are parsed leniently and default to `0`; a negative limit reads as
/// its magnitude.
pub fn find_options(query: &BTreeMap<String, QueryValue>) -> FindOptions {
    let first = |key: &str| query.get(key).and_then(QueryValue::first);

    FindOptions {
        projection: query.get("columns").map(|value| value.as_list().join(" ")),
        populate: query
            .get("populate")
            .map(|value| value.as_list().join(" "))
            .unwrap_or_default(),
        sort: first("sort").map(str::to_string),
        page: Pagination::new(
            first("offset").map(parse_count).unwrap_or(0),
            first("limit").map(parse_limit).unwrap_or(0),
        ),
    }
}

/// Builds the filter for a request: the search condition first, then one
/// condition per non-reserved query key.
///
/// # Errors
///
/// Returns a configuration error when a `search_term` is present without search columns.
pub fn filter(request: &Request, options: &CrudOptions) -> CrudResult<Option<Expr>> {
    let mut conditions = Vec::new();

    if let Some(term) = request.param(SEARCH_TERM_PARAM) {
        conditions.push(search(term, options.require_search_columns()?));
    }

    conditions.extend(
        request
            .query
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| condition(key, value)),
    );

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(Filter::and(conditions)),
    })
}

/// Matches records where any of `columns` contains `term`, ignoring case.
pub fn search(term: &str, columns: &[String]) -> Expr {
    let pattern = format!(".*{term}.*");

    Filter::or(
        columns
            .iter()
            .map(|column| Filter::matches(column.as_str(), pattern.as_str())),
    )
}

/// Coerces one query parameter into a condition on `key`.
pub fn condition(key: &str, value: &QueryValue) -> Expr {
    match value {
        QueryValue::Many(values) => Filter::any_of(key, values.clone()),
        QueryValue::Single(value) => coerce(key, value),
    }
}

fn coerce(key: &str, value: &str) -> Expr {
    if value.is_empty() {
        return Filter::eq(key, Bson::Null);
    }

    if value.eq_ignore_ascii_case("true") {
        return Filter::eq(key, true);
    }

    if value.eq_ignore_ascii_case("false") {
        return Filter::eq(key, false);
    }

    if let Some(rest) = value.strip_prefix('!') {
        return Filter::ne(key, rest);
    }

    if value.contains(',') {
        return Filter::any_of(key, value.split(',').collect::<Vec<_>>());
    }

    Filter::eq(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::CrudError, query::FieldOp};

    fn field(expr: &Expr) -> (&str, &FieldOp, &Bson) {
        match expr {
            Expr::Field { field, op, value } => (field.as_str(), op, value),
            other => panic!("expected a field condition, found {other:?}"),
        }
    }

    fn strings(values: &[&str]) -> Bson {
        Bson::Array(values.iter().map(|v| Bson::String(v.to_string())).collect())
    }

    #[test]
    fn reserved_keys_never_reach_the_filter() {
        let request = Request::new()
            .with_query("sort", "name")
            .with_query("populate", vec!["related_model"])
            .with_query("columns", vec!["name"])
            .with_query("offset", "1")
            .with_query("limit", "2");

        let query = translate(&request, &CrudOptions::default()).unwrap();

        assert_eq!(query.filter, None);
        assert_eq!(query.options.projection.as_deref(), Some("name"));
        assert_eq!(query.options.populate, "related_model");
        assert_eq!(query.options.sort.as_deref(), Some("name"));
        assert_eq!(query.options.page, Pagination::new(1, 2));
    }

    #[test]
    fn absent_controls_use_defaults() {
        let options = find_options(&BTreeMap::new());

        assert_eq!(options.projection, None);
        assert_eq!(options.populate, "");
        assert_eq!(options.sort, None);
        assert_eq!(options.page, Pagination::new(0, 0));
    }

    #[test]
    fn non_numeric_offset_and_limit_read_as_zero() {
        let request = Request::new()
            .with_query("offset", "abc")
            .with_query("limit", "many");

        let options = translate(&request, &CrudOptions::default()).unwrap().options;

        assert_eq!(options.page, Pagination::new(0, 0));
    }

    #[test]
    fn negative_limit_reads_as_its_magnitude() {
        let request = Request::new()
            .with_query("offset", "-1")
            .with_query("limit", "-2");

        let options = translate(&request, &CrudOptions::default()).unwrap().options;

        assert_eq!(options.page, Pagination::new(0, 2));
    }

    #[test]
    fn list_controls_join_with_spaces() {
        let request = Request::new()
            .with_query("columns", vec!["name", "col_1"])
            .with_query("populate", "related_model");

        let options = find_options(&request.query);

        assert_eq!(options.projection.as_deref(), Some("name col_1"));
        assert_eq!(options.populate, "related_model");
    }

    #[test]
    fn empty_value_matches_null() {
        let expr = condition("col_2", &"".into());

        assert_eq!(field(&expr), ("col_2", &FieldOp::Eq, &Bson::Null));
    }

    #[test]
    fn boolean_words_ignore_case() {
        assert_eq!(field(&condition("col_3", &"True".into())).2, &Bson::Boolean(true));
        assert_eq!(field(&condition("col_3", &"FALSE".into())).2, &Bson::Boolean(false));
    }

    #[test]
    fn bang_prefix_negates_the_literal_remainder() {
        let expr = condition("name", &"!Model 2".into());
        assert_eq!(field(&expr), ("name", &FieldOp::Ne, &Bson::String("Model 2".into())));

        let expr = condition("col_3", &"!true".into());
        assert_eq!(field(&expr), ("col_3", &FieldOp::Ne, &Bson::String("true".into())));

        let expr = condition("col_2", &"!".into());
        assert_eq!(field(&expr), ("col_2", &FieldOp::Ne, &Bson::String(String::new())));
    }

    #[test]
    fn comma_splits_into_membership() {
        let expr = condition("col_1", &"M1 Col 1,M2 Col 1".into());

        assert_eq!(
            field(&expr),
            ("col_1", &FieldOp::AnyOf, &strings(&["M1 Col 1", "M2 Col 1"]))
        );
    }

    #[test]
    fn negation_takes_precedence_over_membership() {
        let expr = condition("col_1", &"!a,b".into());

        assert_eq!(field(&expr), ("col_1", &FieldOp::Ne, &Bson::String("a,b".into())));
    }

    #[test]
    fn repeated_key_matches_any_value() {
        let expr = condition("col_2", &vec!["AAAAA", "CCCCC"].into());

        assert_eq!(field(&expr), ("col_2", &FieldOp::AnyOf, &strings(&["AAAAA", "CCCCC"])));
    }

    #[test]
    fn several_keys_combine_with_and() {
        let request = Request::new()
            .with_query("name", "Model 2")
            .with_query("col_2", "CCCCC")
            .with_query("limit", "1");

        match translate(&request, &CrudOptions::default()).unwrap().filter {
            Some(Expr::And(conditions)) => assert_eq!(conditions.len(), 2),
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn search_term_expands_across_columns() {
        let options = CrudOptions::new().with_search_columns(["name", "col_1"]);
        let request = Request::new().with_param(SEARCH_TERM_PARAM, "model");

        let filter = translate(&request, &options).unwrap().filter;

        assert_eq!(
            filter,
            Some(Filter::or([
                Filter::matches("name", ".*model.*"),
                Filter::matches("col_1", ".*model.*"),
            ]))
        );
    }

    #[test]
    fn search_term_comes_before_field_conditions() {
        let options = CrudOptions::new().with_search_columns(["name"]);
        let request = Request::new()
            .with_param(SEARCH_TERM_PARAM, "2")
            .with_query("col_2", "CCCCC");

        match translate(&request, &options).unwrap().filter {
            Some(Expr::And(conditions)) => {
                assert!(matches!(conditions[0], Expr::Or(_)));
                assert_eq!(conditions[1], Filter::eq("col_2", "CCCCC"));
            }
            other => panic!("unexpected filter {other:?}"),
        }
    }

    #[test]
    fn search_term_without_columns_is_a_configuration_error() {
        let request = Request::new().with_param(SEARCH_TERM_PARAM, "model");

        assert!(matches!(
            translate(&request, &CrudOptions::default()),
            Err(CrudError::Configuration(_))
        ));
    }
}
