//! Filter evaluation and ordering for in-memory documents.
//!
//! The semantics follow the document database the handlers were designed
//! against, so that the in-memory store and a real one return the same records:
//!
//! - a missing field compares as null;
//! - equality against an array field matches when any element is equal;
//! - `Ne` is the exact complement of `Eq`;
//! - a string compares equal to an ObjectId with the same hex form, and to a
//!   number with the same value, the way string query parameters are cast;
//! - sorting orders values of different types by a fixed type rank.

use std::{
    cmp::Ordering,
    collections::HashMap,
};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::{Regex, RegexBuilder};

use crudlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// A value with no query semantics, such as binary data or a timestamp.
    /// Never equal to anything; the payload is its sort rank.
    Unsupported(u8),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            Bson::Binary(_) => Comparable::Unsupported(6),
            Bson::Timestamp(_) => Comparable::Unsupported(10),
            Bson::RegularExpression(_) => Comparable::Unsupported(11),
            _ => Comparable::Unsupported(12),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::ObjectId(id), Comparable::String(s))
            | (Comparable::String(s), Comparable::ObjectId(id)) => id.to_hex() == *s,
            (Comparable::Number(n), Comparable::String(s))
            | (Comparable::String(s), Comparable::Number(n)) => {
                s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
            }
            _ => false,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Unsupported(rank) => *rank,
        }
    }

    /// Total order used for sorting; values of different types order by rank.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => {
                a.timestamp_millis().cmp(&b.timestamp_millis())
            }
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Regular expressions of a filter, compiled once per query.
#[derive(Debug, Default)]
pub(crate) struct Patterns {
    compiled: HashMap<String, Regex>,
}

impl Patterns {
    /// Compiles every `Matches` pattern in `expr`, case-insensitively.
    pub(crate) fn compile(expr: &Expr) -> DocumentStoreResult<Self> {
        let mut patterns = Patterns::default();
        patterns.visit_expr(expr)?;

        Ok(patterns)
    }

    fn get(&self, pattern: &str) -> Option<&Regex> {
        self.compiled.get(pattern)
    }
}

impl QueryVisitor for Patterns {
    type Output = ();
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        exprs.iter().try_for_each(|expr| self.visit_expr(expr))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        exprs.iter().try_for_each(|expr| self.visit_expr(expr))
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if *op != FieldOp::Matches {
            return Ok(());
        }

        let Bson::String(pattern) = value else {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "pattern for {field} must be a string"
            )));
        };

        if !self.compiled.contains_key(pattern) {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| DocumentStoreError::InvalidQuery(e.to_string()))?;

            self.compiled.insert(pattern.clone(), regex);
        }

        Ok(())
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a Patterns,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document, patterns: &'a Patterns) -> Self {
        Self { document, patterns }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns the documents matching `expr`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: Option<&Expr>,
    ) -> DocumentStoreResult<Vec<&'a Document>> {
        let Some(expr) = expr else {
            return Ok(documents.into_iter().collect());
        };

        let patterns = Patterns::compile(expr)?;
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document, &patterns).evaluate(expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn matches_value(field_value: &Bson, value: &Bson) -> bool {
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        if left == right {
            return true;
        }

        match (&left, &right) {
            (Comparable::Array(_), Comparable::Array(_)) => false,
            (Comparable::Array(items), single) => items.iter().any(|item| item == single),
            _ => false,
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = self.document.get(field).unwrap_or(&Bson::Null);

        match op {
            FieldOp::Eq => Ok(Self::matches_value(field_value, value)),
            FieldOp::Ne => Ok(!Self::matches_value(field_value, value)),
            FieldOp::AnyOf => match value {
                Bson::Array(values) => Ok(
                    values
                        .iter()
                        .any(|candidate| Self::matches_value(field_value, candidate))
                ),
                single => Ok(Self::matches_value(field_value, single)),
            },
            FieldOp::Matches => {
                let regex = match value {
                    Bson::String(pattern) => self.patterns.get(pattern),
                    _ => None,
                }
                .ok_or_else(|| DocumentStoreError::InvalidQuery(format!("uncompiled pattern for {field}")))?;

                Ok(match field_value {
                    Bson::String(text) => regex.is_match(text),
                    Bson::Array(items) => items
                        .iter()
                        .any(|item| matches!(item, Bson::String(text) if regex.is_match(text))),
                    _ => false,
                })
            }
        }
    }
}

/// Stable multi-key sort; earlier keys take precedence.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &[Sort]) {
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let left = a.get(&key.field).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = b.get(&key.field).map(Comparable::from).unwrap_or(Comparable::Null);

                match key.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use crudlayer_core::query::Filter;

    use super::*;

    fn fixture() -> Vec<Document> {
        vec![
            doc! { "name": "Model 1", "col_2": Bson::Null, "col_3": true, "col_4": ["a", "b"], "rank": 3 },
            doc! { "name": "Model 2", "col_2": "CCCCC", "col_4": ["c", "d"], "rank": 1 },
            doc! { "name": "Model 3", "col_2": "CCCCC", "col_3": false, "col_4": ["e", "f"], "rank": 2 },
        ]
    }

    fn names(documents: &[&Document]) -> Vec<String> {
        documents
            .iter()
            .map(|doc| doc.get_str("name").unwrap().to_string())
            .collect()
    }

    fn matching(expr: Expr) -> Vec<String> {
        let documents = fixture();
        names(&DocumentEvaluator::filter_documents(&documents, Some(&expr)).unwrap())
    }

    #[test]
    fn null_matches_null_and_missing_fields() {
        assert_eq!(matching(Filter::eq("col_2", Bson::Null)), vec!["Model 1"]);
        assert_eq!(matching(Filter::eq("col_3", Bson::Null)), vec!["Model 2"]);
    }

    #[test]
    fn ne_is_the_complement_of_eq() {
        let equal = matching(Filter::eq("col_2", "CCCCC"));
        let not_equal = matching(Filter::ne("col_2", "CCCCC"));

        assert_eq!(equal, vec!["Model 2", "Model 3"]);
        assert_eq!(not_equal, vec!["Model 1"]);
        assert_eq!(equal.len() + not_equal.len(), fixture().len());
    }

    #[test]
    fn equality_on_array_fields_matches_elements() {
        assert_eq!(matching(Filter::eq("col_4", "c")), vec!["Model 2"]);
        assert_eq!(matching(Filter::any_of("col_4", vec!["a", "f"])), vec!["Model 1", "Model 3"]);
    }

    #[test]
    fn booleans_only_match_booleans() {
        assert_eq!(matching(Filter::eq("col_3", true)), vec!["Model 1"]);
        assert_eq!(matching(Filter::eq("col_3", false)), vec!["Model 3"]);
        assert!(matching(Filter::eq("col_3", "true")).is_empty());
    }

    #[test]
    fn strings_are_cast_to_numbers_and_ids() {
        let id = ObjectId::new();
        let documents = vec![doc! { "_id": id, "rank": 2 }];

        let by_rank = Filter::eq("rank", "2");
        let by_id = Filter::eq("_id", id.to_hex());

        assert_eq!(DocumentEvaluator::filter_documents(&documents, Some(&by_rank)).unwrap().len(), 1);
        assert_eq!(DocumentEvaluator::filter_documents(&documents, Some(&by_id)).unwrap().len(), 1);
    }

    #[test]
    fn patterns_ignore_case_and_compose_with_or() {
        let expr = Filter::or([
            Filter::matches("name", ".*model 2.*"),
            Filter::matches("col_2", ".*zzz.*"),
        ]);

        assert_eq!(matching(expr), vec!["Model 2"]);
    }

    #[test]
    fn invalid_pattern_is_a_query_error() {
        let documents = fixture();
        let result = DocumentEvaluator::filter_documents(&documents, Some(&Filter::matches("name", ".*(.*")));

        assert!(matches!(result, Err(DocumentStoreError::InvalidQuery(_))));
    }

    #[test]
    fn multi_key_sort_is_stable_and_directional() {
        let mut documents = fixture();
        sort_documents(&mut documents, &Sort::parse_expr("col_2 -name"));

        let sorted: Vec<_> = documents.iter().collect();
        assert_eq!(names(&sorted), vec!["Model 1", "Model 3", "Model 2"]);

        sort_documents(&mut documents, &Sort::parse_expr("-rank"));
        let sorted: Vec<_> = documents.iter().collect();
        assert_eq!(names(&sorted), vec!["Model 1", "Model 3", "Model 2"]);

        sort_documents(&mut documents, &Sort::parse_expr("rank"));
        let sorted: Vec<_> = documents.iter().collect();
        assert_eq!(names(&sorted), vec!["Model 2", "Model 3", "Model 1"]);
    }

    #[test]
    fn nan_sorts_without_breaking_the_order() {
        let mut documents = (0..40)
            .map(|i| {
                let value = if i % 3 == 0 { f64::NAN } else { f64::from(40 - i) };
                doc! { "i": i, "v": value }
            })
            .collect::<Vec<_>>();

        sort_documents(&mut documents, &Sort::parse_expr("v"));

        let values = documents
            .iter()
            .map(|doc| doc.get_f64("v").unwrap())
            .collect::<Vec<_>>();
        let numbers = values.iter().take_while(|v| !v.is_nan()).collect::<Vec<_>>();

        assert_eq!(numbers.len(), 26);
        assert!(numbers.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(values[26..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn unsupported_types_never_match_null() {
        use bson::{Binary, spec::BinarySubtype};

        let binary = Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2] };
        let timestamp = bson::Timestamp { time: 1, increment: 1 };
        let documents = vec![
            doc! { "name": "binary", "v": binary },
            doc! { "name": "timestamp", "v": timestamp },
            doc! { "name": "missing" },
        ];

        let null = Filter::eq("v", Bson::Null);
        let matched = DocumentEvaluator::filter_documents(&documents, Some(&null)).unwrap();

        assert_eq!(names(&matched), vec!["missing"]);
    }

    #[test]
    fn mixed_types_sort_by_rank() {
        let null = Bson::Null;
        let number = Bson::Int32(5);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).sort_cmp(&Comparable::from(&number)), Ordering::Greater);
    }
}
