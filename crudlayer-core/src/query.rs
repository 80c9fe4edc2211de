//! Store-agnostic filter expressions, sort expressions and projections.
//!
//! The [`translate`](crate::translate) module produces these from request
//! parameters, and every [`Model`](crate::model::Model) implementation consumes
//! them, either by evaluating them directly or through a [`QueryVisitor`].
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors:
//!
//! - Comparison: `eq`, `ne`
//! - Membership: `any_of`
//! - Pattern: `matches` (case-insensitive regular expression)
//! - Logical: `and`, `or`
//!
//! ```ignore
//! use crudlayer::query::Filter;
//!
//! let expr = Filter::eq("name", "Model 2")
//!     .and(Filter::any_of("col_1", vec!["a", "b"]));
//! ```

use bson::Bson;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    record::ID_FIELD,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One key of a sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Parses a raw sort expression such as `"col_2 -name"`.
    ///
    /// Keys are separated by whitespace. A leading `-` sorts descending and a
    /// leading `+` (or no prefix) sorts ascending. Earlier keys take precedence.
    pub fn parse_expr(expr: &str) -> Vec<Sort> {
        expr.split_whitespace()
            .filter_map(|key| {
                let (field, direction) = match key.strip_prefix('-') {
                    Some(rest) => (rest, SortDirection::Desc),
                    None => (key.strip_prefix('+').unwrap_or(key), SortDirection::Asc),
                };

                (!field.is_empty()).then(|| Sort { field: field.to_string(), direction })
            })
            .collect()
    }
}

/// Field selection applied to returned records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only the listed fields are returned, plus `_id` when `id` is set.
    Include { fields: Vec<String>, id: bool },
    /// Every field except the listed ones is returned.
    Exclude(Vec<String>),
}

impl Projection {
    /// Parses a space-delimited projection string such as `"name col_1"` or `"-col_4"`.
    ///
    /// Returns `Ok(None)` when the string selects nothing. Mixing inclusion and
    /// exclusion is rejected, except that `-_id` may accompany an inclusion.
    pub fn parse(expr: &str) -> DocumentStoreResult<Option<Projection>> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for key in expr.split_whitespace() {
            match key.strip_prefix('-') {
                Some(field) if !field.is_empty() => exclude.push(field.to_string()),
                Some(_) => {}
                None => include.push(key.strip_prefix('+').unwrap_or(key).to_string()),
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(None),
            (false, true) => Ok(Some(Projection::Include { fields: include, id: true })),
            (true, false) => Ok(Some(Projection::Exclude(exclude))),
            (false, false) if exclude == [ID_FIELD] => {
                Ok(Some(Projection::Include { fields: include, id: false }))
            }
            (false, false) => Err(DocumentStoreError::InvalidQuery(
                "Projection cannot have a mix of inclusion and exclusion".to_string(),
            )),
        }
    }

    /// Returns whether `field` survives this projection.
    pub fn keeps(&self, field: &str) -> bool {
        match self {
            Projection::Include { fields, id } => {
                if field == ID_FIELD {
                    *id
                } else {
                    fields.iter().any(|f| f == field)
                }
            }
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. A null value also matches a missing field.
    Eq,
    /// Not equal to. The exact complement of [`FieldOp::Eq`].
    Ne,
    /// Field equals (or, for array fields, contains) any of the values.
    AnyOf,
    /// Field matches the regular expression in the value, ignoring case.
    Matches,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field equals any of the specified values.
    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    /// Matches documents where the string field matches `pattern`, ignoring case.
    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Matches, Bson::String(pattern.into()))
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// Walks an [`Expr`] tree, producing one output per node.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_expression_keeps_key_order_and_direction() {
        assert_eq!(
            Sort::parse_expr("col_2 -name  +col_1"),
            vec![
                Sort { field: "col_2".into(), direction: SortDirection::Asc },
                Sort { field: "name".into(), direction: SortDirection::Desc },
                Sort { field: "col_1".into(), direction: SortDirection::Asc },
            ]
        );
        assert!(Sort::parse_expr("  - ").is_empty());
    }

    #[test]
    fn projection_inclusion_always_keeps_id() {
        let projection = Projection::parse("name col_1").unwrap().unwrap();

        assert!(projection.keeps("_id"));
        assert!(projection.keeps("name"));
        assert!(!projection.keeps("col_2"));
    }

    #[test]
    fn projection_can_drop_id_from_inclusion() {
        let projection = Projection::parse("name -_id").unwrap().unwrap();

        assert!(!projection.keeps("_id"));
        assert!(projection.keeps("name"));
    }

    #[test]
    fn projection_rejects_mixed_modes() {
        assert!(matches!(
            Projection::parse("name -col_1"),
            Err(DocumentStoreError::InvalidQuery(_))
        ));
        assert_eq!(Projection::parse("   ").unwrap(), None);
    }

    #[test]
    fn and_flattens_into_existing_list() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("unexpected expression {other:?}"),
        }
    }

    #[test]
    fn or_flattens_into_existing_list() {
        let expr = Filter::eq("a", 1).or(Filter::eq("b", 2)).or(Filter::eq("c", 3));

        match expr {
            Expr::Or(list) => assert_eq!(list.len(), 3),
            other => panic!("unexpected expression {other:?}"),
        }
    }
}
