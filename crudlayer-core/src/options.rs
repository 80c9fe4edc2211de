//! Handler configuration.
//!
//! [`CrudOptions`] can be built in code or deserialized from JSON, so the same
//! options can live next to the rest of a service's configuration:
//!
//! ```ignore
//! let options = CrudOptions::from_json(r#"{ "search_columns": ["name", "col_1"] }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CrudError, CrudResult};

/// Options recognised by [`RestCrud`](crate::handler::RestCrud).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudOptions {
    /// Fields searched when a request carries a `search_term` path parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_columns: Option<Vec<String>>,
}

impl CrudOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fields matched against a `search_term`.
    pub fn with_search_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Parses options from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Configuration`] if the JSON is malformed or has the wrong shape.
    pub fn from_json(json: &str) -> CrudResult<Self> {
        serde_json::from_str(json).map_err(|e| CrudError::Configuration(e.to_string()))
    }

    /// Returns the configured search columns, or a configuration error when there are none.
    pub fn require_search_columns(&self) -> CrudResult<&[String]> {
        match self.search_columns.as_deref() {
            Some(columns) if !columns.is_empty() => Ok(columns),
            _ => Err(CrudError::Configuration(
                "No search columns specified in options".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_columns_from_json() {
        let options = CrudOptions::from_json(r#"{ "search_columns": ["name", "col_1"] }"#).unwrap();

        assert_eq!(
            options.require_search_columns().unwrap(),
            &["name".to_string(), "col_1".to_string()]
        );
    }

    #[test]
    fn missing_or_empty_search_columns_are_a_configuration_error() {
        assert!(matches!(
            CrudOptions::from_json("{}").unwrap().require_search_columns(),
            Err(CrudError::Configuration(_))
        ));
        assert!(matches!(
            CrudOptions::new()
                .with_search_columns(Vec::<String>::new())
                .require_search_columns(),
            Err(CrudError::Configuration(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(
            CrudOptions::from_json(r#"{ "search_columns": "name" }"#),
            Err(CrudError::Configuration(_))
        ));
    }
}
