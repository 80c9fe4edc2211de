//! HTTP-style request and response types consumed by the handlers.
//!
//! A router builds a [`Request`] from whatever its framework hands it and passes
//! something implementing [`ResponseSink`] alongside it. The handlers only read
//! the request and only write headers to the sink.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A query parameter value. Repeated keys produce [`QueryValue::Many`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// Returns the value as a list, treating a single value as a one-element list.
    pub fn as_list(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(value) => vec![value.as_str()],
            QueryValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the single value, or the first of many.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => Some(value),
            QueryValue::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for QueryValue {
    fn from(values: Vec<S>) -> Self {
        QueryValue::Many(values.into_iter().map(Into::into).collect())
    }
}

/// An incoming request: query parameters, path parameters and a JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Map<String, Value>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter, replacing any previous value for `key`.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Adds a path parameter, replacing any previous value for `key`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replaces the body. Non-object JSON values leave an empty body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Returns a path parameter, ignoring empty values.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Write-only header target for list metadata.
pub trait ResponseSink: Send {
    fn set_header(&mut self, name: &str, value: String);
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn set_header(&mut self, name: &str, value: String) {
        (**self).set_header(name, value)
    }
}

/// A response sink that records headers in a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    headers: BTreeMap<String, String>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

impl ResponseSink for Response {
    fn set_header(&mut self, name: &str, value: String) {
        self.headers.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_values_deserialize_from_strings_and_lists() {
        let request: Request = serde_json::from_value(json!({
            "query": { "name": "Model 1", "columns": ["name", "col_1"] },
            "params": { "object_id": "abc" },
        }))
        .unwrap();

        assert_eq!(request.query["name"], QueryValue::from("Model 1"));
        assert_eq!(request.query["columns"].as_list(), vec!["name", "col_1"]);
        assert_eq!(request.param("object_id"), Some("abc"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn empty_path_parameter_counts_as_absent() {
        let request = Request::new().with_param("object_id", "");

        assert_eq!(request.param("object_id"), None);
    }

    #[test]
    fn response_keeps_last_header_value() {
        let mut response = Response::new();
        response.set_header("X-Total", "1".into());
        response.set_header("X-Total", "3".into());

        assert_eq!(response.header("X-Total"), Some("3"));
        assert_eq!(response.header("X-Total-Pages"), None);
    }
}
