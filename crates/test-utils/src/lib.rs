//! Grid configurator test utilities.
//!
//! Helpers for integration testing: a recording query, step builders,
//! request input fixtures, table models and assertion utilities.

use std::collections::BTreeMap;

use grid_configurator::{DataQuery, FilterModel, SharedStep, step};
use serde_json::{Map, Value, json};

/// One operation applied to a [`RecordingQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// A relation join.
    Join(String),
    /// A filter step fed with a value.
    Filter { tag: String, value: Value },
    /// A step that ran without a filter value.
    Global(String),
}

/// A query that records every operation applied to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingQuery {
    pub operations: Vec<Operation>,
    pub labels: BTreeMap<String, String>,
}

impl RecordingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record-model label for an attribute.
    pub fn with_label(mut self, attribute: &str, label: &str) -> Self {
        self.labels.insert(attribute.to_string(), label.to_string());
        self
    }

    /// Joined relations in order.
    pub fn joins(&self) -> Vec<&str> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Join(relation) => Some(relation.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Compact operation log: `join:rel`, `tag=value`, `global:tag`.
    pub fn log(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| match op {
                Operation::Join(relation) => format!("join:{relation}"),
                Operation::Filter { tag, value } => format!("{tag}={value}"),
                Operation::Global(tag) => format!("global:{tag}"),
            })
            .collect()
    }
}

impl DataQuery for RecordingQuery {
    fn join_with(mut self, relation: &str) -> Self {
        self.operations.push(Operation::Join(relation.to_string()));
        self
    }

    fn attribute_label(&self, attribute: &str) -> Option<String> {
        self.labels.get(attribute).cloned()
    }
}

/// Step recording its filter value under `tag`; does nothing when the value
/// is unset.
pub fn filter_step(tag: &str) -> SharedStep<RecordingQuery> {
    let tag = tag.to_string();
    step(move |mut query: RecordingQuery, value: Option<&Value>, _: &FilterModel| {
        if let Some(value) = value {
            query.operations.push(Operation::Filter {
                tag: tag.clone(),
                value: value.clone(),
            });
        }
        query
    })
}

/// Step that always records `tag`.
pub fn global_step(tag: &str) -> SharedStep<RecordingQuery> {
    let tag = tag.to_string();
    step(move |mut query: RecordingQuery, _: Option<&Value>, _: &FilterModel| {
        query.operations.push(Operation::Global(tag.clone()));
        query
    })
}

/// Request input fixtures.
pub mod input {
    use super::*;

    /// Form name used by default.
    pub const FORM: &str = "DynamicModel";

    /// `{form: {attribute: value, ...}}`.
    pub fn form(form: &str, values: &[(&str, Value)]) -> Value {
        let data: Map<String, Value> = values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let mut root = Map::new();
        root.insert(form.to_string(), Value::Object(data));
        Value::Object(root)
    }

    /// Input for the default form.
    pub fn values(values: &[(&str, Value)]) -> Value {
        form(FORM, values)
    }

    /// Input carrying only a column allowlist.
    pub fn columns(list: &str) -> Value {
        values(&[("columns", json!(list))])
    }
}

/// Table model fixtures as JSON (deserializable into `TableModel`).
pub mod tables {
    use serde_json::json;

    /// `users` with a labeled `dob` attribute, a `profile` relation and an
    /// `author` relation that has its own `company` and `profile`.
    pub fn users() -> serde_json::Value {
        json!({
            "name": "users",
            "labels": { "dob": "Date of birth" },
            "relations": {
                "profile": {
                    "table": { "name": "profiles", "labels": { "age": "Age in years" } },
                    "local_field": "profile_id"
                },
                "author": {
                    "table": {
                        "name": "authors",
                        "relations": {
                            "company": {
                                "table": { "name": "companies" },
                                "local_field": "company_id"
                            },
                            "profile": {
                                "table": { "name": "profiles" },
                                "local_field": "profile_id"
                            }
                        }
                    },
                    "local_field": "author_id",
                    "join_type": "inner"
                }
            }
        })
    }
}

/// Assertion helpers.
pub mod assert {
    use grid_configurator::GridColumn;

    /// Column names in display order.
    pub fn names(columns: &[GridColumn]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Assert the display order of registered columns.
    pub fn column_order(columns: &[GridColumn], expected: &[&str]) {
        assert_eq!(names(columns), expected, "unexpected column order");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use grid_configurator::QueryStep;

    #[test]
    fn recording_query_logs_operations() {
        let model = FilterModel::new(input::FORM);
        let query = RecordingQuery::new().join_with("profile");
        let query = filter_step("age").apply(query, Some(&json!(30)), &model);
        let query = filter_step("skipped").apply(query, None, &model);
        let query = global_step("g").apply(query, None, &model);

        assert_eq!(query.log(), vec!["join:profile", "age=30", "global:g"]);
        assert_eq!(query.joins(), vec!["profile"]);
    }

    #[test]
    fn labels_are_exposed() {
        let query = RecordingQuery::new().with_label("dob", "Born");
        assert_eq!(query.attribute_label("dob").as_deref(), Some("Born"));
        assert_eq!(query.attribute_label("age"), None);
    }

    #[test]
    fn input_fixtures() {
        let value = input::columns("a,b");
        assert_eq!(value["DynamicModel"]["columns"], "a,b");

        let value = input::form("Search", &[("q", json!("x"))]);
        assert_eq!(value["Search"]["q"], "x");
    }

    #[test]
    fn table_fixture_shape() {
        let users = tables::users();
        assert_eq!(users["relations"]["author"]["join_type"], "inner");
    }
}
