//! Filter predicates for [`SelectQuery`].
//!
//! [`compare`] builds a query step that adds a WHERE condition from the
//! column's filter value. Empty values (null, "", []) leave the query
//! untouched, so an unset filter never narrows the result.

use sea_query::{Expr, SimpleExpr};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SelectQuery;
use crate::filter_model::FilterModel;
use crate::query::{SharedStep, step};
use crate::validation::is_empty;

/// Comparison applied between a column and a filter value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Exact match.
    #[default]
    Equals,
    NotEquals,
    /// Substring match (LIKE %value%).
    Contains,
    /// Prefix match (LIKE value%).
    StartsWith,
    /// Suffix match (LIKE %value).
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    /// Value in list (array or comma-separated string).
    In,
    NotIn,
    /// Column is NULL when the filter value is set.
    IsNull,
    /// Column is not NULL when the filter value is set.
    IsNotNull,
}

/// Step comparing `column` with the filter value it is fed.
pub fn compare(column: impl Into<String>, operator: FilterOperator) -> SharedStep<SelectQuery> {
    let column = column.into();
    step(move |query: SelectQuery, value: Option<&Value>, _: &FilterModel| {
        apply(query, &column, operator, value)
    })
}

/// Step comparing `column` with a fixed value, ignoring the filter value.
pub fn fixed(
    column: impl Into<String>,
    operator: FilterOperator,
    value: Value,
) -> SharedStep<SelectQuery> {
    let column = column.into();
    step(move |query: SelectQuery, _: Option<&Value>, _: &FilterModel| {
        apply(query, &column, operator, Some(&value))
    })
}

fn apply(query: SelectQuery, column: &str, operator: FilterOperator, value: Option<&Value>) -> SelectQuery {
    match condition(&query, column, operator, value) {
        Some(condition) => query.and_where(condition),
        None => query,
    }
}

/// Build the condition for one filter, or `None` when the value is empty or
/// cannot be used with the operator.
pub fn condition(
    query: &SelectQuery,
    column: &str,
    operator: FilterOperator,
    value: Option<&Value>,
) -> Option<SimpleExpr> {
    let value = value.filter(|v| !is_empty(v))?;
    let field: Expr = query.column_ref(column);

    match operator {
        FilterOperator::Equals => Some(field.eq(scalar(value)?)),
        FilterOperator::NotEquals => Some(field.ne(scalar(value)?)),
        FilterOperator::Contains => {
            let text = text(value)?;
            Some(field.like(format!("%{}%", escape_like_wildcards(&text))))
        }
        FilterOperator::StartsWith => {
            let text = text(value)?;
            Some(field.like(format!("{}%", escape_like_wildcards(&text))))
        }
        FilterOperator::EndsWith => {
            let text = text(value)?;
            Some(field.like(format!("%{}", escape_like_wildcards(&text))))
        }
        FilterOperator::GreaterThan => Some(field.gt(scalar(value)?)),
        FilterOperator::LessThan => Some(field.lt(scalar(value)?)),
        FilterOperator::GreaterOrEqual => Some(field.gte(scalar(value)?)),
        FilterOperator::LessOrEqual => Some(field.lte(scalar(value)?)),
        FilterOperator::In => {
            let values = list(value);
            (!values.is_empty()).then(|| field.is_in(values))
        }
        FilterOperator::NotIn => {
            let values = list(value);
            (!values.is_empty()).then(|| field.is_not_in(values))
        }
        FilterOperator::IsNull => Some(field.is_null()),
        FilterOperator::IsNotNull => Some(field.is_not_null()),
    }
}

/// Convert a JSON scalar into a bound SQL value.
fn scalar(value: &Value) -> Option<sea_query::Value> {
    match value {
        Value::String(s) => Some(s.clone().into()),
        Value::Bool(b) => Some((*b).into()),
        Value::Number(n) => n
            .as_i64()
            .map(Into::into)
            .or_else(|| n.as_f64().map(Into::into)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list(value: &Value) -> Vec<sea_query::Value> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| item.to_string().into())
            .collect(),
        other => scalar(other).into_iter().collect(),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
