//! Declarative grid definitions.
//!
//! A [`GridDefinition`] is a YAML or JSON document describing a grid over a
//! [`TableModel`]: rules, columns, sort and global query attributes. Column
//! filters are declared as [`FilterSpec`]s instead of closures and turned into
//! [`SelectQuery`] steps when the definition is configured.
//!
//! ```yaml
//! table:
//!   name: users
//!   relations:
//!     profile: { table: { name: profiles }, local_field: profile_id }
//! rules:
//!   - [first_name, string, { max: 64 }]
//! columns:
//!   - { attribute: id, freeze: left }
//!   - attribute: first_name
//!     query: [{ operator: starts_with }]
//!   - attribute: profile.age
//!     rule: integer
//!     query: [{ operator: greater_or_equal }]
//! sort:
//!   first_name: ~
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::column::{ColumnDescriptor, Freeze, deserialize_freeze};
use crate::configurator::{Configurator, ConfiguratorBuilder, QueryAttribute};
use crate::error::{ConfigError, ConfigResult};
use crate::filter_model::FilterModel;
use crate::provider::Pagination;
use crate::query::{DataQuery, QueryStep, SharedStep, step};
use crate::sort::{SortMap, SortSpec};
use crate::sql::filters::{self, FilterOperator};
use crate::sql::{SelectQuery, TableModel};
use crate::validation::{Rule, RuleSpec};

/// Maximum definition file size (1 MB).
const MAX_DEFINITION_SIZE: u64 = 1024 * 1024;

/// A filter predicate declared in data.
///
/// Without `value` the predicate compares against the filter value fed to
/// the step; with `value` it always applies that fixed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Column compared; defaults to the owning column's attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default)]
    pub operator: FilterOperator,

    /// Fixed comparison value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FilterSpec {
    /// Build the query step, comparing `default_column` unless the spec
    /// names its own.
    pub fn to_step(&self, default_column: &str) -> SharedStep<SelectQuery> {
        let column = self.column.as_deref().unwrap_or(default_column);
        match &self.value {
            Some(value) => filters::fixed(column, self.operator, value.clone()),
            None => filters::compare(column, self.operator),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColumnDefinition {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub attribute: Option<String>,

    #[serde(default, deserialize_with = "deserialize_freeze")]
    pub freeze: Option<Freeze>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub visible: Option<bool>,

    #[serde(default)]
    pub sort: Option<SortSpec>,

    #[serde(default)]
    pub query: Vec<FilterSpec>,

    #[serde(default)]
    pub rule: Option<RuleSpec>,

    /// Rendering options passed through to the grid.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ColumnDefinition {
    /// Convert into a descriptor over [`SelectQuery`].
    pub fn to_descriptor(&self) -> ColumnDescriptor<SelectQuery> {
        let filter_column = self
            .attribute
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default();

        ColumnDescriptor {
            name: self.name.clone(),
            attribute: self.attribute.clone(),
            freeze: self.freeze,
            label: self.label.clone(),
            header: self.header.clone(),
            visible: self.visible,
            sort: self.sort.clone(),
            query: self
                .query
                .iter()
                .map(|filter| filter.to_step(filter_column))
                .collect(),
            rule: self.rule.clone(),
            options: self.options.clone(),
        }
    }
}

/// A declared global query attribute: an optional relation join and an
/// optional fixed filter, applied once when any listed column is registered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryAttributeDefinition {
    pub attributes: Vec<String>,

    #[serde(default)]
    pub join: Option<String>,

    #[serde(default)]
    pub filter: Option<FilterSpec>,
}

impl QueryAttributeDefinition {
    fn to_query_attribute(&self, index: usize) -> ConfigResult<QueryAttribute<SelectQuery>> {
        let invalid = |reason: &str| ConfigError::InvalidQueryAttribute {
            index,
            reason: reason.to_string(),
        };

        let filter = match &self.filter {
            Some(spec) if spec.value.is_none() => {
                return Err(invalid("a global filter needs a fixed value"));
            }
            Some(spec) => {
                let column = spec
                    .column
                    .as_deref()
                    .or(self.attributes.first().map(String::as_str))
                    .ok_or_else(|| invalid("no attribute names listed"))?;
                Some(spec.to_step(column))
            }
            None => None,
        };
        if self.join.is_none() && filter.is_none() {
            return Err(invalid("needs a join or a filter"));
        }

        let join = self.join.clone();
        let apply = step(move |query: SelectQuery, value: Option<&Value>, model: &FilterModel| {
            let query = match &join {
                Some(relation) => query.join_with(relation),
                None => query,
            };
            match &filter {
                Some(filter) => filter.apply(query, value, model),
                None => query,
            }
        });
        Ok(QueryAttribute::new(self.attributes.clone(), apply))
    }
}

/// A complete grid declared in data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GridDefinition {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub form_name: Option<String>,

    pub table: TableModel,

    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,

    #[serde(default)]
    pub sort: SortMap,

    #[serde(default)]
    pub query_attributes: Vec<QueryAttributeDefinition>,

    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl GridDefinition {
    /// Parse a YAML definition.
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        serde_yml::from_str(content)
            .map_err(|e| ConfigError::InvalidDefinition(format!("invalid YAML: {e}")))
    }

    /// Parse a JSON definition.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::InvalidDefinition(format!("invalid JSON: {e}")))
    }

    /// Read a definition file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let unreadable =
            |e: std::io::Error| ConfigError::InvalidDefinition(format!("{}: {e}", path.display()));

        let size = std::fs::metadata(path).map_err(unreadable)?.len();
        if size > MAX_DEFINITION_SIZE {
            return Err(ConfigError::InvalidDefinition(format!(
                "{}: file is {size} bytes, limit is {MAX_DEFINITION_SIZE}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(unreadable)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), json = is_json, "loading grid definition");
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Turn the definition into a builder over its table; input is not set.
    pub fn builder(&self) -> ConfigResult<ConfiguratorBuilder<SelectQuery>> {
        let mut builder = Configurator::builder(SelectQuery::new(self.table.clone()))
            .rules(self.rules.clone())
            .columns(self.columns.iter().map(ColumnDefinition::to_descriptor).collect())
            .sort(self.sort.clone());

        if let Some(id) = &self.id {
            builder = builder.id(id.clone());
        }
        if let Some(form_name) = &self.form_name {
            builder = builder.form_name(form_name.clone());
        }
        if let Some(pagination) = self.pagination {
            builder = builder.pagination(pagination);
        }
        for (index, attribute) in self.query_attributes.iter().enumerate() {
            builder = builder.query_attribute(attribute.to_query_attribute(index)?);
        }
        Ok(builder)
    }

    /// Configure the grid for one request.
    pub fn configure(&self, input: Value) -> ConfigResult<Configurator<SelectQuery>> {
        self.builder()?.input(input).init()
    }
}
