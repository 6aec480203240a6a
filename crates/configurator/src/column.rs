//! Column declarations and registered grid columns.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::query::SharedStep;
use crate::sort::SortSpec;
use crate::validation::RuleSpec;

/// Where a column is pinned in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freeze {
    /// Kept in the contiguous block at the start of the grid.
    Left,
    /// Appended after every column registered before it.
    Right,
}

impl Freeze {
    /// Interpret a declared freeze value: exactly `"left"` pins left, any other
    /// truthy value pins right, null/false/"" means not frozen.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) if s == "left" => Some(Freeze::Left),
            _ => Some(Freeze::Right),
        }
    }
}

/// Serde helper for optional freeze values (see [`Freeze::from_value`]).
pub fn deserialize_freeze<'de, D>(deserializer: D) -> Result<Option<Freeze>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Freeze::from_value))
}

/// One declared grid column.
///
/// `sort`, `query` and `rule` are configuration fragments: they are moved
/// into the configurator on registration and are not part of the registered
/// column. Anything the renderer needs beyond the known keys goes in
/// `options` and is passed through untouched.
pub struct ColumnDescriptor<Q> {
    pub name: Option<String>,
    pub attribute: Option<String>,
    pub freeze: Option<Freeze>,
    pub label: Option<String>,
    pub header: Option<String>,
    pub visible: Option<bool>,
    pub sort: Option<SortSpec>,
    pub query: Vec<SharedStep<Q>>,
    pub rule: Option<RuleSpec>,
    pub options: Map<String, Value>,
}

impl<Q> Default for ColumnDescriptor<Q> {
    fn default() -> Self {
        Self {
            name: None,
            attribute: None,
            freeze: None,
            label: None,
            header: None,
            visible: None,
            sort: None,
            query: Vec::new(),
            rule: None,
            options: Map::new(),
        }
    }
}

impl<Q> Clone for ColumnDescriptor<Q> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            attribute: self.attribute.clone(),
            freeze: self.freeze,
            label: self.label.clone(),
            header: self.header.clone(),
            visible: self.visible,
            sort: self.sort.clone(),
            query: self.query.clone(),
            rule: self.rule.clone(),
            options: self.options.clone(),
        }
    }
}

impl<Q> fmt::Debug for ColumnDescriptor<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("freeze", &self.freeze)
            .field("label", &self.label)
            .field("visible", &self.visible)
            .field("query_steps", &self.query.len())
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

impl<Q> ColumnDescriptor<Q> {
    /// Column bound to a model attribute. The name is derived from it.
    pub fn attribute(attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..Self::default()
        }
    }

    /// Column identified by name only (computed or action columns).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set an explicit name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Pin the column.
    pub fn freeze(mut self, freeze: Freeze) -> Self {
        self.freeze = Some(freeze);
        self
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the header text.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Set visibility; invisible columns are never registered.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Declare how the column sorts.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Add a query step fed with this column's filter value.
    pub fn query(mut self, step: SharedStep<Q>) -> Self {
        self.query.push(step);
        self
    }

    /// Make the column filterable with the given rule.
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Set a passthrough rendering option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name this column registers under: `name`, else `attribute` with dots
    /// replaced by underscores. The flag tells whether it was derived from a
    /// dotted attribute.
    pub fn resolved_name(&self) -> Option<(String, bool)> {
        if let Some(name) = &self.name {
            return Some((name.clone(), false));
        }
        self.attribute
            .as_ref()
            .map(|attribute| (attribute.replace('.', "_"), attribute.contains('.')))
    }
}

/// A registered column: named, labeled and positioned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridColumn {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze: Option<Freeze>,

    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl GridColumn {
    /// Whether the column is pinned (either side).
    pub fn is_frozen(&self) -> bool {
        self.freeze.is_some()
    }

    /// Whether the column is pinned left.
    pub fn is_left_frozen(&self) -> bool {
        self.freeze == Some(Freeze::Left)
    }

    /// Renderer configuration without the internal `name` and `freeze` keys.
    pub fn clean(&self) -> Map<String, Value> {
        let mut config = self.options.clone();
        if let Some(attribute) = &self.attribute {
            config.insert("attribute".to_string(), Value::String(attribute.clone()));
        }
        config.insert("label".to_string(), Value::String(self.label.clone()));
        if let Some(header) = &self.header {
            config.insert("header".to_string(), Value::String(header.clone()));
        }
        config.remove("name");
        config.remove("freeze");
        config
    }
}
