//! Sort declarations.
//!
//! A sort entry maps a public sort key (what appears in the request) to the
//! actual columns ordered in each direction. Shorthand entries sort by the
//! key itself.

use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::label::humanize;

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One ordering term: column and direction.
pub type OrderTerm = (String, SortDirection);

/// How a sort key orders rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Terms used when sorting ascending.
    #[serde(default)]
    pub asc: Vec<OrderTerm>,

    /// Terms used when sorting descending.
    #[serde(default)]
    pub desc: Vec<OrderTerm>,

    /// Direction used when the key is first selected.
    #[serde(default)]
    pub default: SortDirection,

    /// Sort link label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SortSpec {
    /// Create an empty spec; missing parts are filled in when it is added to
    /// a [`SortMap`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand entry: sort by `attribute` itself.
    pub fn attribute(attribute: &str) -> Self {
        Self::new().normalized(attribute)
    }

    /// Append an ascending-mode term.
    pub fn asc(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.asc.push((column.into(), direction));
        self
    }

    /// Append a descending-mode term.
    pub fn desc(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.desc.push((column.into(), direction));
        self
    }

    /// Set the default direction.
    pub fn default_direction(mut self, direction: SortDirection) -> Self {
        self.default = direction;
        self
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Fill empty term lists and the label from the sort key.
    pub fn normalized(mut self, key: &str) -> Self {
        if self.asc.is_empty() {
            self.asc.push((key.to_string(), SortDirection::Asc));
        }
        if self.desc.is_empty() {
            self.desc.push((key.to_string(), SortDirection::Desc));
        }
        if self.label.is_none() {
            self.label = Some(humanize(key));
        }
        self
    }

    /// Terms for a direction.
    pub fn terms(&self, direction: SortDirection) -> &[OrderTerm] {
        match direction {
            SortDirection::Asc => &self.asc,
            SortDirection::Desc => &self.desc,
        }
    }
}

/// Sort keys in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortMap {
    entries: Vec<(String, SortSpec)>,
}

impl SortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key. The spec is normalized against the key.
    pub fn insert(&mut self, key: impl Into<String>, spec: SortSpec) {
        let key = key.into();
        let spec = spec.normalized(&key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = spec,
            None => self.entries.push((key, spec)),
        }
    }

    /// Add a shorthand key.
    pub fn insert_attribute(&mut self, key: impl Into<String>) {
        self.insert(key, SortSpec::new());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, spec: SortSpec) -> Self {
        self.insert(key, spec);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SortSpec> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, spec)| spec)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SortSpec)> {
        self.entries.iter().map(|(k, spec)| (k.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into this map; entries from `other` win.
    pub fn merge(&mut self, other: SortMap) {
        for (key, spec) in other.entries {
            self.insert(key, spec);
        }
    }

    /// Ordering terms for a request sort parameter.
    ///
    /// The parameter is a comma-separated list of keys; a leading `-` selects
    /// descending order. Unknown keys are ignored.
    pub fn resolve(&self, param: &str) -> Vec<OrderTerm> {
        let mut terms = Vec::new();
        for token in param.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, direction) = match token.strip_prefix('-') {
                Some(key) => (key, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if let Some(spec) = self.get(key) {
                terms.extend(spec.terms(direction).iter().cloned());
            }
        }
        terms
    }
}

impl Serialize for SortMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, spec) in &self.entries {
            map.serialize_entry(key, spec)?;
        }
        map.end()
    }
}

/// One element of the list form: a bare key or a map of full entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum SortItem {
    Key(String),
    Entries(SortMap),
}

impl<'de> Deserialize<'de> for SortMap {
    /// Accepts a map (`{age: ~, name: {...}}`) or a list mixing bare keys
    /// and single-entry maps (`[age, {name: {...}}]`).
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SortMapVisitor;

        impl<'de> Visitor<'de> for SortMapVisitor {
            type Value = SortMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map or list of sort keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SortMap, A::Error> {
                let mut map = SortMap::new();
                while let Some((key, spec)) = access.next_entry::<String, Option<SortSpec>>()? {
                    map.insert(key, spec.unwrap_or_default());
                }
                Ok(map)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<SortMap, A::Error> {
                let mut map = SortMap::new();
                while let Some(item) = access.next_element::<SortItem>()? {
                    match item {
                        SortItem::Key(key) => map.insert_attribute(key),
                        SortItem::Entries(entries) => map.merge(entries),
                    }
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(SortMapVisitor)
    }
}
