//! Column label resolution.

use std::ops::Index;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::column::ColumnDescriptor;
use crate::query::DataQuery;

/// Labels keyed by attribute or column name, in the order they were first
/// set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    entries: Vec<(String, String)>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a label. Replacing an existing label keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, label: impl Into<String>) {
        let name = name.into();
        let label = label.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = label,
            None => self.entries.push((name, label)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, label)| label.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for LabelMap {
    type Output = String;

    /// Panics when no label is set for `name`.
    fn index(&self, name: &str) -> &String {
        match self.entries.iter().find(|(n, _)| n == name) {
            Some((_, label)) => label,
            None => panic!("no label for '{name}'"),
        }
    }
}

impl Serialize for LabelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, label) in &self.entries {
            map.serialize_entry(name, label)?;
        }
        map.end()
    }
}

/// Resolve the display label for a column.
///
/// Priority: explicit non-blank `label`, then a `header` made only of word
/// characters and whitespace, then the record model's own label for `name`,
/// then the humanized `name`.
pub fn resolve_label<Q: DataQuery>(column: &ColumnDescriptor<Q>, name: &str, query: &Q) -> String {
    if let Some(label) = column.label.as_deref()
        && !label.trim().is_empty()
    {
        return label.to_string();
    }

    if let Some(header) = column.header.as_deref()
        && is_plain_text(header)
    {
        return header.to_string();
    }

    query
        .attribute_label(name)
        .unwrap_or_else(|| humanize(name))
}

/// Convert an attribute name into words: `firstName`, `first_name` and
/// `first-name` all become `First Name`.
pub fn humanize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut spaced = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = if c.is_uppercase() {
                prev.is_lowercase()
                    || ((prev.is_alphabetic() || prev.is_ascii_digit())
                        && next.is_some_and(char::is_lowercase))
            } else if c.is_ascii_digit() {
                !prev.is_ascii_digit()
            } else {
                false
            };
            if boundary {
                spaced.push(' ');
            }
        }
        spaced.push(c);
    }

    spaced
        .replace(['-', '_', '.'], " ")
        .to_lowercase()
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Word characters and whitespace only, at least one character.
fn is_plain_text(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c.is_whitespace())
}
