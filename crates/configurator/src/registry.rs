//! Column registry and placement.
//!
//! Placement rules:
//! - left-frozen columns form a contiguous block at the start, in
//!   registration order;
//! - right-frozen columns are appended after everything registered so far;
//! - unfrozen columns are only kept when listed in the requested column
//!   order, and are placed in that order, never before left-frozen columns.

use crate::column::{Freeze, GridColumn};

/// Insertion index for a new column, or `None` when it must be skipped.
///
/// `order` is the requested column allowlist; it only affects unfrozen
/// columns.
pub fn insertion_index(
    columns: &[GridColumn],
    name: &str,
    freeze: Option<Freeze>,
    order: &[String],
) -> Option<usize> {
    match freeze {
        Some(Freeze::Left) => Some(
            columns
                .iter()
                .position(|c| !c.is_left_frozen())
                .unwrap_or(columns.len()),
        ),
        Some(Freeze::Right) => Some(columns.len()),
        None => {
            let position = order_position(order, name)?;
            for (index, column) in columns.iter().enumerate().rev() {
                match column.freeze {
                    None => {
                        let placed_before = order_position(order, &column.name)
                            .is_some_and(|existing| existing < position);
                        if placed_before {
                            return Some(index + 1);
                        }
                    }
                    Some(Freeze::Left) => return Some(index + 1),
                    Some(Freeze::Right) => {}
                }
            }
            Some(0)
        }
    }
}

fn order_position(order: &[String], name: &str) -> Option<usize> {
    order.iter().position(|n| n == name)
}

/// Registered columns in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRegistry {
    columns: Vec<GridColumn>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a column with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Insertion index for a new column (see [`insertion_index`]).
    pub fn placement(&self, name: &str, freeze: Option<Freeze>, order: &[String]) -> Option<usize> {
        insertion_index(&self.columns, name, freeze, order)
    }

    /// Insert a column at an index from [`placement`](Self::placement).
    pub fn insert(&mut self, index: usize, column: GridColumn) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[GridColumn] {
        &self.columns
    }

    /// Column names in display order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Frozen columns (either side), in display order.
    pub fn frozen(&self) -> Vec<&GridColumn> {
        self.columns.iter().filter(|c| c.is_frozen()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
