//! Grid Configurator
//!
//! Declarative configuration for data grids: a validated filter model bound
//! to request input, column placement (frozen columns and a user-selected
//! column order), sort declarations, and a composed query built from
//! per-column filter steps. The `gridcfg` binary renders a definition file
//! against request input.

pub mod column;
pub mod config;
pub mod configurator;
pub mod definition;
pub mod error;
pub mod filter_model;
pub mod label;
pub mod provider;
pub mod query;
pub mod registry;
pub mod sort;
pub mod sql;
pub mod validation;

pub use column::{ColumnDescriptor, Freeze, GridColumn};
pub use configurator::{Configurator, ConfiguratorBuilder, QueryAttribute};
pub use definition::{ColumnDefinition, FilterSpec, GridDefinition, QueryAttributeDefinition};
pub use error::{ConfigError, ConfigResult};
pub use filter_model::{FilterModel, FilterModelBuilder};
pub use label::LabelMap;
pub use provider::{
    DataProvider, DataProviderConfig, DataProviderOverrides, GridConfig, GridOverrides, Pagination,
};
pub use query::{DataQuery, QueryStep, SharedStep, step};
pub use sort::{SortDirection, SortMap, SortSpec};
pub use validation::{FieldError, Rule, RuleSpec, Validator, ValidatorRegistry};

pub mod prelude {
    pub use crate::column::{ColumnDescriptor, Freeze};
    pub use crate::configurator::{Configurator, QueryAttribute};
    pub use crate::filter_model::FilterModel;
    pub use crate::query::{DataQuery, SharedStep, step};
    pub use crate::sort::{SortDirection, SortMap, SortSpec};
    pub use crate::validation::{Rule, RuleSpec};
}
