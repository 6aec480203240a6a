//! Defaults for the `gridcfg` tool, loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

use crate::filter_model::DEFAULT_FORM_NAME;
use crate::provider::Pagination;

/// Tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Form name used when a definition does not set one
    /// (default: DynamicModel).
    pub form_name: String,

    /// Page size used when a definition does not set pagination (default: 20).
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form_name: DEFAULT_FORM_NAME.to_string(),
            page_size: Pagination::default().page_size,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let form_name = lookup("GRIDCFG_FORM_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.form_name);

        let page_size = match lookup("GRIDCFG_PAGE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("GRIDCFG_PAGE_SIZE must be a valid u32")?,
            None => defaults.page_size,
        };

        Ok(Self {
            form_name,
            page_size,
        })
    }

    /// Default pagination.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page_size)
    }
}
