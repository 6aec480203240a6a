//! Data-provider and grid configuration objects.
//!
//! These are the finished artifacts handed to the paging/sorting layer and to
//! the grid renderer. Every builder accepts caller overrides; a supplied
//! value always replaces the computed one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter_model::FilterModel;
use crate::sort::{OrderTerm, SortMap};

/// Pager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Rows per page; 0 disables paging.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Current page (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page_size() -> u32 {
    20
}

fn default_page() -> u32 {
    1
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page: default_page(),
        }
    }
}

impl Pagination {
    /// Create a pager for a page size.
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Select a page (values below 1 select the first page).
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Row limit, `None` when paging is disabled.
    pub fn limit(&self) -> Option<u64> {
        (self.page_size > 0).then_some(u64::from(self.page_size))
    }

    /// Row offset for the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Number of pages for a total row count.
    pub fn page_count(&self, total: u64) -> u64 {
        match self.limit() {
            Some(limit) => total.div_ceil(limit),
            None => 1,
        }
    }
}

/// Sort section of a data-provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SortConfig {
    /// Sortable keys.
    pub attributes: SortMap,
}

/// Configuration for a data provider: the composed query plus sorting and
/// paging.
#[derive(Debug, Clone)]
pub struct DataProviderConfig<Q> {
    pub query: Q,
    pub sort: SortConfig,
    pub pagination: Pagination,
}

/// Caller overrides for [`DataProviderConfig`].
#[derive(Debug, Clone)]
pub struct DataProviderOverrides<Q> {
    pub query: Option<Q>,
    pub sort: Option<SortMap>,
    pub pagination: Option<Pagination>,
}

impl<Q> Default for DataProviderOverrides<Q> {
    fn default() -> Self {
        Self {
            query: None,
            sort: None,
            pagination: None,
        }
    }
}

impl<Q> DataProviderOverrides<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: Q) -> Self {
        self.query = Some(query);
        self
    }

    pub fn sort(mut self, sort: SortMap) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl<Q> DataProviderConfig<Q> {
    /// Apply overrides; supplied values win.
    pub fn with_overrides(self, overrides: DataProviderOverrides<Q>) -> Self {
        Self {
            query: overrides.query.unwrap_or(self.query),
            sort: overrides
                .sort
                .map(|attributes| SortConfig { attributes })
                .unwrap_or(self.sort),
            pagination: overrides.pagination.unwrap_or(self.pagination),
        }
    }
}

/// Data provider built from a [`DataProviderConfig`].
///
/// Holds the composed query and resolves the requested ordering; executing
/// the query is left to the query backend.
#[derive(Debug, Clone)]
pub struct DataProvider<Q> {
    query: Q,
    sort: SortMap,
    pagination: Pagination,
    sort_param: Option<String>,
}

impl<Q> DataProvider<Q> {
    pub fn new(config: DataProviderConfig<Q>) -> Self {
        Self {
            query: config.query,
            sort: config.sort.attributes,
            pagination: config.pagination,
            sort_param: None,
        }
    }

    /// Set the request sort parameter (e.g. `"-created,name"`).
    pub fn with_sort_param(mut self, param: impl Into<String>) -> Self {
        self.sort_param = Some(param.into());
        self
    }

    /// Select a page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.pagination = self.pagination.page(page);
        self
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn sort(&self) -> &SortMap {
        &self.sort
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Ordering for the current request.
    ///
    /// Uses the sort parameter when one is set and names a known key;
    /// otherwise no ordering is applied.
    pub fn order(&self) -> Vec<OrderTerm> {
        self.sort_param
            .as_deref()
            .map(|param| self.sort.resolve(param))
            .unwrap_or_default()
    }
}

/// Configuration for the grid renderer.
#[derive(Debug, Clone)]
pub struct GridConfig<Q> {
    pub data_provider: DataProvider<Q>,
    pub filter_model: FilterModel,
    /// Columns without internal keys.
    pub columns: Vec<Map<String, Value>>,
}

/// Caller overrides for [`GridConfig`].
#[derive(Debug, Clone)]
pub struct GridOverrides<Q> {
    pub data_provider: Option<DataProvider<Q>>,
    pub filter_model: Option<FilterModel>,
    pub columns: Option<Vec<Map<String, Value>>>,
}

impl<Q> Default for GridOverrides<Q> {
    fn default() -> Self {
        Self {
            data_provider: None,
            filter_model: None,
            columns: None,
        }
    }
}

impl<Q> GridOverrides<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_provider(mut self, provider: DataProvider<Q>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    pub fn filter_model(mut self, model: FilterModel) -> Self {
        self.filter_model = Some(model);
        self
    }

    pub fn columns(mut self, columns: Vec<Map<String, Value>>) -> Self {
        self.columns = Some(columns);
        self
    }
}

/// Renderer-facing view of a grid configuration (the query is omitted).
#[derive(Serialize)]
struct GridView<'a> {
    columns: &'a [Map<String, Value>],
    filter_model: &'a FilterModel,
    sort: &'a SortMap,
    order: Vec<OrderTerm>,
    pagination: Pagination,
}

impl<Q> Serialize for GridConfig<Q> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GridView {
            columns: &self.columns,
            filter_model: &self.filter_model,
            sort: self.data_provider.sort(),
            order: self.data_provider.order(),
            pagination: self.data_provider.pagination(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sort::{SortDirection, SortSpec};

    #[test]
    fn pagination_defaults_and_offsets() {
        let pager = Pagination::default();
        assert_eq!(pager.page_size, 20);
        assert_eq!(pager.offset(), 0);
        assert_eq!(pager.limit(), Some(20));

        let third = Pagination::new(10).page(3);
        assert_eq!(third.offset(), 20);
        assert_eq!(third.page_count(25), 3);

        assert_eq!(Pagination::new(10).page(0).page, 1);
    }

    #[test]
    fn zero_page_size_disables_paging() {
        let pager = Pagination::new(0);
        assert_eq!(pager.limit(), None);
        assert_eq!(pager.page_count(1000), 1);
    }

    #[test]
    fn overrides_win() {
        let config = DataProviderConfig {
            query: "base",
            sort: SortConfig {
                attributes: SortMap::new().with("age", SortSpec::new()),
            },
            pagination: Pagination::default(),
        };

        let merged = config.clone().with_overrides(
            DataProviderOverrides::new()
                .query("custom")
                .pagination(Pagination::new(50)),
        );
        assert_eq!(merged.query, "custom");
        assert_eq!(merged.pagination.page_size, 50);
        assert!(merged.sort.attributes.contains("age"));

        let untouched = config.with_overrides(DataProviderOverrides::new());
        assert_eq!(untouched.query, "base");
    }

    #[test]
    fn provider_resolves_sort_param() {
        let provider = DataProvider::new(DataProviderConfig {
            query: (),
            sort: SortConfig {
                attributes: SortMap::new().with("age", SortSpec::new()),
            },
            pagination: Pagination::default(),
        });
        assert!(provider.order().is_empty());

        let sorted = provider.with_sort_param("-age").with_page(2);
        assert_eq!(sorted.order(), vec![("age".to_string(), SortDirection::Desc)]);
        assert_eq!(sorted.pagination().page, 2);
    }
}
