//! Configurator facade.
//!
//! [`ConfiguratorBuilder`] collects the declaration (base query, rules,
//! columns, sort, global query attributes, request input) and `init()` turns
//! it into a ready [`Configurator`] in one pass:
//!
//! 1. build and validate the filter model from rules and input;
//! 2. register every declared column (skips are silent, errors abort);
//! 3. merge the declared sort map over per-column sort entries;
//! 4. register global query attribute steps.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::column::{ColumnDescriptor, GridColumn};
use crate::error::{ConfigError, ConfigResult};
use crate::filter_model::{DEFAULT_FORM_NAME, FilterModel, FilterModelBuilder};
use crate::label::{LabelMap, resolve_label};
use crate::provider::{
    DataProvider, DataProviderConfig, DataProviderOverrides, GridConfig, GridOverrides,
    Pagination, SortConfig,
};
use crate::query::{DataQuery, JoinSet, JoinStep, QueryComposer, SharedStep};
use crate::registry::ColumnRegistry;
use crate::sort::SortMap;
use crate::validation::{Rule, ValidatorRegistry};

/// A global query step tied to a set of column names.
///
/// The step is registered when at least one of the names is a registered
/// column; it is always fed `None` as its filter value.
pub struct QueryAttribute<Q> {
    pub attributes: Vec<String>,
    pub step: SharedStep<Q>,
}

impl<Q> QueryAttribute<Q> {
    pub fn new<I, S>(attributes: I, step: SharedStep<Q>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            step,
        }
    }
}

impl<Q> Clone for QueryAttribute<Q> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            step: self.step.clone(),
        }
    }
}

impl<Q> fmt::Debug for QueryAttribute<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryAttribute")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Declaration for a [`Configurator`].
#[derive(Debug)]
pub struct ConfiguratorBuilder<Q> {
    id: Option<String>,
    query: Q,
    rules: Vec<Rule>,
    columns: Vec<ColumnDescriptor<Q>>,
    sort: SortMap,
    query_attributes: Vec<QueryAttribute<Q>>,
    form_name: String,
    input: Value,
    pagination: Pagination,
    validators: ValidatorRegistry,
}

impl<Q: DataQuery> ConfiguratorBuilder<Q> {
    /// Start a declaration over a base query.
    pub fn new(query: Q) -> Self {
        Self {
            id: None,
            query,
            rules: Vec::new(),
            columns: Vec::new(),
            sort: SortMap::new(),
            query_attributes: Vec::new(),
            form_name: DEFAULT_FORM_NAME.to_string(),
            input: Value::Object(Map::new()),
            pagination: Pagination::default(),
            validators: ValidatorRegistry::default(),
        }
    }

    /// Set the configurator id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a validation rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replace the validation rules.
    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Declare a column.
    pub fn column(mut self, column: ColumnDescriptor<Q>) -> Self {
        self.columns.push(column);
        self
    }

    /// Replace the declared columns.
    pub fn columns(mut self, columns: Vec<ColumnDescriptor<Q>>) -> Self {
        self.columns = columns;
        self
    }

    /// Declared sort map; wins over per-column sort entries.
    pub fn sort(mut self, sort: SortMap) -> Self {
        self.sort = sort;
        self
    }

    /// Add a global query attribute.
    pub fn query_attribute(mut self, attribute: QueryAttribute<Q>) -> Self {
        self.query_attributes.push(attribute);
        self
    }

    /// Form name scoping the input values.
    pub fn form_name(mut self, form_name: impl Into<String>) -> Self {
        self.form_name = form_name.into();
        self
    }

    /// Request input: `form_name -> attribute -> value`.
    pub fn input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Default pagination for the data provider.
    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Validator kinds available to rules.
    pub fn validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    /// Build the filter model, register columns, sort and query attributes.
    pub fn init(self) -> ConfigResult<Configurator<Q>> {
        let filter_model = FilterModelBuilder::new(&self.validators).build(
            &self.rules,
            &self.input,
            &self.form_name,
        )?;

        let mut configurator = Configurator {
            id: self.id,
            query: self.query,
            registry: ColumnRegistry::new(),
            composer: QueryComposer::new(),
            joins: JoinSet::new(),
            sort: SortMap::new(),
            filter_model,
            pagination: self.pagination,
            validators: self.validators,
        };

        for column in self.columns {
            configurator.add_column(column)?;
        }

        configurator.sort.merge(self.sort);

        for (index, attribute) in self.query_attributes.into_iter().enumerate() {
            configurator.add_query_attribute(index, attribute)?;
        }

        debug!(
            id = configurator.id.as_deref().unwrap_or(""),
            columns = configurator.registry.len(),
            steps = configurator.composer.len(),
            "configurator ready"
        );
        Ok(configurator)
    }
}

/// A ready grid configuration.
///
/// Obtained from [`ConfiguratorBuilder::init`]; all accessors read the state
/// built there. Further columns can be registered with
/// [`add_column`](Self::add_column).
#[derive(Debug)]
pub struct Configurator<Q> {
    id: Option<String>,
    query: Q,
    registry: ColumnRegistry,
    composer: QueryComposer<Q>,
    joins: JoinSet,
    sort: SortMap,
    filter_model: FilterModel,
    pagination: Pagination,
    validators: ValidatorRegistry,
}

impl<Q: DataQuery> Configurator<Q> {
    /// Start a declaration over a base query.
    pub fn builder(query: Q) -> ConfiguratorBuilder<Q> {
        ConfiguratorBuilder::new(query)
    }

    /// Register a column.
    ///
    /// Returns `Ok(false)` when the column is intentionally skipped (hidden,
    /// or unfrozen and not in the requested column list).
    pub fn add_column(&mut self, column: ColumnDescriptor<Q>) -> ConfigResult<bool> {
        if column.visible == Some(false) {
            debug!(column = ?column.name.as_ref().or(column.attribute.as_ref()), "hidden column skipped");
            return Ok(false);
        }

        let (name, derived) = column.resolved_name().ok_or(ConfigError::MissingColumnName)?;
        if self.registry.contains(&name) {
            return Err(ConfigError::DuplicateColumn(name));
        }

        let join = if derived {
            column
                .attribute
                .as_deref()
                .and_then(|attribute| self.joins.plan(attribute))
        } else {
            None
        };

        let order = self.filter_model.column_order();
        let Some(index) = self.registry.placement(&name, column.freeze, &order) else {
            debug!(column = %name, "column not requested; skipped");
            return Ok(false);
        };

        let label = resolve_label(&column, &name, &self.query);
        let ColumnDescriptor {
            attribute,
            freeze,
            header,
            sort,
            query,
            rule,
            options,
            ..
        } = column;
        let rule = rule
            .map(|rule| self.validators.compile(&rule.bind(name.clone())))
            .transpose()?;

        if let Some(relation) = join {
            debug!(column = %name, relation = %relation, "queued relation join");
            self.composer.push(&name, Arc::new(JoinStep::new(relation.clone())));
            self.joins.record(relation);
        }
        for step in query {
            self.composer.push(&name, step);
        }

        if let Some(sort) = sort {
            self.sort.insert(name.clone(), sort);
        }

        self.filter_model.set_label(name.clone(), label.clone());
        if let Some(rule) = rule {
            self.filter_model.define_attribute(name.clone());
            self.filter_model.add_rule(rule);
            self.filter_model.validate_attribute(&name);
        }

        debug!(column = %name, index, frozen = ?freeze, "column registered");
        self.registry.insert(
            index,
            GridColumn {
                name,
                attribute,
                freeze,
                label,
                header,
                options,
            },
        );
        Ok(true)
    }

    fn add_query_attribute(&mut self, index: usize, attribute: QueryAttribute<Q>) -> ConfigResult<()> {
        if attribute.attributes.is_empty() {
            return Err(ConfigError::InvalidQueryAttribute {
                index,
                reason: "no attribute names listed".to_string(),
            });
        }
        if !attribute
            .attributes
            .iter()
            .any(|name| self.registry.contains(name))
        {
            return Err(ConfigError::InvalidQueryAttribute {
                index,
                reason: format!(
                    "none of [{}] is a registered column",
                    attribute.attributes.join(", ")
                ),
            });
        }
        debug!(index, attributes = ?attribute.attributes, "global query step registered");
        self.composer.push_global(attribute.step);
        Ok(())
    }

    /// Configurator id.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Sort map: per-column entries with declared entries merged over them.
    pub fn sort(&self) -> &SortMap {
        &self.sort
    }

    /// Registered columns in display order, including `name` and `freeze`.
    pub fn columns(&self) -> &[GridColumn] {
        self.registry.columns()
    }

    /// Registered columns without the internal `name` and `freeze` keys.
    pub fn clean_columns(&self) -> Vec<Map<String, Value>> {
        self.registry.columns().iter().map(GridColumn::clean).collect()
    }

    /// Frozen columns (either side), in display order.
    pub fn freeze_columns(&self) -> Vec<&GridColumn> {
        self.registry.frozen()
    }

    /// Labels keyed by filter attribute or column name.
    pub fn labels(&self) -> &LabelMap {
        self.filter_model.labels()
    }

    /// The base query folded through every registered step.
    pub fn query(&self) -> Q {
        self.composer.compose(&self.query, &self.filter_model)
    }

    /// The bound and validated filter model.
    pub fn filter_model(&self) -> &FilterModel {
        &self.filter_model
    }

    /// Registered step lists.
    pub fn composer(&self) -> &QueryComposer<Q> {
        &self.composer
    }

    /// Data-provider configuration; supplied overrides win.
    pub fn data_provider_config(&self, overrides: DataProviderOverrides<Q>) -> DataProviderConfig<Q> {
        let query = match overrides.query {
            Some(_) => self.query.clone(),
            None => self.query(),
        };
        DataProviderConfig {
            query,
            sort: SortConfig {
                attributes: self.sort.clone(),
            },
            pagination: self.pagination,
        }
        .with_overrides(overrides)
    }

    /// Grid configuration; the data provider is only built when none is
    /// supplied.
    pub fn grid_config(&self, overrides: GridOverrides<Q>) -> GridConfig<Q> {
        let GridOverrides {
            data_provider,
            filter_model,
            columns,
        } = overrides;

        GridConfig {
            data_provider: data_provider.unwrap_or_else(|| {
                DataProvider::new(self.data_provider_config(DataProviderOverrides::new()))
            }),
            filter_model: filter_model.unwrap_or_else(|| self.filter_model.clone()),
            columns: columns.unwrap_or_else(|| self.clean_columns()),
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::column::Freeze;
    use crate::query::step;
    use crate::sort::SortSpec;
    use crate::validation::RuleSpec;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Log(Vec<String>);

    impl DataQuery for Log {
        fn join_with(mut self, relation: &str) -> Self {
            self.0.push(format!("join {relation}"));
            self
        }
    }

    fn filter(tag: &'static str) -> SharedStep<Log> {
        step(move |mut q: Log, value: Option<&Value>, _: &FilterModel| {
            if let Some(value) = value {
                q.0.push(format!("{tag} {value}"));
            }
            q
        })
    }

    fn input(columns: &str) -> Value {
        json!({ "DynamicModel": { "columns": columns } })
    }

    #[test]
    fn init_registers_requested_columns() {
        let configurator = Configurator::builder(Log::default())
            .column(ColumnDescriptor::attribute("a"))
            .column(ColumnDescriptor::attribute("b"))
            .column(ColumnDescriptor::attribute("c"))
            .input(input("b,a"))
            .init()
            .unwrap();

        let names: Vec<_> = configurator.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn hidden_column_is_skipped() {
        let mut configurator = Configurator::builder(Log::default())
            .input(input("a"))
            .init()
            .unwrap();
        let added = configurator
            .add_column(ColumnDescriptor::attribute("a").visible(false))
            .unwrap();
        assert!(!added);
        assert!(configurator.columns().is_empty());
    }

    #[test]
    fn missing_name_and_duplicates_fail() {
        let mut configurator = Configurator::<Log>::builder(Log::default()).init().unwrap();
        assert_eq!(
            configurator.add_column(ColumnDescriptor::default()),
            Err(ConfigError::MissingColumnName)
        );

        configurator
            .add_column(ColumnDescriptor::named("x").freeze(Freeze::Right))
            .unwrap();
        assert_eq!(
            configurator.add_column(ColumnDescriptor::named("x").freeze(Freeze::Right)),
            Err(ConfigError::DuplicateColumn("x".to_string()))
        );
    }

    #[test]
    fn dotted_attribute_joins_before_its_filter() {
        let configurator = Configurator::builder(Log::default())
            .column(ColumnDescriptor::attribute("profile.age").query(filter("age")))
            .column(ColumnDescriptor::attribute("profile.weight").query(filter("weight")))
            .rule(Rule::new(["profile_age", "profile_weight"], "integer"))
            .input(json!({"DynamicModel": {
                "columns": "profile_age,profile_weight",
                "profile_age": "30",
                "profile_weight": "70",
            }}))
            .init()
            .unwrap();

        let query = configurator.query();
        assert_eq!(query.0, vec!["join profile", "age 30", "weight 70"]);
        assert_eq!(configurator.query(), query);
    }

    #[test]
    fn column_rule_and_label_reach_filter_model() {
        let configurator = Configurator::builder(Log::default())
            .column(
                ColumnDescriptor::attribute("full_name")
                    .freeze(Freeze::Left)
                    .rule(RuleSpec::new("string").option("max", 4))
                    .query(filter("name")),
            )
            .input(json!({"DynamicModel": {"full_name": "Jane Doe"}}))
            .init()
            .unwrap();

        let model = configurator.filter_model();
        assert!(model.has_attribute("full_name"));
        assert!(model.has_error("full_name"));
        assert_eq!(configurator.labels().get("full_name"), Some("Full Name"));
        // The invalid value is still handed to the step.
        assert_eq!(configurator.query().0, vec!["name \"Jane Doe\""]);
    }

    #[test]
    fn declared_sort_wins_over_column_sort() {
        let configurator = Configurator::builder(Log::default())
            .column(
                ColumnDescriptor::attribute("age")
                    .freeze(Freeze::Left)
                    .sort(SortSpec::new().label("Column age")),
            )
            .sort(SortMap::new().with("age", SortSpec::new().label("Declared age")))
            .init()
            .unwrap();
        assert_eq!(
            configurator.sort().get("age").unwrap().label.as_deref(),
            Some("Declared age")
        );
    }

    #[test]
    fn query_attribute_requires_registered_column() {
        let err = Configurator::builder(Log::default())
            .column(ColumnDescriptor::named("a").freeze(Freeze::Left))
            .query_attribute(QueryAttribute::new(["zzz"], filter("g")))
            .init()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQueryAttribute { index: 0, .. }));

        let err = Configurator::builder(Log::default())
            .query_attribute(QueryAttribute::new(Vec::<String>::new(), filter("g")))
            .init()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQueryAttribute { .. }));
    }

    #[test]
    fn query_attribute_registers_once() {
        let configurator = Configurator::builder(Log::default())
            .column(ColumnDescriptor::named("a").freeze(Freeze::Left))
            .column(ColumnDescriptor::named("b").freeze(Freeze::Left))
            .query_attribute(QueryAttribute::new(
                ["a", "b"],
                step(|mut q: Log, _: Option<&Value>, _: &FilterModel| {
                    q.0.push("global".to_string());
                    q
                }),
            ))
            .init()
            .unwrap();
        assert_eq!(configurator.query().0, vec!["global"]);
    }

    #[test]
    fn grid_config_uses_overrides() {
        let configurator = Configurator::builder(Log::default())
            .column(ColumnDescriptor::named("a").freeze(Freeze::Left).option("format", "text"))
            .init()
            .unwrap();

        let grid = configurator.grid_config(GridOverrides::new());
        assert_eq!(grid.columns.len(), 1);
        assert!(!grid.columns[0].contains_key("name"));
        assert_eq!(grid.columns[0]["format"], "text");

        let custom = configurator.grid_config(GridOverrides::new().columns(Vec::new()));
        assert!(custom.columns.is_empty());

        let provider = configurator.data_provider_config(
            DataProviderOverrides::new().pagination(Pagination::new(5)),
        );
        assert_eq!(provider.pagination.page_size, 5);
    }
}
