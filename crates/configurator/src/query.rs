//! Query composition.
//!
//! The configurator never executes queries. It collects query steps keyed by
//! filter attribute and folds the base query through them, in registration
//! order, when the composed query is requested.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::filter_model::FilterModel;

/// The query-builder interface the configurator needs.
///
/// Predicates are added by the query steps themselves, using the concrete
/// query type's own API; the configurator only has to request relation joins
/// and look up record-model labels.
pub trait DataQuery: Clone {
    /// Join a relation by dotted path (e.g. `"author.profile"`).
    fn join_with(self, relation: &str) -> Self;

    /// Label the record model defines for an attribute, if any.
    fn attribute_label(&self, _attribute: &str) -> Option<String> {
        None
    }
}

/// One query mutation: `(query, filter value, filter model) -> query`.
pub trait QueryStep<Q>: Send + Sync {
    fn apply(&self, query: Q, value: Option<&Value>, model: &FilterModel) -> Q;
}

impl<Q, F> QueryStep<Q> for F
where
    F: Fn(Q, Option<&Value>, &FilterModel) -> Q + Send + Sync,
{
    fn apply(&self, query: Q, value: Option<&Value>, model: &FilterModel) -> Q {
        self(query, value, model)
    }
}

/// Shared, type-erased query step.
pub type SharedStep<Q> = Arc<dyn QueryStep<Q>>;

/// Wrap a closure as a [`SharedStep`].
pub fn step<Q, F>(f: F) -> SharedStep<Q>
where
    F: Fn(Q, Option<&Value>, &FilterModel) -> Q + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Joins one relation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    relation: String,
}

impl JoinStep {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }
}

impl<Q: DataQuery> QueryStep<Q> for JoinStep {
    fn apply(&self, query: Q, _value: Option<&Value>, _model: &FilterModel) -> Q {
        query.join_with(&self.relation)
    }
}

/// Relation part of a dotted attribute: `"author.profile.age"` ->
/// `"author.profile"`. Plain attributes have none.
pub fn relation_path(attribute: &str) -> Option<&str> {
    attribute
        .rsplit_once('.')
        .map(|(relation, _)| relation)
        .filter(|relation| !relation.is_empty())
}

/// Relation paths that already have a join step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSet {
    joined: BTreeSet<String>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relation path to join for `attribute`, or `None` when the attribute
    /// has no relation or its relation is already joined.
    pub fn plan(&self, attribute: &str) -> Option<String> {
        relation_path(attribute)
            .filter(|relation| !self.joined.contains(*relation))
            .map(str::to_string)
    }

    /// Record a relation as joined.
    pub fn record(&mut self, relation: impl Into<String>) {
        self.joined.insert(relation.into());
    }

    pub fn contains(&self, relation: &str) -> bool {
        self.joined.contains(relation)
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }
}

/// Key a step list is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKey {
    /// Fed with the filter model's value for this attribute.
    Attribute(String),
    /// Global step; always fed `None`.
    Global(usize),
}

/// Ordered step lists applied against a base query.
pub struct QueryComposer<Q> {
    entries: Vec<(StepKey, Vec<SharedStep<Q>>)>,
    globals: usize,
}

impl<Q> Default for QueryComposer<Q> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            globals: 0,
        }
    }
}

impl<Q> fmt::Debug for QueryComposer<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, steps)| (key, steps.len()))
            .collect();
        f.debug_struct("QueryComposer")
            .field("entries", &entries)
            .finish()
    }
}

impl<Q> QueryComposer<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to an attribute's list, creating the list at the end of
    /// the registration order if needed.
    pub fn push(&mut self, attribute: &str, step: SharedStep<Q>) {
        let existing = self
            .entries
            .iter_mut()
            .find(|(key, _)| matches!(key, StepKey::Attribute(a) if a == attribute));
        match existing {
            Some((_, steps)) => steps.push(step),
            None => self
                .entries
                .push((StepKey::Attribute(attribute.to_string()), vec![step])),
        }
    }

    /// Register a global step in its own list.
    pub fn push_global(&mut self, step: SharedStep<Q>) {
        self.entries.push((StepKey::Global(self.globals), vec![step]));
        self.globals += 1;
    }

    /// Registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &StepKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Number of steps registered under an attribute.
    pub fn step_count(&self, attribute: &str) -> usize {
        self.entries
            .iter()
            .find(|(key, _)| matches!(key, StepKey::Attribute(a) if a == attribute))
            .map_or(0, |(_, steps)| steps.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Q: Clone> QueryComposer<Q> {
    /// Fold `base` through every step list in registration order.
    pub fn compose(&self, base: &Q, model: &FilterModel) -> Q {
        let mut query = base.clone();
        for (key, steps) in &self.entries {
            let value = match key {
                StepKey::Attribute(attribute) => model.value(attribute),
                StepKey::Global(_) => None,
            };
            for step in steps {
                query = step.apply(query, value, model);
            }
        }
        query
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Trace(Vec<String>);

    impl DataQuery for Trace {
        fn join_with(mut self, relation: &str) -> Self {
            self.0.push(format!("join:{relation}"));
            self
        }
    }

    fn record(tag: &'static str) -> SharedStep<Trace> {
        step(move |mut q: Trace, value: Option<&Value>, _: &FilterModel| {
            let value = value.map_or("-".to_string(), ToString::to_string);
            q.0.push(format!("{tag}={value}"));
            q
        })
    }

    fn model_with(values: &[(&str, Value)]) -> FilterModel {
        let mut model = FilterModel::new("F");
        for (name, value) in values {
            model.define_attribute(*name);
            model.set_value(name, value.clone());
        }
        model
    }

    #[test]
    fn relation_path_drops_last_segment() {
        assert_eq!(relation_path("profile.age"), Some("profile"));
        assert_eq!(relation_path("author.profile.age"), Some("author.profile"));
        assert_eq!(relation_path("age"), None);
        assert_eq!(relation_path(".age"), None);
    }

    #[test]
    fn join_set_plans_each_relation_once() {
        let mut joins = JoinSet::new();
        assert_eq!(joins.plan("profile.age"), Some("profile".to_string()));
        joins.record("profile");
        assert_eq!(joins.plan("profile.weight"), None);
        assert_eq!(joins.plan("author.name"), Some("author".to_string()));
        assert_eq!(joins.plan("name"), None);
        assert_eq!(joins.len(), 1);
    }

    #[test]
    fn compose_threads_values_in_registration_order() {
        let mut composer = QueryComposer::new();
        composer.push("b", record("b1"));
        composer.push_global(record("g"));
        composer.push("a", record("a1"));
        composer.push("b", record("b2"));

        let model = model_with(&[("a", json!("x")), ("b", json!(2))]);
        let query = composer.compose(&Trace::default(), &model);

        assert_eq!(query.0, vec!["b1=2", "b2=2", "g=-", "a1=\"x\""]);
        assert_eq!(composer.step_count("b"), 2);
        assert_eq!(composer.len(), 3);
    }

    #[test]
    fn unknown_attribute_reads_as_none() {
        let mut composer = QueryComposer::new();
        composer.push("missing", record("m"));
        let query = composer.compose(&Trace::default(), &FilterModel::new("F"));
        assert_eq!(query.0, vec!["m=-"]);
    }

    #[test]
    fn join_step_runs_through_data_query() {
        let mut composer = QueryComposer::new();
        composer.push("profile_age", Arc::new(JoinStep::new("profile")));
        composer.push("profile_age", record("p"));
        let query = composer.compose(&Trace::default(), &FilterModel::new("F"));
        assert_eq!(query.0, vec!["join:profile", "p=-"]);
    }

    #[test]
    fn compose_is_repeatable() {
        let mut composer = QueryComposer::new();
        composer.push("a", Arc::new(JoinStep::new("rel")));
        composer.push("a", record("a"));
        let model = model_with(&[("a", json!(1))]);
        let first = composer.compose(&Trace::default(), &model);
        let second = composer.compose(&Trace::default(), &model);
        assert_eq!(first, second);
    }
}
