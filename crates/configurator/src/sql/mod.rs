//! Select-query backend using SeaQuery.
//!
//! A [`TableModel`] describes the base table, its attribute labels and the
//! relations reachable from it. [`SelectQuery`] wraps a
//! `sea_query::SelectStatement` built against that model and implements
//! [`DataQuery`], so grid columns over dotted attributes join the right
//! tables.

pub mod filters;

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_query::{
    Alias, Asterisk, Expr, Order, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::{DataProvider, Pagination};
use crate::query::DataQuery;
use crate::sort::{OrderTerm, SortDirection};

/// Alias of the derived table wrapped by [`SelectQuery::count_sql`].
const COUNT_ALIAS: &str = "grid_rows";

/// Table alias for a joined relation path: `author.profile` ->
/// `author__profile`. Unique per path, so the same relation reached through
/// different parents gets distinct aliases.
pub fn relation_alias(path: &str) -> String {
    path.replace('.', "__")
}

/// Join type for relations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
}

impl From<JoinType> for sea_query::JoinType {
    fn from(join: JoinType) -> Self {
        match join {
            JoinType::Inner => sea_query::JoinType::InnerJoin,
            JoinType::Left => sea_query::JoinType::LeftJoin,
            JoinType::Right => sea_query::JoinType::RightJoin,
        }
    }
}

/// A table and the relations reachable from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    /// Table name.
    pub name: String,

    /// Display labels keyed by attribute.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Relations keyed by relation name.
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

impl TableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add an attribute label.
    pub fn label(mut self, attribute: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(attribute.into(), label.into());
        self
    }

    /// Add a relation.
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Model reached by following a dotted relation path.
    pub fn resolve(&self, path: &str) -> Option<&TableModel> {
        path.split('.')
            .try_fold(self, |model, hop| model.relations.get(hop).map(|r| &r.table))
    }
}

/// Relation from one table to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Related table model.
    pub table: TableModel,

    /// Column on the owning table.
    pub local_field: String,

    /// Column on the related table.
    #[serde(default = "default_foreign_field")]
    pub foreign_field: String,

    #[serde(default)]
    pub join_type: JoinType,
}

fn default_foreign_field() -> String {
    "id".to_string()
}

impl Relation {
    pub fn new(
        table: TableModel,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            table,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            join_type: JoinType::default(),
        }
    }

    /// Set the join type.
    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }
}

/// SELECT statement over a [`TableModel`].
#[derive(Debug, Clone)]
pub struct SelectQuery {
    model: Arc<TableModel>,
    statement: SelectStatement,
    /// Relation paths joined so far.
    joined: Vec<String>,
}

impl SelectQuery {
    /// `SELECT "table".* FROM "table"`.
    pub fn new(model: TableModel) -> Self {
        let table = Alias::new(&model.name);
        let statement = Query::select()
            .column((table.clone(), Asterisk))
            .from(table)
            .to_owned();
        Self {
            model: Arc::new(model),
            statement,
            joined: Vec::new(),
        }
    }

    pub fn model(&self) -> &TableModel {
        &self.model
    }

    /// Relation paths joined so far, in join order.
    pub fn joined(&self) -> &[String] {
        &self.joined
    }

    /// The underlying statement.
    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    /// Column expression for an attribute.
    ///
    /// Plain attributes refer to the base table; dotted attributes refer to
    /// the alias of their relation path (see [`relation_alias`]).
    pub fn column_ref(&self, attribute: &str) -> Expr {
        match attribute.rsplit_once('.') {
            Some((path, column)) => {
                Expr::col((Alias::new(relation_alias(path)), Alias::new(column)))
            }
            None => Expr::col((Alias::new(&self.model.name), Alias::new(attribute))),
        }
    }

    /// Add a WHERE condition.
    pub fn and_where(mut self, condition: SimpleExpr) -> Self {
        self.statement.and_where(condition);
        self
    }

    /// Add ORDER BY terms.
    pub fn order_by(mut self, terms: &[OrderTerm]) -> Self {
        for (attribute, direction) in terms {
            let order = match direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            let column = self.column_ref(attribute);
            self.statement.order_by_expr(column.into(), order);
        }
        self
    }

    /// Render the statement (PostgreSQL dialect).
    pub fn to_sql(&self) -> String {
        self.statement.to_string(PostgresQueryBuilder)
    }

    /// Render the statement with ordering and a page window.
    pub fn paged_sql(&self, order: &[OrderTerm], pagination: Pagination) -> String {
        let mut query = self.clone().order_by(order);
        if let Some(limit) = pagination.limit() {
            query.statement.limit(limit);
            query.statement.offset(pagination.offset());
        }
        query.to_sql()
    }

    /// Render a COUNT over the filtered rows.
    pub fn count_sql(&self) -> String {
        Query::select()
            .expr(Expr::col(Asterisk).count())
            .from_subquery(self.statement.clone(), Alias::new(COUNT_ALIAS))
            .to_string(PostgresQueryBuilder)
    }
}

impl DataQuery for SelectQuery {
    /// Join each hop of `relation` once, aliased by its relation path.
    fn join_with(mut self, relation: &str) -> Self {
        let model = Arc::clone(&self.model);
        let mut current: &TableModel = &model;
        let mut parent = current.name.clone();
        let mut path = String::new();

        for hop in relation.split('.') {
            let Some(rel) = current.relations.get(hop) else {
                warn!(table = %current.name, relation = %hop, "unknown relation; join ignored");
                return self;
            };

            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(hop);

            let alias = relation_alias(&path);
            if !self.joined.contains(&path) {
                let on = Expr::col((Alias::new(&parent), Alias::new(&rel.local_field)))
                    .equals((Alias::new(&alias), Alias::new(&rel.foreign_field)));
                self.statement.join_as(
                    rel.join_type.into(),
                    Alias::new(&rel.table.name),
                    Alias::new(&alias),
                    on,
                );
                debug!(relation = %path, table = %rel.table.name, alias = %alias, "joined relation");
                self.joined.push(path.clone());
            }

            current = &rel.table;
            parent = alias;
        }
        self
    }

    fn attribute_label(&self, attribute: &str) -> Option<String> {
        let (model, name) = match attribute.rsplit_once('.') {
            Some((path, name)) => (self.model.resolve(path)?, name),
            None => (self.model.as_ref(), attribute),
        };
        model.labels.get(name).cloned()
    }
}

impl DataProvider<SelectQuery> {
    /// SELECT for the current page and ordering.
    pub fn sql(&self) -> String {
        self.query().paged_sql(&self.order(), self.pagination())
    }

    /// COUNT over all filtered rows.
    pub fn count_sql(&self) -> String {
        self.query().count_sql()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::provider::{DataProviderConfig, SortConfig};
    use crate::sort::{SortMap, SortSpec};

    fn users() -> TableModel {
        let profiles = TableModel::new("profiles").label("age", "Age in years");
        let authors = TableModel::new("authors")
            .relation("profile", Relation::new(profiles.clone(), "profile_id", "id"));
        TableModel::new("users")
            .label("dob", "Date of birth")
            .relation("profile", Relation::new(profiles, "profile_id", "id"))
            .relation(
                "author",
                Relation::new(authors, "author_id", "id").join_type(JoinType::Inner),
            )
    }

    #[test]
    fn base_select() {
        let query = SelectQuery::new(users());
        assert_eq!(query.to_sql(), r#"SELECT "users".* FROM "users""#);
    }

    #[test]
    fn join_uses_relation_alias() {
        let sql = SelectQuery::new(users()).join_with("profile").to_sql();
        assert_eq!(
            sql,
            r#"SELECT "users".* FROM "users" LEFT JOIN "profiles" AS "profile" ON "users"."profile_id" = "profile"."id""#
        );
    }

    #[test]
    fn nested_join_joins_each_hop_once() {
        let query = SelectQuery::new(users())
            .join_with("author")
            .join_with("author.profile");
        assert_eq!(query.joined(), &["author", "author.profile"]);

        let sql = query.to_sql();
        assert_eq!(sql.matches("JOIN").count(), 2);
        assert!(sql.contains(r#"INNER JOIN "authors" AS "author""#));
        assert!(sql.contains(
            r#"LEFT JOIN "profiles" AS "author__profile" ON "author"."profile_id" = "author__profile"."id""#
        ));
    }

    #[test]
    fn same_relation_through_different_parents_gets_distinct_aliases() {
        let query = SelectQuery::new(users())
            .join_with("profile")
            .join_with("author.profile");
        let query = query
            .clone()
            .and_where(query.column_ref("profile.age").eq(1))
            .and_where(query.column_ref("author.profile.age").eq(2));

        let sql = query.to_sql();
        assert_eq!(sql.matches(r#"AS "profile""#).count(), 1);
        assert_eq!(sql.matches(r#"AS "author__profile""#).count(), 1);
        assert!(sql.contains(r#""profile"."age" = 1"#));
        assert!(sql.contains(r#""author__profile"."age" = 2"#));
    }

    #[test]
    fn unknown_relation_is_ignored() {
        let query = SelectQuery::new(users()).join_with("nope");
        assert!(query.joined().is_empty());
        assert!(!query.to_sql().contains("JOIN"));
    }

    #[test]
    fn attribute_labels_follow_relations() {
        let query = SelectQuery::new(users());
        assert_eq!(query.attribute_label("dob").as_deref(), Some("Date of birth"));
        assert_eq!(
            query.attribute_label("profile.age").as_deref(),
            Some("Age in years")
        );
        assert_eq!(query.attribute_label("missing"), None);
        assert_eq!(query.attribute_label("nope.age"), None);
    }

    #[test]
    fn paged_and_count_sql() {
        let query = SelectQuery::new(users());
        let order = vec![("name".to_string(), SortDirection::Desc)];
        let sql = query.paged_sql(&order, Pagination::new(10).page(3));
        assert!(sql.ends_with(r#"ORDER BY "users"."name" DESC LIMIT 10 OFFSET 20"#));

        let unpaged = query.paged_sql(&[], Pagination::new(0));
        assert!(!unpaged.contains("LIMIT"));

        assert_eq!(
            query.count_sql(),
            r#"SELECT COUNT(*) FROM (SELECT "users".* FROM "users") AS "grid_rows""#
        );
    }

    #[test]
    fn provider_renders_requested_order() {
        let provider = DataProvider::new(DataProviderConfig {
            query: SelectQuery::new(users()),
            sort: SortConfig {
                attributes: SortMap::new().with("age", SortSpec::new()),
            },
            pagination: Pagination::default(),
        })
        .with_sort_param("-age");

        assert!(provider.sql().contains(r#"ORDER BY "users"."age" DESC LIMIT 20 OFFSET 0"#));
        assert!(provider.count_sql().starts_with("SELECT COUNT(*)"));
    }
}
