#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Grid definition tests.
//!
//! YAML/JSON definitions configured against request input and rendered to
//! SQL through the sea-query backend.

use grid_configurator::sql::filters::FilterOperator;
use grid_configurator::sql::{SelectQuery, TableModel};
use grid_configurator::{
    ColumnDescriptor, ConfigError, Configurator, DataProvider, DataProviderOverrides, Freeze,
    GridDefinition, Rule, SortDirection,
};
use grid_configurator_test_utils::{assert, input, tables};
use serde_json::json;

const USERS_GRID: &str = r#"
id: users
table: { name: users }
rules:
  - [[first_name, last_name], string, { max: 64 }]
  - [status, in, { range: [active, blocked] }]
columns:
  - { attribute: id, freeze: left, format: integer }
  - attribute: first_name
    query: [{ operator: starts_with }]
    sort: {}
  - attribute: last_name
    query: [{ operator: contains }]
  - attribute: status
    query: [{ operator: equals }]
  - attribute: profile.age
    rule: [integer, { min: 0 }]
    query: [{ operator: greater_or_equal }]
  - { name: actions, freeze: right, visible: true }
sort:
  name:
    asc: [[last_name, asc], [first_name, asc]]
    desc: [[last_name, desc], [first_name, desc]]
pagination: { page_size: 10 }
"#;

fn users_grid() -> GridDefinition {
    let mut definition = GridDefinition::from_yaml(USERS_GRID).unwrap();
    definition.table = serde_json::from_value(tables::users()).unwrap();
    definition
}

#[test]
fn test_definition_renders_filtered_sql() {
    let configurator = users_grid()
        .configure(input::values(&[
            ("columns", json!("first_name,profile_age,status")),
            ("first_name", json!("Jo_")),
            ("status", json!("active")),
            ("profile_age", json!("18")),
        ]))
        .unwrap();

    assert::column_order(
        configurator.columns(),
        &["id", "first_name", "profile_age", "status", "actions"],
    );

    let sql = configurator.query().to_sql();
    assert::contains(&sql, r#"LEFT JOIN "profiles" AS "profile" ON "users"."profile_id" = "profile"."id""#);
    assert::contains(&sql, r#""users"."first_name" LIKE"#);
    assert::contains(&sql, r#""users"."status" = 'active'"#);
    assert::contains(&sql, r#""profile"."age" >= 18"#);
    assert::not_contains(&sql, "last_name");
}

#[test]
fn test_invalid_input_is_reported_but_applied() {
    let configurator = users_grid()
        .configure(input::values(&[
            ("columns", json!("status")),
            ("status", json!("deleted")),
        ]))
        .unwrap();

    assert!(configurator.filter_model().has_error("status"));
    assert::contains(&configurator.query().to_sql(), "'deleted'");
}

#[test]
fn test_record_model_labels() {
    let mut definition = users_grid();
    definition
        .table
        .labels
        .insert("first_name".to_string(), "Given name".to_string());

    let configurator = definition.configure(input::columns("first_name")).unwrap();
    assert_eq!(configurator.labels()["first_name"], "Given name");
    assert_eq!(configurator.labels()["id"], "Id");
}

#[test]
fn test_provider_sql_with_sort_and_page() {
    let configurator = users_grid()
        .configure(input::columns("first_name"))
        .unwrap();

    let provider = DataProvider::new(configurator.data_provider_config(DataProviderOverrides::new()))
        .with_sort_param("-name")
        .with_page(3);

    assert_eq!(
        provider.order(),
        vec![
            ("last_name".to_string(), SortDirection::Desc),
            ("first_name".to_string(), SortDirection::Desc),
        ]
    );
    let sql = provider.sql();
    assert::contains(&sql, r#"ORDER BY "users"."last_name" DESC, "users"."first_name" DESC"#);
    assert::contains(&sql, "LIMIT 10 OFFSET 20");
    assert::contains(&provider.count_sql(), r#"AS "grid_rows""#);
}

#[test]
fn test_sort_keys_from_columns_and_declaration() {
    let configurator = users_grid()
        .configure(input::columns("first_name"))
        .unwrap();
    let keys: Vec<_> = configurator.sort().keys().collect();
    assert_eq!(keys, vec!["first_name", "name"]);
}

#[test]
fn test_nested_relation_filter() {
    let yaml = r#"
table: { name: users }
columns:
  - attribute: author.company.name
    rule: string
    query: [{ operator: equals }]
"#;
    let mut definition = GridDefinition::from_yaml(yaml).unwrap();
    definition.table = serde_json::from_value(tables::users()).unwrap();

    let configurator = definition
        .configure(input::values(&[
            ("columns", json!("author_company_name")),
            ("author_company_name", json!("Acme")),
        ]))
        .unwrap();

    let sql = configurator.query().to_sql();
    assert::contains(&sql, r#"INNER JOIN "authors" AS "author""#);
    assert::contains(
        &sql,
        r#"LEFT JOIN "companies" AS "author__company" ON "author"."company_id" = "author__company"."id""#,
    );
    assert::contains(&sql, r#""author__company"."name" = 'Acme'"#);
}

#[test]
fn test_shared_relation_name_on_two_paths() {
    let yaml = r#"
table: { name: users }
columns:
  - attribute: profile.age
    rule: integer
    query: [{ operator: equals }]
  - attribute: author.profile.age
    rule: integer
    query: [{ operator: equals }]
"#;
    let mut definition = GridDefinition::from_yaml(yaml).unwrap();
    definition.table = serde_json::from_value(tables::users()).unwrap();

    let configurator = definition
        .configure(input::values(&[
            ("columns", json!("profile_age,author_profile_age")),
            ("profile_age", json!("1")),
            ("author_profile_age", json!("2")),
        ]))
        .unwrap();

    let sql = configurator.query().to_sql();
    assert_eq!(sql.matches(r#"AS "profile""#).count(), 1, "{sql}");
    assert::contains(
        &sql,
        r#"LEFT JOIN "profiles" AS "author__profile" ON "author"."profile_id" = "author__profile"."id""#,
    );
    assert::contains(&sql, r#""profile"."age" = 1"#);
    assert::contains(&sql, r#""author__profile"."age" = 2"#);
}

#[test]
fn test_definition_errors() {
    let err = GridDefinition::from_yaml("table: { name: t }\nrules:\n  - [{ a: 1 }, safe]\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDefinition(_)));

    let definition =
        GridDefinition::from_yaml("table: { name: t }\nrules:\n  - [a, telepathy]\n").unwrap();
    assert_eq!(
        definition.configure(json!({})).unwrap_err(),
        ConfigError::UnknownValidator("telepathy".to_string())
    );

    let definition = GridDefinition::from_yaml(
        "table: { name: t }\ncolumns:\n  - { freeze: left }\n",
    )
    .unwrap();
    assert_eq!(
        definition.configure(json!({})).unwrap_err(),
        ConfigError::MissingColumnName
    );
}

#[test]
fn test_definition_from_json_file() {
    let path = std::env::temp_dir().join(format!("gridcfg-test-{}.json", std::process::id()));
    std::fs::write(
        &path,
        json!({
            "table": { "name": "items" },
            "form_name": "ItemSearch",
            "columns": [{ "attribute": "title", "freeze": "left" }]
        })
        .to_string(),
    )
    .unwrap();

    let definition = GridDefinition::from_path(&path);
    std::fs::remove_file(&path).ok();

    let configurator = definition.unwrap().configure(json!({})).unwrap();
    assert_eq!(configurator.filter_model().form_name(), "ItemSearch");
    assert::column_order(configurator.columns(), &["title"]);
}

#[test]
fn test_code_and_data_columns_mix() {
    let table: TableModel = serde_json::from_value(tables::users()).unwrap();
    let configurator = Configurator::builder(SelectQuery::new(table))
        .rule(Rule::new(["min_age"], "integer"))
        .column(
            ColumnDescriptor::attribute("profile.age")
                .freeze(Freeze::Left)
                .query(grid_configurator::sql::filters::compare(
                    "profile.age",
                    FilterOperator::GreaterThan,
                )),
        )
        .input(input::values(&[("profile_age", json!(30))]))
        .init()
        .unwrap();

    // `profile_age` has no rule, so it is not a filter attribute.
    let sql = configurator.query().to_sql();
    assert::contains(&sql, "JOIN");
    assert::not_contains(&sql, "WHERE");
}

#[test]
fn test_sort_declared_as_list() {
    let yaml = r#"
table: { name: users }
sort:
  - created
  - name:
      asc: [[last_name, asc], [first_name, asc]]
"#;
    let configurator = GridDefinition::from_yaml(yaml)
        .unwrap()
        .configure(json!({}))
        .unwrap();
    let keys: Vec<_> = configurator.sort().keys().collect();
    assert_eq!(keys, vec!["created", "name"]);
    assert_eq!(
        configurator.sort().resolve("-created"),
        vec![("created".to_string(), SortDirection::Desc)]
    );
}
