use std::collections::{BTreeMap, BTreeSet};

use dac_core::{ForeignKeyEdge, SchemaSnapshot, Table};
use sqlx::{PgPool, Row};

/// A table or view as listed by `information_schema.tables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub schema: String,
    pub name: String,
}

/// One column as listed by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub ordinal_position: i32,
}

/// One column of a foreign-key constraint, paired with the column it
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub constraint_schema: String,
    pub constraint_name: String,
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub ordinal_position: i32,
    pub foreign_table_schema: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

/// Read tables, columns and foreign keys of a Postgres database.
/// Excludes system schemas (pg_catalog, information_schema).
pub async fn introspect_schema(pool: &PgPool) -> anyhow::Result<SchemaSnapshot> {
    let table_rows = sqlx::query(
        r#"
        select table_schema, table_name
        from information_schema.tables
        where table_type in ('BASE TABLE', 'VIEW')
          and table_schema not in ('pg_catalog', 'information_schema')
        order by table_schema, table_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let tables = table_rows
        .into_iter()
        .map(|row| TableRow {
            schema: row.get("table_schema"),
            name: row.get("table_name"),
        })
        .collect();

    let column_rows = sqlx::query(
        r#"
        select table_schema, table_name, column_name, ordinal_position::int4 as ordinal_position
        from information_schema.columns
        where table_schema not in ('pg_catalog', 'information_schema')
        order by table_schema, table_name, ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let columns = column_rows
        .into_iter()
        .map(|row| ColumnRow {
            table_schema: row.get("table_schema"),
            table_name: row.get("table_name"),
            column_name: row.get("column_name"),
            ordinal_position: row.get("ordinal_position"),
        })
        .collect();

    // Pair each referencing column with the referenced column at the same
    // position of the unique constraint, so composite keys line up.
    let fk_rows = sqlx::query(
        r#"
        select
          rc.constraint_schema,
          rc.constraint_name,
          kcu.table_schema,
          kcu.table_name,
          kcu.column_name,
          kcu.ordinal_position::int4 as ordinal_position,
          ref.table_schema as foreign_table_schema,
          ref.table_name as foreign_table_name,
          ref.column_name as foreign_column_name
        from information_schema.referential_constraints rc
        join information_schema.key_column_usage kcu
          on kcu.constraint_schema = rc.constraint_schema
         and kcu.constraint_name = rc.constraint_name
        join information_schema.key_column_usage ref
          on ref.constraint_schema = rc.unique_constraint_schema
         and ref.constraint_name = rc.unique_constraint_name
         and ref.ordinal_position = kcu.position_in_unique_constraint
        where rc.constraint_schema not in ('pg_catalog', 'information_schema')
        order by rc.constraint_schema, rc.constraint_name, kcu.ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let foreign_keys = fk_rows
        .into_iter()
        .map(|row| ForeignKeyRow {
            constraint_schema: row.get("constraint_schema"),
            constraint_name: row.get("constraint_name"),
            table_schema: row.get("table_schema"),
            table_name: row.get("table_name"),
            column_name: row.get("column_name"),
            ordinal_position: row.get("ordinal_position"),
            foreign_table_schema: row.get("foreign_table_schema"),
            foreign_table_name: row.get("foreign_table_name"),
            foreign_column_name: row.get("foreign_column_name"),
        })
        .collect();

    Ok(normalize(tables, columns, foreign_keys))
}

/// Turn raw catalog rows into a snapshot.
///
/// Table names become `schema.table`. Columns keep ordinal order. Rows of one
/// constraint collapse into a single composite edge. Constraints that touch a
/// table missing from `tables` (e.g. one the connecting role cannot see) are
/// dropped.
pub fn normalize(
    tables: Vec<TableRow>,
    columns: Vec<ColumnRow>,
    foreign_keys: Vec<ForeignKeyRow>,
) -> SchemaSnapshot {
    let mut by_table: BTreeMap<String, Vec<(i32, String)>> = tables
        .iter()
        .map(|t| (qualified(&t.schema, &t.name), Vec::new()))
        .collect();

    for column in columns {
        if let Some(cols) = by_table.get_mut(&qualified(&column.table_schema, &column.table_name)) {
            cols.push((column.ordinal_position, column.column_name));
        }
    }

    let known: BTreeSet<String> = by_table.keys().cloned().collect();

    let tables = by_table
        .into_iter()
        .map(|(name, mut cols)| {
            cols.sort();
            Table::new(name, cols.into_iter().map(|(_, c)| c))
        })
        .collect();

    let mut constraints: BTreeMap<(String, String, String), Vec<ForeignKeyRow>> = BTreeMap::new();
    for row in foreign_keys {
        let key = (
            row.constraint_schema.clone(),
            row.constraint_name.clone(),
            qualified(&row.table_schema, &row.table_name),
        );
        constraints.entry(key).or_default().push(row);
    }

    let mut edges = Vec::with_capacity(constraints.len());
    for ((_, constraint_name, from_table), mut rows) in constraints {
        rows.sort_by_key(|r| r.ordinal_position);
        let to_table = qualified(&rows[0].foreign_table_schema, &rows[0].foreign_table_name);

        if !known.contains(&from_table) || !known.contains(&to_table) {
            tracing::warn!(
                constraint = %constraint_name,
                from = %from_table,
                to = %to_table,
                "Skipping foreign key to a table outside the captured schema"
            );
            continue;
        }

        edges.push(
            ForeignKeyEdge::new(
                from_table,
                rows.iter().map(|r| r.column_name.clone()),
                to_table,
                rows.iter().map(|r| r.foreign_column_name.clone()),
            )
            .named(constraint_name),
        );
    }

    SchemaSnapshot::new(tables, edges)
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{schema}.{table}")
}
