//! SQL for row access and relationship traversal.
//!
//! Every statement takes the source row's primary key as its positional
//! parameters, in key order.

use crate::schema::{RelationKind, Relationship, Schema, TableSchema};

/// `alias.col AS col, ...` for every column of `table`
fn select_list(table: &TableSchema, alias: &str) -> String {
    table
        .columns
        .iter()
        .map(|c| format!("{alias}.{name} AS {name}", name = c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `alias.pk1 = ? AND alias.pk2 = ?`
fn key_filter(table: &TableSchema, alias: &str) -> String {
    table
        .primary_key
        .iter()
        .map(|k| format!("{alias}.{k} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn order_by(table: &TableSchema, alias: &str) -> String {
    table
        .primary_key
        .iter()
        .map(|k| format!("{alias}.{k}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_all(table: &TableSchema) -> String {
    format!(
        "SELECT {} FROM {} t ORDER BY {}",
        select_list(table, "t"),
        table.name,
        order_by(table, "t")
    )
}

pub fn select_by_key(table: &TableSchema) -> String {
    format!(
        "SELECT {} FROM {} t WHERE {}",
        select_list(table, "t"),
        table.name,
        key_filter(table, "t")
    )
}

/// Primary key columns only, for walking owned children
pub fn select_keys_related(
    schema: &Schema,
    source: &TableSchema,
    rel: &Relationship,
    target: &TableSchema,
) -> String {
    let keys = target
        .primary_key
        .iter()
        .map(|k| format!("t.{k}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} {}", keys, related_body(schema, source, rel, target))
}

pub fn insert(table: &TableSchema, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table.name);
    }
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        columns.join(", "),
        placeholders.join(", ")
    )
}

pub fn delete_by_key(table: &TableSchema) -> String {
    let filter = table
        .primary_key
        .iter()
        .map(|k| format!("{k} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("DELETE FROM {} WHERE {}", table.name, filter)
}

/// Rows of `target` reachable from one `source` row through `rel`
pub fn select_related(
    schema: &Schema,
    source: &TableSchema,
    rel: &Relationship,
    target: &TableSchema,
) -> String {
    let distinct = if matches!(rel.kind, RelationKind::Through { .. }) {
        "DISTINCT "
    } else {
        ""
    };
    format!(
        "SELECT {}{} {} ORDER BY {}",
        distinct,
        select_list(target, "t"),
        related_body(schema, source, rel, target),
        order_by(target, "t")
    )
}

/// `FROM ... WHERE ...` joining `target t` to the keyed `source s`
fn related_body(
    schema: &Schema,
    source: &TableSchema,
    rel: &Relationship,
    target: &TableSchema,
) -> String {
    let join = match rel.kind {
        RelationKind::BelongsTo { column } => {
            let referenced = source
                .foreign_key(column)
                .map(|fk| fk.references_column)
                .unwrap_or("id");
            format!("JOIN {} s ON s.{} = t.{}", source.name, column, referenced)
        }
        RelationKind::HasMany | RelationKind::OwnsMany => {
            let (column, referenced) = target
                .foreign_keys_to(source.name)
                .next()
                .map(|fk| (fk.column, fk.references_column))
                .unwrap_or(("id", "id"));
            format!("JOIN {} s ON t.{} = s.{}", source.name, column, referenced)
        }
        RelationKind::Through {
            junction,
            local_column,
            remote_column,
        } => {
            let local_ref = junction_ref(schema, junction, local_column);
            let remote_ref = junction_ref(schema, junction, remote_column);
            format!(
                "JOIN {junction} j ON j.{remote_column} = t.{remote_ref} \
                 JOIN {} s ON j.{local_column} = s.{local_ref}",
                source.name
            )
        }
    };

    format!("FROM {} t {} WHERE {}", target.name, join, key_filter(source, "s"))
}

/// Link one source row to one target row through a junction table
pub fn insert_link(
    schema: &Schema,
    source: &TableSchema,
    target: &TableSchema,
    junction: &str,
    local_column: &str,
    remote_column: &str,
) -> String {
    format!(
        "INSERT INTO {junction} ({local_column}, {remote_column}) \
         SELECT s.{}, t.{} FROM {} s, {} t WHERE {} AND {}",
        junction_ref(schema, junction, local_column),
        junction_ref(schema, junction, remote_column),
        source.name,
        target.name,
        key_filter(source, "s"),
        key_filter(target, "t")
    )
}

/// Remove the junction row linking one source row to one target row
pub fn delete_link(
    schema: &Schema,
    source: &TableSchema,
    target: &TableSchema,
    junction: &str,
    local_column: &str,
    remote_column: &str,
) -> String {
    format!(
        "DELETE FROM {junction} \
         WHERE {local_column} IN (SELECT s.{} FROM {} s WHERE {}) \
         AND {remote_column} IN (SELECT t.{} FROM {} t WHERE {})",
        junction_ref(schema, junction, local_column),
        source.name,
        key_filter(source, "s"),
        junction_ref(schema, junction, remote_column),
        target.name,
        key_filter(target, "t")
    )
}

/// Column that `junction.column` references. The registry has already
/// checked the foreign key exists.
fn junction_ref(schema: &Schema, junction: &str, column: &str) -> &'static str {
    schema
        .table(junction)
        .and_then(|j| j.foreign_key(column))
        .map(|fk| fk.references_column)
        .unwrap_or("id")
}
