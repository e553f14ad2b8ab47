use crate::schema::{check_name, Column, ColumnType, Schema, TableSchema};

fn sql_type(col: &Column) -> &'static str {
    match col.col_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Boolean => "INTEGER",
        ColumnType::Text => "TEXT",
        ColumnType::Timestamp => "TEXT",
        ColumnType::Enum(_) => "TEXT",
    }
}

/// Generate CREATE TABLE SQL for a table schema. Tables are STRICT so the
/// engine rejects values of the wrong storage class.
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", schema.name);
    let mut columns = Vec::new();
    let mut constraints = Vec::new();

    for col in schema.columns {
        if col.auto_increment {
            columns.push(format!("    {} INTEGER PRIMARY KEY AUTOINCREMENT", col.name));
            continue;
        }

        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        columns.push(format!("    {} {}{}", col.name, sql_type(col), null_constraint));

        if let ColumnType::Enum(enum_type) = col.col_type {
            let allowed: Vec<String> = enum_type
                .variants
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect();
            constraints.push(format!(
                "    CONSTRAINT {} CHECK ({} IN ({}))",
                enum_type.name,
                col.name,
                allowed.join(", ")
            ));
        }

        if let Some(predicate) = col.col_type.domain_predicate(col.name) {
            constraints.push(format!(
                "    CONSTRAINT {} CHECK ({})",
                check_name(col.name),
                predicate
            ));
        }

        if let Some(check) = col.check {
            constraints.push(format!(
                "    CONSTRAINT {} CHECK ({})",
                check.name(col.name),
                check.predicate(col.name)
            ));
        }
    }

    // Auto-increment keys are declared inline
    let inline_key = schema.columns.iter().any(|c| c.auto_increment);
    if !inline_key {
        columns.push(format!("    PRIMARY KEY ({})", schema.primary_key.join(", ")));
    }

    columns.extend(constraints);

    for fk in schema.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
            fk.column,
            fk.references_table,
            fk.references_column,
            fk.on_delete.as_sql()
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n) STRICT");

    sql
}

/// Generate CREATE INDEX statements for foreign key columns.
/// A column leading the primary key is already indexed and is skipped.
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys
        .iter()
        .filter(|fk| schema.primary_key.first() != Some(&fk.column))
        .map(|fk| {
            format!(
                "CREATE INDEX idx_{}_{} ON {}({})",
                schema.name, fk.column, schema.name, fk.column
            )
        })
        .collect()
}

/// All statements for `tables`, parents first
pub fn generate_statements(tables: &[&TableSchema]) -> Vec<String> {
    let mut statements = Vec::new();
    for table in tables {
        statements.push(generate_create_table(table));
        statements.extend(generate_indexes(table));
    }
    statements
}

/// Full DDL script for a schema
pub fn generate_schema(schema: &Schema) -> String {
    generate_statements(schema.tables())
        .iter()
        .map(|stmt| format!("{};\n", stmt))
        .collect::<Vec<_>>()
        .join("\n")
}
