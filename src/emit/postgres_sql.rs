// src/emit/postgres_sql.rs

//! PostgreSQL-specific mapping rules: one function per `Change` variant,
//! each returning `(kind, slug, up_body, down_body)`.

use crate::diff::Change;
use crate::schema::{Field, Index, RefAction, Relationship, TableSchema};

pub(super) fn render(change: &Change) -> (String, String, String, String) {
    match change {
        Change::CreateTable(table) => create_table(table),
        Change::DropTable(table) => drop_table(table),
        Change::AddColumn(table, field) => add_column(table, field),
        Change::DropColumn(table, field) => drop_column(table, field),
        Change::AlterColumn(table, name, prior, next) => alter_column(table, name, prior, next),
        Change::AddIndex(table, index) => add_index(table, index),
        Change::DropIndex(table, index) => drop_index(table, index),
        Change::AddForeignKey(table, rel) => add_foreign_key(table, rel),
        Change::DropForeignKey(table, rel) => drop_foreign_key(table, rel),
    }
}

/// Render a column definition for use inside `CREATE TABLE` / a recreating
/// `ADD COLUMN`: `{TYPE} [PRIMARY KEY | [NOT NULL] [UNIQUE]] [DEFAULT ...]`.
fn column_def(field: &Field) -> String {
    let mut parts = vec![field.field_type.sql_name().to_string()];
    if field.primary_key {
        parts.push("PRIMARY KEY".to_string());
    } else {
        if field.not_null {
            parts.push("NOT NULL".to_string());
        }
        if field.unique {
            parts.push("UNIQUE".to_string());
        }
    }
    if let Some(default) = &field.default_value {
        parts.push(format!("DEFAULT {default}"));
    }
    parts.join(" ")
}

fn create_table(table: &TableSchema) -> (String, String, String, String) {
    let needs_uuid_extension = table
        .fields
        .iter()
        .any(|f| f.field_type == crate::schema::FieldType::Uuid);

    let mut up = String::new();
    if needs_uuid_extension {
        up.push_str("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";\n");
    }

    let columns: Vec<String> = table
        .fields
        .iter()
        .map(|f| format!("    {} {}", f.name, column_def(f)))
        .collect();
    up.push_str(&format!(
        "CREATE TABLE {} (\n{}\n);\n",
        table.table_name,
        columns.join(",\n")
    ));

    let down = format!("DROP TABLE IF EXISTS {} CASCADE;\n", table.table_name);

    (
        "CreateTable".to_string(),
        format!("create_{}", table.table_name),
        up,
        down,
    )
}

fn drop_table(table: &TableSchema) -> (String, String, String, String) {
    let up = format!("DROP TABLE IF EXISTS {} CASCADE;\n", table.table_name);

    let columns: Vec<String> = table
        .fields
        .iter()
        .map(|f| format!("    {} {}", f.name, column_def(f)))
        .collect();
    let mut down = String::new();
    if table
        .fields
        .iter()
        .any(|f| f.field_type == crate::schema::FieldType::Uuid)
    {
        down.push_str("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";\n");
    }
    down.push_str(&format!(
        "CREATE TABLE {} (\n{}\n);\n",
        table.table_name,
        columns.join(",\n")
    ));
    for index in &table.indexes {
        down.push_str(&index_statement(&table.table_name, index));
        down.push('\n');
    }

    (
        "DropTable".to_string(),
        format!("drop_{}", table.table_name),
        up,
        down,
    )
}

fn add_column(table: &str, field: &Field) -> (String, String, String, String) {
    let mut clause = format!("ALTER TABLE {table} ADD COLUMN {} {}", field.name, field.field_type.sql_name());
    if field.not_null {
        clause.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default_value {
        clause.push_str(&format!(" DEFAULT {default}"));
    }
    if field.unique {
        clause.push_str(" UNIQUE");
    }
    clause.push_str(";\n");

    let down = format!("ALTER TABLE {table} DROP COLUMN {};\n", field.name);

    (
        "AddColumn".to_string(),
        format!("{table}_add_column_{}", field.name),
        clause,
        down,
    )
}

fn drop_column(table: &str, prior: &Field) -> (String, String, String, String) {
    let up = format!("ALTER TABLE {table} DROP COLUMN {};\n", prior.name);
    let down = format!(
        "ALTER TABLE {table} ADD COLUMN {} {};\n",
        prior.name,
        column_def(prior)
    );

    (
        "DropColumn".to_string(),
        format!("{table}_drop_column_{}", prior.name),
        up,
        down,
    )
}

/// The minimal sequence of `ALTER TABLE ... ALTER COLUMN ...` clauses that
/// transitions a column from `from` to `to`.
fn alter_column_clauses(table: &str, name: &str, from: &Field, to: &Field) -> Vec<String> {
    let mut clauses = Vec::new();

    if from.field_type != to.field_type {
        clauses.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {name} TYPE {};\n",
            to.field_type.sql_name()
        ));
    }

    if from.not_null != to.not_null {
        if to.not_null {
            clauses.push(format!("ALTER TABLE {table} ALTER COLUMN {name} SET NOT NULL;\n"));
        } else {
            clauses.push(format!("ALTER TABLE {table} ALTER COLUMN {name} DROP NOT NULL;\n"));
        }
    }

    if from.default_value != to.default_value {
        match &to.default_value {
            Some(default) => clauses.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {name} SET DEFAULT {default};\n"
            )),
            None => clauses.push(format!("ALTER TABLE {table} ALTER COLUMN {name} DROP DEFAULT;\n")),
        }
    }

    if from.unique != to.unique {
        let constraint = format!("{table}_{name}_key");
        if to.unique {
            clauses.push(format!(
                "ALTER TABLE {table} ADD CONSTRAINT {constraint} UNIQUE ({name});\n"
            ));
        } else {
            clauses.push(format!("ALTER TABLE {table} DROP CONSTRAINT {constraint};\n"));
        }
    }

    clauses
}

fn alter_column(table: &str, name: &str, prior: &Field, next: &Field) -> (String, String, String, String) {
    let up = alter_column_clauses(table, name, prior, next).join("");
    let down = alter_column_clauses(table, name, next, prior).join("");

    (
        "AlterColumn".to_string(),
        format!("{table}_alter_column_{name}"),
        up,
        down,
    )
}

fn index_statement(table: &str, index: &Index) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {unique}INDEX {} ON {table} ({});\n",
        index.name,
        index.columns.join(", ")
    )
}

fn add_index(table: &str, index: &Index) -> (String, String, String, String) {
    let up = index_statement(table, index);
    let down = format!("DROP INDEX IF EXISTS {};\n", index.name);

    (
        "AddIndex".to_string(),
        format!("{table}_add_index_{}", index.name),
        up,
        down,
    )
}

fn drop_index(table: &str, prior: &Index) -> (String, String, String, String) {
    let up = format!("DROP INDEX IF EXISTS {};\n", prior.name);
    let down = index_statement(table, prior);

    (
        "DropIndex".to_string(),
        format!("{table}_drop_index_{}", prior.name),
        up,
        down,
    )
}

fn fk_statement(table: &str, rel: &Relationship) -> String {
    format!(
        "ALTER TABLE {table} ADD CONSTRAINT fk_{} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {};\n",
        rel.name,
        rel.column,
        rel.references_table,
        rel.references_column,
        action_sql(rel.on_delete),
        action_sql(rel.on_update),
    )
}

fn action_sql(action: RefAction) -> &'static str {
    action.sql_name()
}

fn add_foreign_key(table: &str, rel: &Relationship) -> (String, String, String, String) {
    let up = fk_statement(table, rel);
    let down = format!("ALTER TABLE {table} DROP CONSTRAINT fk_{};\n", rel.name);

    (
        "AddForeignKey".to_string(),
        format!("{table}_add_fk_{}", rel.column),
        up,
        down,
    )
}

fn drop_foreign_key(table: &str, prior: &Relationship) -> (String, String, String, String) {
    let up = format!("ALTER TABLE {table} DROP CONSTRAINT fk_{};\n", prior.name);
    let down = fk_statement(table, prior);

    (
        "DropForeignKey".to_string(),
        format!("{table}_drop_fk_{}", prior.column),
        up,
        down,
    )
}
