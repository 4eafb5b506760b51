// src/schema/merger.rs

//! Schema merger (C3): groups fragments by table name, runs their `build`
//! effects in a stable order, applies deferred alterations, and validates
//! the schema invariants. Produces the `SchemaSet` consumed by the
//! snapshot store, diff engine, and model codegen adapter.

use super::builder::{Fragment, SchemaBuilder};
use super::model::TableSchema;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// The full universe of merged tables for one generation, in deterministic
/// insertion order: by the lexicographic order of the numeric file-prefix
/// of the first contributing fragment, then by table name.
pub type SchemaSet = IndexMap<String, TableSchema>;

/// Merge a set of fragments into a validated `SchemaSet`.
///
/// `fragments` need not be pre-sorted; this function sorts by
/// `Fragment::identifier` internally so callers can hand it fragments in
/// whatever order schema-directory discovery returned them.
pub fn merge(fragments: &[Box<dyn Fragment>]) -> Result<SchemaSet> {
    let mut order: Vec<usize> = (0..fragments.len()).collect();
    order.sort_by(|&a, &b| fragments[a].identifier().cmp(fragments[b].identifier()));

    // Group contributing fragment indices by table name, preserving the
    // sorted order within each group.
    let mut by_table: IndexMap<String, Vec<usize>> = IndexMap::new();
    for &idx in &order {
        by_table
            .entry(fragments[idx].table_name().to_string())
            .or_default()
            .push(idx);
    }

    // Determine table emission order: by the identifier of each table's
    // first contributing fragment, then by table name as a tie-break.
    let mut table_order: Vec<String> = by_table.keys().cloned().collect();
    table_order.sort_by(|a, b| {
        let first_a = fragments[by_table[a][0]].identifier();
        let first_b = fragments[by_table[b][0]].identifier();
        first_a.cmp(first_b).then_with(|| a.cmp(b))
    });

    let mut set = SchemaSet::new();
    for table_name in table_order {
        let indices = &by_table[&table_name];
        let mut table = TableSchema::new(table_name.clone());

        for &idx in indices {
            {
                let mut builder = SchemaBuilder::new(&mut table);
                fragments[idx].build(&mut builder);
            }
            table.source_files.push(fragments[idx].identifier().to_string());
        }

        // Apply deferred alterations in source order, after every build().
        let alterations = std::mem::take(&mut table.alterations);
        for alt in &alterations {
            let field = table.field_mut(&alt.name).ok_or_else(|| Error::Schema {
                table: table.table_name.clone(),
                field: alt.name.clone(),
                message: "alterField references an unknown field".to_string(),
            })?;
            field.apply_alteration(alt);
        }

        validate_table(&table)?;
        set.insert(table_name, table);
    }

    Ok(set)
}

fn validate_table(table: &TableSchema) -> Result<()> {
    let err = |field: &str, message: &str| -> Error {
        Error::Schema {
            table: table.table_name.clone(),
            field: field.to_string(),
            message: message.to_string(),
        }
    };

    // At most one primary key.
    let pk_count = table.fields.iter().filter(|f| f.primary_key).count();
    if pk_count > 1 {
        return Err(err("<table>", "more than one field marked primary_key"));
    }

    // Unique field names.
    let mut seen = std::collections::HashSet::new();
    for field in &table.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(err(&field.name, "duplicate field name"));
        }
    }

    for field in &table.fields {
        // primary_key ⇒ not_null ∧ unique
        if field.primary_key && !(field.not_null && field.unique) {
            return Err(err(&field.name, "primary_key requires not_null and unique"));
        }
        // create_input = excluded ⇒ default_value present ∨ nullable
        if field.create_input == super::model::CreateInput::Excluded
            && field.default_value.is_none()
            && field.not_null
        {
            return Err(err(
                &field.name,
                "create_input=excluded requires a default_value or a nullable field",
            ));
        }
    }

    // Index columns must reference existing fields.
    for index in &table.indexes {
        if index.columns.is_empty() {
            return Err(err(&index.name, "index has no columns"));
        }
        for col in &index.columns {
            if table.field(col).is_none() {
                return Err(err(
                    &index.name,
                    &format!("index references unknown column '{col}'"),
                ));
            }
        }
    }

    // Relationship invariants.
    for rel in &table.relationships {
        let field = table.field(&rel.column).ok_or_else(|| {
            err(
                &rel.name,
                &format!("relationship references unknown column '{}'", rel.column),
            )
        })?;

        if rel.kind == super::model::RelationshipKind::OneToOne && !field.unique {
            return Err(err(
                &rel.name,
                "one_to_one relationship requires its local column to be unique",
            ));
        }

        if rel.on_delete == super::model::RefAction::SetNull && field.not_null {
            return Err(err(
                &rel.name,
                "on_delete=set_null requires the local column to be nullable",
            ));
        }
    }

    Ok(())
}
