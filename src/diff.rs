// src/diff.rs

//! Diff engine (C5): compares a prior snapshot to the current `SchemaSet`
//! and produces a deterministic, ordered `ChangeSet`.

use crate::error::Result;
use crate::schema::{Field, Index, Relationship, SchemaSet, TableSchema};
use std::collections::{HashMap, HashSet};

/// One atomic schema change. Each variant maps to exactly one up/down
/// migration file pair in the emitter (C6).
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// New table, as it exists in `current`. Its own indexes/relationships
    /// are emitted as separate `AddIndex`/`AddForeignKey` changes.
    CreateTable(TableSchema),
    /// Removed table, carrying its prior fields and indexes (but not
    /// relationships — those are each dropped via a preceding
    /// `DropForeignKey`) so the down migration can recreate it faithfully.
    DropTable(TableSchema),
    AddColumn(String, Field),
    /// Removed column, carrying its prior definition so the down migration
    /// can recreate it.
    DropColumn(String, Field),
    AlterColumn(String, String, Field, Field),
    AddIndex(String, Index),
    /// Removed index, carrying its prior definition for the down migration.
    DropIndex(String, Index),
    AddForeignKey(String, Relationship),
    /// Removed relationship, carrying its prior definition for the down
    /// migration.
    DropForeignKey(String, Relationship),
}

impl Change {
    /// The table this change applies to, used by the emitter for the
    /// `-- Table:` header and by the slug generator.
    pub fn table(&self) -> &str {
        match self {
            Change::CreateTable(t) => &t.table_name,
            Change::DropTable(t) => &t.table_name,
            Change::AddColumn(t, _) => t,
            Change::DropColumn(t, _) => t,
            Change::AlterColumn(t, _, _, _) => t,
            Change::AddIndex(t, _) => t,
            Change::DropIndex(t, _) => t,
            Change::AddForeignKey(t, _) => t,
            Change::DropForeignKey(t, _) => t,
        }
    }
}

pub type ChangeSet = Vec<Change>;

/// Diff `prior` against `current`, returning a deterministic `ChangeSet`.
/// `diff(S, S)` is always empty.
pub fn diff(prior: &SchemaSet, current: &SchemaSet) -> Result<ChangeSet> {
    let prior_names: HashSet<&str> = prior.keys().map(String::as_str).collect();
    let current_names: HashSet<&str> = current.keys().map(String::as_str).collect();

    let mut created: Vec<&str> = current_names.difference(&prior_names).copied().collect();
    let mut dropped: Vec<&str> = prior_names.difference(&current_names).copied().collect();
    let mut common: Vec<&str> = current_names.intersection(&prior_names).copied().collect();
    created.sort_unstable();
    dropped.sort_unstable();
    common.sort_unstable();

    created = topological_order(&created, current);
    // Dropped tables: children (tables with FKs pointing elsewhere among the
    // dropped set) before parents, mirroring create order reversed.
    dropped = topological_order(&dropped, prior).into_iter().rev().collect();

    let mut changes = ChangeSet::new();

    // Phase 1: drop foreign keys (dependents before their targets are dropped).
    for &name in &dropped {
        for rel in prior[name].foreign_keys() {
            changes.push(Change::DropForeignKey(name.to_string(), rel.clone()));
        }
    }
    for &name in &common {
        let (_, _, removed, changed) = relationship_delta(&prior[name], &current[name]);
        for rel in &removed {
            changes.push(Change::DropForeignKey(name.to_string(), (*rel).clone()));
        }
        for (prior_rel, _) in &changed {
            changes.push(Change::DropForeignKey(name.to_string(), (*prior_rel).clone()));
        }
    }

    // Phase 2: drop indexes.
    for &name in &common {
        let (_, _, removed, changed) = index_delta(&prior[name], &current[name]);
        for idx in &removed {
            changes.push(Change::DropIndex(name.to_string(), (*idx).clone()));
        }
        for (prior_idx, _) in &changed {
            changes.push(Change::DropIndex(name.to_string(), (*prior_idx).clone()));
        }
    }

    // Phase 3: drop columns.
    for &name in &common {
        let (_, removed, _) = field_delta(&prior[name], &current[name]);
        for field in &removed {
            changes.push(Change::DropColumn(name.to_string(), (*field).clone()));
        }
    }

    // Phase 4: drop tables.
    for &name in &dropped {
        changes.push(Change::DropTable(prior[name].clone()));
    }

    // Phase 5: create tables, parents before children.
    for &name in &created {
        changes.push(Change::CreateTable(current[name].clone()));
    }

    // Phase 6: add columns.
    for &name in &common {
        let (added, _, _) = field_delta(&prior[name], &current[name]);
        for field in added {
            changes.push(Change::AddColumn(name.to_string(), field.clone()));
        }
    }

    // Phase 7: alter columns.
    for &name in &common {
        let (_, _, changed) = field_delta(&prior[name], &current[name]);
        for (prior_field, next_field) in changed {
            changes.push(Change::AlterColumn(
                name.to_string(),
                next_field.name.clone(),
                prior_field.clone(),
                next_field.clone(),
            ));
        }
    }

    // Phase 8: add indexes (new tables, then altered tables).
    for &name in &created {
        for idx in &current[name].indexes {
            changes.push(Change::AddIndex(name.to_string(), idx.clone()));
        }
    }
    for &name in &common {
        let (added, _, _, changed) = index_delta(&prior[name], &current[name]);
        for idx in added {
            changes.push(Change::AddIndex(name.to_string(), idx.clone()));
        }
        for (_, next_idx) in changed {
            changes.push(Change::AddIndex(name.to_string(), next_idx.clone()));
        }
    }

    // Phase 9: add foreign keys, always after every CreateTable in this cycle.
    for &name in &created {
        for rel in current[name].foreign_keys() {
            changes.push(Change::AddForeignKey(name.to_string(), rel.clone()));
        }
    }
    for &name in &common {
        let (added, _, _, changed) = relationship_delta(&prior[name], &current[name]);
        for rel in added {
            changes.push(Change::AddForeignKey(name.to_string(), rel.clone()));
        }
        for (_, next_rel) in changed {
            changes.push(Change::AddForeignKey(name.to_string(), next_rel.clone()));
        }
    }

    Ok(changes)
}

/// Returns `(added, removed, changed)` fields by name, each list in the
/// order the owning table stores them.
fn field_delta<'a>(
    prior: &'a TableSchema,
    current: &'a TableSchema,
) -> (Vec<&'a Field>, Vec<&'a Field>, Vec<(&'a Field, &'a Field)>) {
    let prior_by_name: HashMap<&str, &Field> =
        prior.fields.iter().map(|f| (f.name.as_str(), f)).collect();
    let current_by_name: HashMap<&str, &Field> =
        current.fields.iter().map(|f| (f.name.as_str(), f)).collect();

    let added = current
        .fields
        .iter()
        .filter(|f| !prior_by_name.contains_key(f.name.as_str()))
        .collect();
    let removed = prior
        .fields
        .iter()
        .filter(|f| !current_by_name.contains_key(f.name.as_str()))
        .collect();
    let changed = current
        .fields
        .iter()
        .filter_map(|next| {
            prior_by_name
                .get(next.name.as_str())
                .filter(|prior_field| ***prior_field != *next)
                .map(|prior_field| (*prior_field, next))
        })
        .collect();

    (added, removed, changed)
}

/// Returns `(added, unchanged_names, removed, changed)` indexes by name.
fn index_delta<'a>(
    prior: &'a TableSchema,
    current: &'a TableSchema,
) -> (Vec<&'a Index>, Vec<&'a str>, Vec<&'a Index>, Vec<(&'a Index, &'a Index)>) {
    let prior_by_name: HashMap<&str, &Index> =
        prior.indexes.iter().map(|i| (i.name.as_str(), i)).collect();
    let current_by_name: HashMap<&str, &Index> =
        current.indexes.iter().map(|i| (i.name.as_str(), i)).collect();

    let added = current
        .indexes
        .iter()
        .filter(|i| !prior_by_name.contains_key(i.name.as_str()))
        .collect();
    let removed = prior
        .indexes
        .iter()
        .filter(|i| !current_by_name.contains_key(i.name.as_str()))
        .collect();
    let unchanged = current
        .indexes
        .iter()
        .filter(|next| {
            prior_by_name
                .get(next.name.as_str())
                .map(|prior_idx| *prior_idx == *next)
                .unwrap_or(false)
        })
        .map(|i| i.name.as_str())
        .collect();
    let changed = current
        .indexes
        .iter()
        .filter_map(|next| {
            prior_by_name
                .get(next.name.as_str())
                .filter(|prior_idx| ***prior_idx != *next)
                .map(|prior_idx| (*prior_idx, next))
        })
        .collect();

    (added, unchanged, removed, changed)
}

/// Returns `(added, unchanged_names, removed, changed)` relationships that
/// emit DDL (excludes `one_to_many_marker`s, which never produce changes).
fn relationship_delta<'a>(
    prior: &'a TableSchema,
    current: &'a TableSchema,
) -> (Vec<&'a Relationship>, Vec<&'a str>, Vec<&'a Relationship>, Vec<(&'a Relationship, &'a Relationship)>) {
    let prior_by_name: HashMap<&str, &Relationship> =
        prior.foreign_keys().map(|r| (r.name.as_str(), r)).collect();
    let current_by_name: HashMap<&str, &Relationship> =
        current.foreign_keys().map(|r| (r.name.as_str(), r)).collect();

    let added = current
        .foreign_keys()
        .filter(|r| !prior_by_name.contains_key(r.name.as_str()))
        .collect();
    let removed = prior
        .foreign_keys()
        .filter(|r| !current_by_name.contains_key(r.name.as_str()))
        .collect();
    let unchanged = current
        .foreign_keys()
        .filter(|next| {
            prior_by_name
                .get(next.name.as_str())
                .map(|prior_rel| *prior_rel == *next)
                .unwrap_or(false)
        })
        .map(|r| r.name.as_str())
        .collect();
    let changed = current
        .foreign_keys()
        .filter_map(|next| {
            prior_by_name
                .get(next.name.as_str())
                .filter(|prior_rel| ***prior_rel != *next)
                .map(|prior_rel| (*prior_rel, next))
        })
        .collect();

    (added, unchanged, removed, changed)
}

/// Order `names` so that a table referenced by `many_to_one`/`one_to_one`
/// appears before the table that references it. Ties (including members of
/// an unavoidable cycle) fall back to alphabetical order, which keeps the
/// result deterministic — cycles never block correctness here because
/// foreign-key constraints are always emitted as separate, later changes.
fn topological_order<'a>(names: &[&'a str], set: &SchemaSet) -> Vec<&'a str> {
    let name_set: HashSet<&str> = names.iter().copied().collect();
    let mut in_degree: HashMap<&str, usize> = names.iter().map(|&n| (n, 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = names.iter().map(|&n| (n, Vec::new())).collect();

    for &name in names {
        for rel in set[name].relationships.iter().filter(|r| {
            matches!(
                r.kind,
                crate::schema::RelationshipKind::ManyToOne | crate::schema::RelationshipKind::OneToOne
            )
        }) {
            if name_set.contains(rel.references_table.as_str()) && rel.references_table != name {
                dependents
                    .get_mut(rel.references_table.as_str())
                    .unwrap()
                    .push(name);
                *in_degree.get_mut(name).unwrap() += 1;
            }
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&n, _)| n)
        .collect();
    ready.sort_unstable();

    let mut ordered = Vec::with_capacity(names.len());
    let mut in_degree = in_degree;
    while let Some(next) = ready.pop() {
        ordered.push(next);
        let mut newly_ready = Vec::new();
        if let Some(deps) = dependents.get(next) {
            for &d in deps {
                let deg = in_degree.get_mut(d).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(d);
                }
            }
        }
        newly_ready.sort_unstable();
        ready.extend(newly_ready);
        ready.sort_unstable();
    }

    // Anything left over is part of a cycle; append it deterministically.
    if ordered.len() < names.len() {
        let mut remaining: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !ordered.contains(n))
            .collect();
        remaining.sort_unstable();
        ordered.extend(remaining);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CreateInput, FieldType, RefAction, RelationshipKind};

    fn field(name: &str, ty: FieldType, not_null: bool) -> Field {
        Field {
            name: name.to_string(),
            field_type: ty,
            primary_key: false,
            unique: false,
            not_null,
            create_input: CreateInput::Required,
            update_input: true,
            redacted: false,
            default_value: None,
            auto_generated: false,
            auto_generate_type: None,
        }
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let mut set = SchemaSet::new();
        let mut t = TableSchema::new("users");
        t.fields.push(field("id", FieldType::Uuid, true));
        set.insert("users".to_string(), t);

        let changes = diff(&set, &set).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn new_table_becomes_create_table() {
        let prior = SchemaSet::new();
        let mut current = SchemaSet::new();
        let mut t = TableSchema::new("users");
        t.fields.push(field("id", FieldType::Uuid, true));
        current.insert("users".to_string(), t);

        let changes = diff(&prior, &current).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::CreateTable(t) if t.table_name == "users"));
    }

    #[test]
    fn added_column_is_add_column_without_fk() {
        let mut prior = SchemaSet::new();
        let mut prior_table = TableSchema::new("users");
        prior_table.fields.push(field("id", FieldType::Uuid, true));
        prior.insert("users".to_string(), prior_table);

        let mut current = SchemaSet::new();
        let mut current_table = TableSchema::new("users");
        current_table.fields.push(field("id", FieldType::Uuid, true));
        current_table.fields.push(field("phone", FieldType::Text, false));
        current.insert("users".to_string(), current_table);

        let changes = diff(&prior, &current).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::AddColumn(t, f) if t == "users" && f.name == "phone"));
    }

    #[test]
    fn altered_column_reports_prior_and_next() {
        let mut prior = SchemaSet::new();
        let mut prior_table = TableSchema::new("users");
        prior_table.fields.push(field("bio", FieldType::Text, true));
        prior.insert("users".to_string(), prior_table);

        let mut current = SchemaSet::new();
        let mut current_table = TableSchema::new("users");
        let mut bio = field("bio", FieldType::Text, false);
        bio.redacted = true;
        current_table.fields.push(bio);
        current.insert("users".to_string(), current_table);

        let changes = diff(&prior, &current).unwrap();
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterColumn(table, name, prior_f, next_f) => {
                assert_eq!(table, "users");
                assert_eq!(name, "bio");
                assert!(prior_f.not_null);
                assert!(!next_f.not_null);
            }
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn foreign_keys_ordered_after_all_create_tables() {
        let prior = SchemaSet::new();
        let mut current = SchemaSet::new();

        let mut users = TableSchema::new("users");
        users.fields.push(field("id", FieldType::Uuid, true));
        current.insert("users".to_string(), users);

        let mut posts = TableSchema::new("posts");
        posts.fields.push(field("id", FieldType::Uuid, true));
        posts.fields.push(field("user_id", FieldType::Uuid, true));
        posts.relationships.push(Relationship {
            name: "user".to_string(),
            column: "user_id".to_string(),
            references_table: "users".to_string(),
            references_column: "id".to_string(),
            kind: RelationshipKind::ManyToOne,
            on_delete: RefAction::Cascade,
            on_update: RefAction::NoAction,
        });
        current.insert("posts".to_string(), posts);

        let changes = diff(&prior, &current).unwrap();
        let kinds: Vec<&str> = changes
            .iter()
            .map(|c| match c {
                Change::CreateTable(t) => if t.table_name == "users" { "create_users" } else { "create_posts" },
                Change::AddForeignKey(_, _) => "add_fk",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["create_users", "create_posts", "add_fk"]);
    }

    #[test]
    fn dropped_table_drops_its_foreign_keys_first() {
        let mut prior = SchemaSet::new();
        let mut users = TableSchema::new("users");
        users.fields.push(field("id", FieldType::Uuid, true));
        prior.insert("users".to_string(), users);

        let mut posts = TableSchema::new("posts");
        posts.fields.push(field("id", FieldType::Uuid, true));
        posts.fields.push(field("user_id", FieldType::Uuid, true));
        posts.relationships.push(Relationship {
            name: "user".to_string(),
            column: "user_id".to_string(),
            references_table: "users".to_string(),
            references_column: "id".to_string(),
            kind: RelationshipKind::ManyToOne,
            on_delete: RefAction::Cascade,
            on_update: RefAction::NoAction,
        });
        prior.insert("posts".to_string(), posts);

        let current = SchemaSet::new();

        let changes = diff(&prior, &current).unwrap();
        let fk_drop_idx = changes
            .iter()
            .position(|c| matches!(c, Change::DropForeignKey(t, _) if t == "posts"))
            .unwrap();
        let table_drop_idx = changes
            .iter()
            .position(|c| matches!(c, Change::DropTable(t) if t.table_name == "posts"))
            .unwrap();
        assert!(fk_drop_idx < table_drop_idx);
    }
}
