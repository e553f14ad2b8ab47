use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{classify, StoreError};
use super::query_gen;
use super::schema_gen::generate_statements;
use crate::model::{bind_all, Entity, SqlValue};
use crate::schema::{RelationKind, Relationship, Schema, TableSchema};

/// A SQLite database laid out by a [`Schema`]
pub struct Store {
    conn: Connection,
    schema: Arc<Schema>,
}

impl Store {
    pub fn open(db_path: &Path, schema: Arc<Schema>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "opened database");
        Self::with_connection(conn, schema)
    }

    /// Create a fresh database file with every table. An existing file is
    /// only replaced when `overwrite` is set.
    pub fn create(db_path: &Path, schema: Arc<Schema>, overwrite: bool) -> Result<Self, StoreError> {
        if db_path.exists() {
            if !overwrite {
                return Err(StoreError::AlreadyExists(db_path.to_path_buf()));
            }
            std::fs::remove_file(db_path)?;
            info!(path = %db_path.display(), "removed existing database");
        }

        let mut store = Self::open(db_path, schema)?;
        store.create_tables()?;
        Ok(store)
    }

    pub fn open_in_memory(schema: Arc<Schema>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, schema)
    }

    fn with_connection(conn: Connection, schema: Arc<Schema>) -> Result<Self, StoreError> {
        // SQLite leaves foreign keys off unless asked, per connection
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create every table and index, parents first
    pub fn create_tables(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for sql in generate_statements(self.schema.tables()) {
            debug!(%sql, "executing");
            tx.execute(&sql, [])?;
        }
        tx.commit()?;
        info!(tables = self.schema.tables().len(), "created schema");
        Ok(())
    }

    /// Insert a typed row and return its primary key, including a key the
    /// engine generated.
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<Vec<SqlValue>, StoreError> {
        self.insert_row(E::table().name, &entity.values())
    }

    /// Insert raw column values into `table` and return the row's primary key
    pub fn insert_row(
        &self,
        table: &str,
        values: &[(&str, SqlValue)],
    ) -> Result<Vec<SqlValue>, StoreError> {
        let schema = self.table(table)?;
        for (column, _) in values {
            if schema.column(column).is_none() {
                return Err(StoreError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }

        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        let sql = query_gen::insert(schema, &columns);

        let result = (|| {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            bind_all(&mut stmt, &params)?;
            stmt.raw_execute()
        })();

        match result {
            Ok(_) => Ok(self.inserted_key(schema, values)),
            Err(e) => Err(self.reject(table, e)),
        }
    }

    /// Fetch one row by primary key
    pub fn get<E: Entity>(&self, key: &[SqlValue]) -> Result<Option<E>, StoreError> {
        let table = E::table();
        check_key(table, key)?;
        let mut rows = self.query::<E>(&query_gen::select_by_key(table), key)?;
        Ok(rows.pop())
    }

    /// Every row of `E`'s table, in key order
    pub fn all<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.query(&query_gen::select_all(E::table()), &[])
    }

    /// Delete one row. Rows owned by it are deleted first; the engine applies
    /// cascading foreign keys and rejects the delete if restricted rows still
    /// reference it. Returns the number of rows removed by this call, not
    /// counting engine cascades.
    pub fn delete(&mut self, table: &str, key: &[SqlValue]) -> Result<usize, StoreError> {
        let source = self.table(table)?;
        check_key(source, key)?;

        let schema = Arc::clone(&self.schema);
        let tx = self.conn.transaction()?;
        let removed = delete_with_children(&tx, &schema, source, key)
            .and_then(|removed| tx.commit().map(|_| removed));

        removed.map_err(|e| self.reject(table, e))
    }

    /// Rows reachable from one row of `table` through `relationship`
    pub fn related<E: Entity>(
        &self,
        table: &str,
        key: &[SqlValue],
        relationship: &str,
    ) -> Result<Vec<E>, StoreError> {
        let (source, rel, target) = self.traversal(table, relationship)?;
        if E::table().name != target.name {
            return Err(StoreError::TypeMismatch {
                relationship: format!("{}.{}", table, relationship),
                expected: target.name,
                found: E::table().name,
            });
        }
        check_key(source, key)?;

        let sql = query_gen::select_related(&self.schema, source, rel, target);
        self.query(&sql, key)
    }

    /// Add `target_key` to a writable many-to-many collection
    pub fn attach(
        &self,
        table: &str,
        key: &[SqlValue],
        relationship: &str,
        target_key: &[SqlValue],
    ) -> Result<(), StoreError> {
        let (source, rel, target) = self.traversal(table, relationship)?;
        let (junction, local_column, remote_column) = self.writable_link(source, rel)?;
        check_key(source, key)?;
        check_key(target, target_key)?;

        let sql = query_gen::insert_link(
            &self.schema,
            source,
            target,
            junction,
            local_column,
            remote_column,
        );
        let params: Vec<SqlValue> = key.iter().chain(target_key).cloned().collect();

        let inserted = (|| {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            bind_all(&mut stmt, &params)?;
            stmt.raw_execute()
        })()
        .map_err(|e| self.reject(junction, e))?;

        // The INSERT ... SELECT finds nothing when either row is missing
        if inserted == 0 {
            return Err(StoreError::ReferentialViolation {
                table: junction.to_string(),
            });
        }
        Ok(())
    }

    /// Remove `target_key` from a collection. Owned children are deleted;
    /// junction links are removed. Returns the number of rows deleted.
    pub fn detach(
        &mut self,
        table: &str,
        key: &[SqlValue],
        relationship: &str,
        target_key: &[SqlValue],
    ) -> Result<usize, StoreError> {
        let (source, rel, target) = self.traversal(table, relationship)?;
        check_key(source, key)?;
        check_key(target, target_key)?;

        if rel.is_owning() {
            let members = self.child_keys(source, rel, target, key)?;
            if !members.iter().any(|k| k.as_slice() == target_key) {
                return Ok(0);
            }
            return self.delete(target.name, target_key);
        }

        let (junction, local_column, remote_column) = self.writable_link(source, rel)?;
        let sql = query_gen::delete_link(
            &self.schema,
            source,
            target,
            junction,
            local_column,
            remote_column,
        );
        let params: Vec<SqlValue> = key.iter().chain(target_key).cloned().collect();

        (|| {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            bind_all(&mut stmt, &params)?;
            stmt.raw_execute()
        })()
        .map_err(|e| self.reject(junction, e))
    }

    /// Key columns as written; a key left to the engine is the new rowid
    fn inserted_key(&self, table: &TableSchema, values: &[(&str, SqlValue)]) -> Vec<SqlValue> {
        table
            .primary_key
            .iter()
            .map(|key| {
                values
                    .iter()
                    .find(|(column, value)| column == key && *value != SqlValue::Null)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_else(|| SqlValue::Integer(self.conn.last_insert_rowid()))
            })
            .collect()
    }

    fn table(&self, name: &str) -> Result<&'static TableSchema, StoreError> {
        self.schema
            .table(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    fn traversal(
        &self,
        table: &str,
        relationship: &str,
    ) -> Result<(&'static TableSchema, &'static Relationship, &'static TableSchema), StoreError> {
        let source = self.table(table)?;
        let rel = source
            .relationship(relationship)
            .ok_or_else(|| StoreError::UnknownRelationship {
                table: table.to_string(),
                relationship: relationship.to_string(),
            })?;
        let target = self.table(rel.target)?;
        Ok((source, rel, target))
    }

    /// Junction details for a relationship that accepts writes
    fn writable_link(
        &self,
        source: &TableSchema,
        rel: &Relationship,
    ) -> Result<(&'static str, &'static str, &'static str), StoreError> {
        if rel.view_only {
            warn!(table = source.name, relationship = rel.name, "write through read-only view");
            return Err(StoreError::ViewOnly {
                table: source.name.to_string(),
                relationship: rel.name.to_string(),
            });
        }
        match rel.kind {
            RelationKind::Through {
                junction,
                local_column,
                remote_column,
            } => Ok((junction, local_column, remote_column)),
            _ => Err(StoreError::NotWritable {
                table: source.name.to_string(),
                relationship: rel.name.to_string(),
            }),
        }
    }

    fn child_keys(
        &self,
        source: &TableSchema,
        rel: &Relationship,
        target: &TableSchema,
        key: &[SqlValue],
    ) -> Result<Vec<Vec<SqlValue>>, StoreError> {
        select_keys(&self.conn, &self.schema, source, rel, target, key).map_err(StoreError::from)
    }

    fn query<E: Entity>(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<E>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        bind_all(&mut stmt, params)?;

        let mut rows = stmt.raw_query();
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(E::from_row(row)?);
        }
        Ok(result)
    }

    fn reject(&self, table: &str, err: rusqlite::Error) -> StoreError {
        let err = classify(&self.schema, table, err);
        if err.is_integrity_violation() {
            warn!(table, error = %err, "write rejected");
        }
        err
    }
}

fn check_key(table: &TableSchema, key: &[SqlValue]) -> Result<(), StoreError> {
    if key.len() != table.primary_key.len() {
        return Err(StoreError::KeyArity {
            table: table.name.to_string(),
            expected: table.primary_key.len(),
            got: key.len(),
        });
    }
    Ok(())
}

fn select_keys(
    conn: &Connection,
    schema: &Schema,
    source: &TableSchema,
    rel: &Relationship,
    target: &TableSchema,
    key: &[SqlValue],
) -> rusqlite::Result<Vec<Vec<SqlValue>>> {
    let sql = query_gen::select_keys_related(schema, source, rel, target);
    let mut stmt = conn.prepare_cached(&sql)?;
    bind_all(&mut stmt, key)?;

    let width = target.primary_key.len();
    let mut rows = stmt.raw_query();
    let mut keys = Vec::new();
    while let Some(row) = rows.next()? {
        let mut child = Vec::with_capacity(width);
        for idx in 0..width {
            child.push(SqlValue::from(row.get::<_, Value>(idx)?));
        }
        keys.push(child);
    }
    Ok(keys)
}

/// Orphan removal: delete every row owned by `table[key]`, depth first,
/// then the row itself
fn delete_with_children(
    conn: &Connection,
    schema: &Schema,
    table: &TableSchema,
    key: &[SqlValue],
) -> rusqlite::Result<usize> {
    let mut removed = 0;

    for rel in schema.children_of(table.name) {
        let Some(target) = schema.table(rel.target) else {
            continue;
        };
        for child in select_keys(conn, schema, table, rel, target, key)? {
            removed += delete_with_children(conn, schema, target, &child)?;
        }
    }

    let mut stmt = conn.prepare_cached(&query_gen::delete_by_key(table))?;
    bind_all(&mut stmt, key)?;
    let deleted = stmt.raw_execute()?;
    debug!(table = table.name, deleted, owned = removed, "deleted row");

    Ok(removed + deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ban, Co, GameMode, Map, Match, Player, User};
    use chrono::{TimeZone, Utc};

    fn seeded_store() -> Store {
        let schema = Arc::new(Schema::standard().unwrap());
        let mut store = Store::open_in_memory(schema).unwrap();
        store.create_tables().unwrap();

        store
            .insert(&User {
                id: Some(1),
                name: Some("hachi".into()),
                elo: Some(1200),
            })
            .unwrap();
        store.insert(&Co { id: Some(1), name: "Andy".into() }).unwrap();
        store.insert(&Co { id: Some(2), name: "Sturm".into() }).unwrap();
        store.insert(&Map { id: Some(1), name: "Spann Island".into() }).unwrap();
        store
            .insert(&Match {
                id: Some(1),
                fow: false,
                mode: GameMode::Versus,
                winner_id: 1,
                ended: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                map_id: 1,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("league.sqlite");
        let schema = Arc::new(Schema::standard().unwrap());

        Store::create(&path, Arc::clone(&schema), false).unwrap();
        let err = Store::create(&path, Arc::clone(&schema), false).err().unwrap();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let store = Store::create(&path, schema, true).unwrap();
        assert!(store.all::<User>().unwrap().is_empty());
    }

    #[test]
    fn test_generated_key_is_returned() {
        let store = seeded_store();
        let key = store.insert(&Co { id: None, name: "Kanbei".into() }).unwrap();
        assert_eq!(key, vec![SqlValue::Integer(3)]);
        let co: Co = store.get(&key).unwrap().unwrap();
        assert_eq!(co.name, "Kanbei");
    }

    #[test]
    fn test_composite_key_is_returned() {
        let store = seeded_store();
        let key = store
            .insert(&Player {
                id: 3,
                match_id: 1,
                user_id: 1,
                co_id: 2,
                resulting_elo: 1190,
            })
            .unwrap();
        assert_eq!(key, vec![SqlValue::Integer(3), SqlValue::Integer(1)]);

        let player: Player = store.get(&key).unwrap().unwrap();
        assert_eq!(player.co_id, 2);

        let key = store.insert(&Ban { match_id: 1, co_id: 2 }).unwrap();
        assert_eq!(key, vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let store = seeded_store();
        let err = store
            .insert_row("cos", &[("colour", SqlValue::from("red"))])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn test_missing_required_column() {
        let store = seeded_store();
        let err = store.insert_row("maps", &[]).unwrap_err();
        assert!(matches!(err, StoreError::NullViolation { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_key_arity_checked() {
        let store = seeded_store();
        let err = store.get::<Player>(&[SqlValue::from(0i64)]).unwrap_err();
        assert!(matches!(err, StoreError::KeyArity { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_attach_and_detach_ban() {
        let mut store = seeded_store();
        let one = [SqlValue::from(1i64)];
        let two = [SqlValue::from(2i64)];

        store.attach("matches", &one, "bans", &two).unwrap();
        assert_eq!(store.all::<Ban>().unwrap(), vec![Ban { match_id: 1, co_id: 2 }]);

        let banned: Vec<Match> = store.related("cos", &two, "banned_at").unwrap();
        assert_eq!(banned.len(), 1);

        assert_eq!(store.detach("matches", &one, "bans", &two).unwrap(), 1);
        assert!(store.all::<Ban>().unwrap().is_empty());
    }

    #[test]
    fn test_attach_missing_row() {
        let store = seeded_store();
        let err = store
            .attach("matches", &[SqlValue::from(1i64)], "bans", &[SqlValue::from(99i64)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ReferentialViolation { .. }));
    }

    #[test]
    fn test_view_only_rejects_writes() {
        let store = seeded_store();
        let err = store
            .attach("users", &[SqlValue::from(1i64)], "picks", &[SqlValue::from(1i64)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ViewOnly { .. }));
    }

    #[test]
    fn test_back_reference_not_writable() {
        let store = seeded_store();
        let err = store
            .attach("maps", &[SqlValue::from(1i64)], "matches", &[SqlValue::from(1i64)])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotWritable { .. }));
    }

    #[test]
    fn test_detach_owned_child_deletes_it() {
        let mut store = seeded_store();
        store
            .insert(&Player {
                id: 0,
                match_id: 1,
                user_id: 1,
                co_id: 1,
                resulting_elo: 1210,
            })
            .unwrap();

        let seat = [SqlValue::from(0i64), SqlValue::from(1i64)];
        let removed = store
            .detach("matches", &[SqlValue::from(1i64)], "players", &seat)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get::<Player>(&seat).unwrap().is_none());
        assert!(store.get::<Match>(&[SqlValue::from(1i64)]).unwrap().is_some());
    }

    #[test]
    fn test_related_type_mismatch() {
        let store = seeded_store();
        let err = store
            .related::<User>("maps", &[SqlValue::from(1i64)], "matches")
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { expected: "matches", .. }));
    }
}
