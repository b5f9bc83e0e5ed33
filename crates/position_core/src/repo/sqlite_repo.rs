//! SQLite implementation of the repository contract.
//!
//! # Responsibility
//! - Keep SQL details inside the relational backend.
//! - Delegate cascade delete to the `positions.item_id` foreign key.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Dedup check and insert run in one `IMMEDIATE` transaction.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory};
use crate::model::item::{Item, ItemId};
use crate::model::position::{Position, PositionId};
use crate::repo::{RepoError, RepoResult, Repository};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{
    ffi, params, Connection, ErrorCode, OptionalExtension, Params, Row, Transaction,
    TransactionBehavior,
};
use std::fs;
use std::path::Path;
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT id, name, created_at FROM items";

const POSITION_SELECT_SQL: &str = "SELECT
    id,
    item_id,
    latitude,
    longitude,
    label,
    recorded_at,
    created_at
FROM positions";

const TIMELINE_ORDER_SQL: &str = "ORDER BY recorded_at DESC, created_at DESC";

const INSERT_POSITION_SQL: &str = "INSERT INTO positions (
    id,
    item_id,
    latitude,
    longitude,
    label,
    recorded_at,
    created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// SQLite-backed repository owning its connection.
pub struct SqliteRepository {
    conn: Option<Connection>,
}

impl SqliteRepository {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                RepoError::io(
                    format!("create database directory `{}`", parent.display()),
                    err,
                )
            })?;
        }
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Wraps a connection that already has migrations applied.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> RepoResult<&Connection> {
        self.conn.as_ref().ok_or(RepoError::Closed)
    }

    fn query_items(&self, sql: &str, params: impl Params) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn()?.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn query_positions(&self, filter: &str, params: impl Params) -> RepoResult<Vec<Position>> {
        query_positions(self.conn()?, filter, params)
    }
}

impl Repository for SqliteRepository {
    fn create_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        self.conn()?
            .execute(
                "INSERT INTO items (id, name, created_at) VALUES (?1, ?2, ?3);",
                params![item.id.to_string(), item.name.as_str(), item.created_at],
            )
            .map_err(|err| map_item_write_error(err, &item.name))?;

        info!("event=item_create module=repo.sqlite status=ok");
        Ok(())
    }

    fn get_item_by_id(&self, id: ItemId) -> RepoResult<Item> {
        self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?
        .pop()
        .ok_or_else(|| RepoError::item_not_found(id))
    }

    fn get_item_by_name(&self, name: &str) -> RepoResult<Item> {
        self.query_items(&format!("{ITEM_SELECT_SQL} WHERE name = ?1;"), [name])?
            .pop()
            .ok_or_else(|| RepoError::item_name_not_found(name))
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        self.query_items(&format!("{ITEM_SELECT_SQL} ORDER BY name ASC;"), [])
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self
            .conn()?
            .execute("DELETE FROM items WHERE id = ?1;", [id.to_string()])?;
        info!("event=item_delete module=repo.sqlite status=ok changed={changed}");
        Ok(())
    }

    fn create_position(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;

        let tx = Transaction::new_unchecked(self.conn()?, TransactionBehavior::Immediate)?;
        if let Some(current) = current_position(&tx, pos.item_id)? {
            if current.same_location(pos) {
                debug!("event=position_dedup module=repo.sqlite status=skipped");
                return Ok(());
            }
        }
        insert_position(&tx, pos)?;
        tx.commit()?;
        Ok(())
    }

    fn create_position_direct(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;
        insert_position(self.conn()?, pos)
    }

    fn get_position(&self, id: PositionId) -> RepoResult<Position> {
        self.query_positions("WHERE id = ?1", [id.to_string()])?
            .pop()
            .ok_or_else(|| RepoError::position_not_found(id))
    }

    fn get_current_position(&self, item_id: ItemId) -> RepoResult<Position> {
        current_position(self.conn()?, item_id)?
            .ok_or_else(|| RepoError::no_current_position(item_id))
    }

    fn get_timeline(&self, item_id: ItemId) -> RepoResult<Vec<Position>> {
        self.query_positions("WHERE item_id = ?1", [item_id.to_string()])
    }

    fn get_positions_since(
        &self,
        item_id: ItemId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        self.query_positions(
            "WHERE item_id = ?1 AND recorded_at > ?2",
            params![item_id.to_string(), since],
        )
    }

    fn get_positions_in_range(
        &self,
        item_id: ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        self.query_positions(
            "WHERE item_id = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3",
            params![item_id.to_string(), from, to],
        )
    }

    fn get_all_positions(&self) -> RepoResult<Vec<Position>> {
        self.query_positions("", [])
    }

    fn get_all_positions_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Position>> {
        self.query_positions("WHERE recorded_at > ?1", params![since])
    }

    fn get_all_positions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        self.query_positions(
            "WHERE recorded_at >= ?1 AND recorded_at <= ?2",
            params![from, to],
        )
    }

    fn delete_position(&self, id: PositionId) -> RepoResult<()> {
        self.conn()?
            .execute("DELETE FROM positions WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }

    fn upsert_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        self.conn()?
            .execute(
                "INSERT INTO items (id, name, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name;",
                params![item.id.to_string(), item.name.as_str(), item.created_at],
            )
            .map_err(|err| map_item_write_error(err, &item.name))?;
        Ok(())
    }

    fn upsert_position(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;

        write_position(
            self.conn()?,
            &format!(
                "{INSERT_POSITION_SQL}
                 ON CONFLICT(id) DO UPDATE SET
                    item_id = excluded.item_id,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    label = excluded.label,
                    recorded_at = excluded.recorded_at;"
            ),
            pos,
        )
    }

    fn sync(&self) -> RepoResult<()> {
        self.conn()?;
        Ok(())
    }

    fn reset(&self) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn()?, TransactionBehavior::Immediate)?;
        tx.execute_batch("DELETE FROM positions; DELETE FROM items;")?;
        tx.commit()?;
        info!("event=storage_reset module=repo.sqlite status=ok");
        Ok(())
    }

    fn close(&mut self) -> RepoResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| RepoError::from(err))?;
        }
        Ok(())
    }
}

fn current_position(conn: &Connection, item_id: ItemId) -> RepoResult<Option<Position>> {
    let mut stmt = conn.prepare(&format!(
        "{POSITION_SELECT_SQL} WHERE item_id = ?1 {TIMELINE_ORDER_SQL} LIMIT 1;"
    ))?;
    let row = stmt
        .query_row([item_id.to_string()], |row| Ok(parse_position_row(row)))
        .optional()?;
    row.transpose()
}

fn query_positions(
    conn: &Connection,
    filter: &str,
    params: impl Params,
) -> RepoResult<Vec<Position>> {
    let mut stmt = conn.prepare(&format!(
        "{POSITION_SELECT_SQL} {filter} {TIMELINE_ORDER_SQL};"
    ))?;
    let mut rows = stmt.query(params)?;
    let mut positions = Vec::new();
    while let Some(row) = rows.next()? {
        positions.push(parse_position_row(row)?);
    }
    Ok(positions)
}

fn insert_position(conn: &Connection, pos: &Position) -> RepoResult<()> {
    write_position(conn, &format!("{INSERT_POSITION_SQL};"), pos)
}

fn write_position(conn: &Connection, sql: &str, pos: &Position) -> RepoResult<()> {
    conn.execute(
        sql,
        params![
            pos.id.to_string(),
            pos.item_id.to_string(),
            pos.latitude,
            pos.longitude,
            pos.label.as_deref(),
            pos.recorded_at,
            pos.created_at,
        ],
    )
    .map_err(|err| map_position_write_error(err, pos))?;
    Ok(())
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    Ok(Item {
        id: parse_uuid(row, "id", "items.id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_position_row(row: &Row<'_>) -> RepoResult<Position> {
    let pos = Position {
        id: parse_uuid(row, "id", "positions.id")?,
        item_id: parse_uuid(row, "item_id", "positions.item_id")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        label: row.get("label")?,
        recorded_at: row.get("recorded_at")?,
        created_at: row.get("created_at")?,
    };
    pos.validate()
        .map_err(|err| RepoError::InvalidData(format!("position {}: {err}", pos.id)))?;
    Ok(pos)
}

fn parse_uuid(row: &Row<'_>, column: &str, qualified: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {qualified}")))
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn map_item_write_error(err: rusqlite::Error, name: &str) -> RepoError {
    match constraint_code(&err) {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            RepoError::AlreadyExists(format!("item named `{name}`"))
        }
        _ => err.into(),
    }
}

fn map_position_write_error(err: rusqlite::Error, pos: &Position) -> RepoError {
    match constraint_code(&err) {
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => RepoError::item_not_found(pos.item_id),
        Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) | Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            RepoError::AlreadyExists(format!("position {}", pos.id))
        }
        _ => err.into(),
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["items", "positions"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
