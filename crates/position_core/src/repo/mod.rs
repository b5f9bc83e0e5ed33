//! Repository contract shared by every storage backend.
//!
//! # Responsibility
//! - Define the single storage surface callers depend on.
//! - Define the error taxonomy callers use to format user messages.
//!
//! # Invariants
//! - Write paths validate records before any storage mutation.
//! - `create_position` deduplicates against the item's current position;
//!   `create_position_direct` never does.
//! - Deleting a missing item or position is success, not `NotFound`.
//! - List-style reads return an empty `Vec` on zero matches.

use crate::model::coords::ValidationError;
use crate::model::item::{Item, ItemId};
use crate::model::position::{Position, PositionId};
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub mod file_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors returned by repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before touching storage.
    Validation(ValidationError),
    /// No record matches the requested id or name.
    NotFound(String),
    /// Item name (or id) is already taken.
    AlreadyExists(String),
    /// The file-tree index cannot be parsed.
    CorruptState { path: PathBuf, message: String },
    /// A persisted row cannot be converted into a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Database was written by a newer schema than this build knows.
    SchemaTooNew {
        db_version: u32,
        latest_supported: u32,
    },
    Sqlite(rusqlite::Error),
    Io {
        context: String,
        source: std::io::Error,
    },
    /// Advisory lock not acquired within the bounded wait.
    LockTimeout { path: PathBuf, waited: Duration },
    /// Handle used after `close`.
    Closed,
}

/// Coarse error categories for caller-facing formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    NotFound,
    AlreadyExists,
    Validation,
    CorruptState,
    Resource,
}

impl RepoError {
    /// Maps the error to its caller-facing category.
    pub fn kind(&self) -> RepoErrorKind {
        match self {
            Self::Validation(_) => RepoErrorKind::Validation,
            Self::NotFound(_) => RepoErrorKind::NotFound,
            Self::AlreadyExists(_) => RepoErrorKind::AlreadyExists,
            Self::CorruptState { .. }
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::SchemaTooNew { .. } => RepoErrorKind::CorruptState,
            Self::Sqlite(_) | Self::Io { .. } | Self::LockTimeout { .. } | Self::Closed => {
                RepoErrorKind::Resource
            }
        }
    }

    /// Shorthand for `kind() == RepoErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == RepoErrorKind::NotFound
    }

    pub(crate) fn item_not_found(id: ItemId) -> Self {
        Self::NotFound(format!("item {id}"))
    }

    pub(crate) fn item_name_not_found(name: &str) -> Self {
        Self::NotFound(format!("item named `{name}`"))
    }

    pub(crate) fn position_not_found(id: PositionId) -> Self {
        Self::NotFound(format!("position {id}"))
    }

    pub(crate) fn no_current_position(item_id: ItemId) -> Self {
        Self::NotFound(format!("current position for item {item_id}"))
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::AlreadyExists(what) => write!(f, "already exists: {what}"),
            Self::CorruptState { path, message } => write!(
                f,
                "storage index `{}` is corrupt: {message}",
                path.display()
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::SchemaTooNew {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::LockTimeout { path, waited } => write!(
                f,
                "timed out after {}ms waiting for lock `{}`",
                waited.as_millis(),
                path.display()
            ),
            Self::Closed => write!(f, "repository is closed"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Storage contract for items and their position history.
///
/// Backends are chosen once at construction time; callers only ever see
/// this trait (usually as `Box<dyn Repository>`).
pub trait Repository {
    /// Persists a new item. Fails with `AlreadyExists` on a taken name.
    fn create_item(&self, item: &Item) -> RepoResult<()>;
    /// Looks up an item by id, or `NotFound`.
    fn get_item_by_id(&self, id: ItemId) -> RepoResult<Item>;
    /// Looks up an item by exact name, or `NotFound`.
    fn get_item_by_name(&self, name: &str) -> RepoResult<Item>;
    /// Returns all items sorted by name ascending.
    fn list_items(&self) -> RepoResult<Vec<Item>>;
    /// Removes an item and all of its positions. Missing ids are a no-op.
    fn delete_item(&self, id: ItemId) -> RepoResult<()>;

    /// Deduplicating write: a position at the same location as the item's
    /// current position is silently dropped.
    fn create_position(&self, pos: &Position) -> RepoResult<()>;

    /// Writes a position without the dedup check (migration, import, sync).
    ///
    /// Backends that cannot bypass dedup inherit this fallback, which may
    /// drop coordinate-repeating history.
    fn create_position_direct(&self, pos: &Position) -> RepoResult<()> {
        self.create_position(pos)
    }

    /// Looks up one position by id, or `NotFound`.
    fn get_position(&self, id: PositionId) -> RepoResult<Position>;
    /// Returns the newest position of an item, or `NotFound`.
    fn get_current_position(&self, item_id: ItemId) -> RepoResult<Position>;
    /// Returns every position of an item, newest first.
    fn get_timeline(&self, item_id: ItemId) -> RepoResult<Vec<Position>>;
    /// Positions recorded strictly after `since`, newest first.
    fn get_positions_since(
        &self,
        item_id: ItemId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>>;
    /// Positions recorded within `[from, to]`, newest first.
    fn get_positions_in_range(
        &self,
        item_id: ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>>;
    /// Returns positions of every item, newest first.
    fn get_all_positions(&self) -> RepoResult<Vec<Position>>;
    /// Positions of every item recorded strictly after `since`.
    fn get_all_positions_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Position>>;
    /// Positions of every item recorded within `[from, to]`.
    fn get_all_positions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>>;
    /// Removes one position. Missing ids are a no-op.
    fn delete_position(&self, id: PositionId) -> RepoResult<()>;

    /// Insert-or-update by id, used by remote change replay.
    fn upsert_item(&self, item: &Item) -> RepoResult<()>;
    /// Insert-or-update by id without dedup, used by remote change replay.
    fn upsert_position(&self, pos: &Position) -> RepoResult<()>;

    /// Reserved for remote sync; local backends do nothing.
    fn sync(&self) -> RepoResult<()>;
    /// Destroys all data, leaving freshly initialized storage.
    fn reset(&self) -> RepoResult<()>;
    /// Releases backend resources. Calling it twice is fine.
    fn close(&mut self) -> RepoResult<()>;
}

/// Lets configuration-built `Box<dyn Repository>` handles feed generic services.
impl<R: Repository + ?Sized> Repository for Box<R> {
    fn create_item(&self, item: &Item) -> RepoResult<()> {
        (**self).create_item(item)
    }

    fn get_item_by_id(&self, id: ItemId) -> RepoResult<Item> {
        (**self).get_item_by_id(id)
    }

    fn get_item_by_name(&self, name: &str) -> RepoResult<Item> {
        (**self).get_item_by_name(name)
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        (**self).list_items()
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        (**self).delete_item(id)
    }

    fn create_position(&self, pos: &Position) -> RepoResult<()> {
        (**self).create_position(pos)
    }

    fn create_position_direct(&self, pos: &Position) -> RepoResult<()> {
        (**self).create_position_direct(pos)
    }

    fn get_position(&self, id: PositionId) -> RepoResult<Position> {
        (**self).get_position(id)
    }

    fn get_current_position(&self, item_id: ItemId) -> RepoResult<Position> {
        (**self).get_current_position(item_id)
    }

    fn get_timeline(&self, item_id: ItemId) -> RepoResult<Vec<Position>> {
        (**self).get_timeline(item_id)
    }

    fn get_positions_since(
        &self,
        item_id: ItemId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        (**self).get_positions_since(item_id, since)
    }

    fn get_positions_in_range(
        &self,
        item_id: ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        (**self).get_positions_in_range(item_id, from, to)
    }

    fn get_all_positions(&self) -> RepoResult<Vec<Position>> {
        (**self).get_all_positions()
    }

    fn get_all_positions_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Position>> {
        (**self).get_all_positions_since(since)
    }

    fn get_all_positions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        (**self).get_all_positions_in_range(from, to)
    }

    fn delete_position(&self, id: PositionId) -> RepoResult<()> {
        (**self).delete_position(id)
    }

    fn upsert_item(&self, item: &Item) -> RepoResult<()> {
        (**self).upsert_item(item)
    }

    fn upsert_position(&self, pos: &Position) -> RepoResult<()> {
        (**self).upsert_position(pos)
    }

    fn sync(&self) -> RepoResult<()> {
        (**self).sync()
    }

    fn reset(&self) -> RepoResult<()> {
        (**self).reset()
    }

    fn close(&mut self) -> RepoResult<()> {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::{RepoError, RepoErrorKind};
    use crate::model::coords::ValidationError;
    use std::error::Error;
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn kinds_separate_user_errors_from_storage_errors() {
        assert_eq!(
            RepoError::item_not_found(Uuid::new_v4()).kind(),
            RepoErrorKind::NotFound
        );
        assert_eq!(
            RepoError::AlreadyExists("harper".to_string()).kind(),
            RepoErrorKind::AlreadyExists
        );
        assert_eq!(
            RepoError::from(ValidationError::EmptyName).kind(),
            RepoErrorKind::Validation
        );
        assert_eq!(
            RepoError::CorruptState {
                path: PathBuf::from("_items.yaml"),
                message: "bad".to_string(),
            }
            .kind(),
            RepoErrorKind::CorruptState
        );
        assert_eq!(
            RepoError::LockTimeout {
                path: PathBuf::from(".lock"),
                waited: Duration::from_millis(5),
            }
            .kind(),
            RepoErrorKind::Resource
        );
    }

    #[test]
    fn io_errors_keep_their_cause() {
        let err = RepoError::io(
            "write index",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("write index: "));
        assert!(err.source().is_some());
    }
}
