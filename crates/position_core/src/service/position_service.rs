//! By-name position tracking use cases.
//!
//! # Responsibility
//! - Resolve items by name, creating them on first reference.
//! - Delegate persistence and deduplication to the repository.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or dedup.

use crate::model::item::Item;
use crate::model::position::Position;
use crate::repo::{RepoError, RepoResult, Repository};
use chrono::{DateTime, Utc};

/// Use-case service wrapper over any repository backend.
pub struct PositionService<R: Repository> {
    repo: R,
}

impl<R: Repository> PositionService<R> {
    /// Creates a service over `repo`.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the item named `name`, creating it when missing.
    pub fn ensure_item(&self, name: &str) -> RepoResult<Item> {
        match self.repo.get_item_by_name(name) {
            Ok(item) => Ok(item),
            Err(err) if err.is_not_found() => {
                let item = Item::new(name);
                self.repo.create_item(&item)?;
                Ok(item)
            }
            Err(err) => Err(err),
        }
    }

    /// Records an observation for `name`.
    ///
    /// `recorded_at = None` means "now". Returns the position as built; when
    /// it repeats the current location it is dropped by dedup and the
    /// returned id is not stored.
    pub fn record_position(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
        label: Option<String>,
        recorded_at: Option<DateTime<Utc>>,
    ) -> RepoResult<Position> {
        let item = self.ensure_item(name)?;
        let pos = match recorded_at {
            Some(at) => Position::with_recorded_at(item.id, latitude, longitude, label, at),
            None => Position::new(item.id, latitude, longitude, label),
        };
        self.repo.create_position(&pos)?;
        Ok(pos)
    }

    /// Returns the newest position of the item named `name`.
    pub fn current_position(&self, name: &str) -> RepoResult<Position> {
        let item = self.repo.get_item_by_name(name)?;
        self.repo.get_current_position(item.id)
    }

    /// Returns the full history of the item named `name`, newest first.
    pub fn timeline(&self, name: &str) -> RepoResult<Vec<Position>> {
        let item = self.repo.get_item_by_name(name)?;
        self.repo.get_timeline(item.id)
    }

    /// Removes the item named `name` with its history; unknown names are a no-op.
    pub fn remove_item(&self, name: &str) -> RepoResult<()> {
        match self.repo.get_item_by_name(name) {
            Ok(item) => self.repo.delete_item(item.id),
            Err(RepoError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PositionService;
    use crate::repo::sqlite_repo::SqliteRepository;

    fn service() -> PositionService<SqliteRepository> {
        PositionService::new(SqliteRepository::open_in_memory().unwrap())
    }

    #[test]
    fn ensure_item_is_get_or_create() {
        let service = service();
        let first = service.ensure_item("harper").unwrap();
        let second = service.ensure_item("harper").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn record_position_creates_item_on_first_reference() {
        let service = service();
        service
            .record_position("harper", 41.8781, -87.6298, Some("chicago".to_string()), None)
            .unwrap();

        let current = service.current_position("harper").unwrap();
        assert_eq!(current.label.as_deref(), Some("chicago"));
    }

    #[test]
    fn remove_item_tolerates_unknown_names() {
        let service = service();
        service.remove_item("nobody").unwrap();

        service.ensure_item("harper").unwrap();
        service.remove_item("harper").unwrap();
        assert!(service.timeline("harper").unwrap_err().is_not_found());
    }
}
