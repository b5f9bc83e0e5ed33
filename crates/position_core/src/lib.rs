//! Storage core for tracking the position history of named items.
//!
//! One [`Repository`] contract, two interchangeable backends (SQLite and a
//! human-editable file tree), plus migration, backup and sync replay that
//! work over any backend.

pub mod config;
pub mod db;
pub mod filestore;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{default_config_path, Backend, ConfigError, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::coords::{coords_equal, ValidationError, COORD_EPSILON};
pub use model::item::{Item, ItemId};
pub use model::position::{sort_timeline, Position, PositionId};
pub use repo::file_repo::FileRepository;
pub use repo::sqlite_repo::SqliteRepository;
pub use repo::{RepoError, RepoErrorKind, RepoResult, Repository};
pub use service::backup::{export_backup, import_backup, BackupError};
pub use service::migration::{is_dir_non_empty, migrate_data, MigrateError, MigrateSummary};
pub use service::position_service::PositionService;
pub use sync::apply::{apply_remote_change, RemoteChange};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
