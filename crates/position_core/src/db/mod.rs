//! Relational storage bootstrap.
//!
//! Opens SQLite connections for [`SqliteRepository`](crate::repo::SqliteRepository)
//! and brings their schema to [`migrations::latest_version`]. Failures surface
//! as [`RepoError`](crate::repo::RepoError) so the backend has a single error type.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
