//! Sync boundary.
//!
//! Transport and conflict resolution live outside this crate; this module
//! only applies already-decided changes to a local repository.

pub mod apply;
