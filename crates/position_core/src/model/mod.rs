//! Domain model for tracked items and their positions.
//!
//! # Responsibility
//! - Define the value types every repository persists.
//! - Own validation and the coordinate equality rule.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Validation happens before a record reaches any storage backend.

pub mod coords;
pub mod item;
pub mod position;
