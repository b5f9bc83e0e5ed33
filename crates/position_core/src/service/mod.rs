//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Stay storage-agnostic: every service works on any `Repository`.

pub mod backup;
pub mod migration;
pub mod position_service;
