//! File-system primitives for the file-tree backend.
//!
//! # Responsibility
//! - Serialize index mutations across processes with an advisory lock.
//! - Replace files atomically so readers never observe partial writes.
//! - Render/parse markdown header blocks and item directory slugs.

pub mod atomic;
pub mod frontmatter;
pub mod lock;
pub mod slug;
