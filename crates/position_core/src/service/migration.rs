//! Cross-backend data migration.
//!
//! # Responsibility
//! - Copy every item and position from one repository into another.
//! - Preserve history exactly: positions are replayed through
//!   `create_position_direct`, so coordinate repeats are never dropped.
//!
//! # Invariants
//! - Positions are replayed oldest-first per item.
//! - The first failure aborts; nothing already written is rolled back.

use crate::model::item::Item;
use crate::model::position::PositionId;
use crate::repo::{RepoError, Repository};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;

/// Counts of records written to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateSummary {
    pub items: usize,
    pub positions: usize,
}

/// Migration failure, naming the stage and record that failed.
#[derive(Debug)]
pub enum MigrateError {
    ListItems(RepoError),
    CreateItem {
        name: String,
        source: RepoError,
    },
    ReadTimeline {
        name: String,
        source: RepoError,
    },
    CreatePosition {
        name: String,
        position_id: PositionId,
        source: RepoError,
    },
}

impl MigrateError {
    /// Returns the repository error that caused the abort.
    pub fn repo_error(&self) -> &RepoError {
        match self {
            Self::ListItems(source)
            | Self::CreateItem { source, .. }
            | Self::ReadTimeline { source, .. }
            | Self::CreatePosition { source, .. } => source,
        }
    }
}

impl Display for MigrateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListItems(source) => write!(f, "failed to list source items: {source}"),
            Self::CreateItem { name, source } => {
                write!(f, "failed to create item `{name}`: {source}")
            }
            Self::ReadTimeline { name, source } => {
                write!(f, "failed to read positions of item `{name}`: {source}")
            }
            Self::CreatePosition {
                name,
                position_id,
                source,
            } => write!(
                f,
                "failed to create position {position_id} of item `{name}`: {source}"
            ),
        }
    }
}

impl Error for MigrateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.repo_error())
    }
}

/// Copies all items and their full position history from `src` to `dst`.
///
/// `dst` is expected to be empty; item name collisions surface as
/// `CreateItem` errors wrapping `AlreadyExists`.
pub fn migrate_data<S, D>(src: &S, dst: &D) -> Result<MigrateSummary, MigrateError>
where
    S: Repository + ?Sized,
    D: Repository + ?Sized,
{
    info!("event=migrate module=service.migration status=start");

    let result = copy_all(src, dst);
    match &result {
        Ok(summary) => info!(
            "event=migrate module=service.migration status=ok items={} positions={}",
            summary.items, summary.positions
        ),
        Err(err) => error!(
            "event=migrate module=service.migration status=error stage={}",
            stage_name(err)
        ),
    }
    result
}

fn copy_all<S, D>(src: &S, dst: &D) -> Result<MigrateSummary, MigrateError>
where
    S: Repository + ?Sized,
    D: Repository + ?Sized,
{
    let items = src.list_items().map_err(MigrateError::ListItems)?;

    let mut summary = MigrateSummary::default();
    for item in &items {
        dst.create_item(item)
            .map_err(|source| MigrateError::CreateItem {
                name: item.name.clone(),
                source,
            })?;
        summary.items += 1;
        summary.positions += copy_timeline(src, dst, item)?;
    }
    Ok(summary)
}

fn copy_timeline<S, D>(src: &S, dst: &D, item: &Item) -> Result<usize, MigrateError>
where
    S: Repository + ?Sized,
    D: Repository + ?Sized,
{
    let timeline = src
        .get_timeline(item.id)
        .map_err(|source| MigrateError::ReadTimeline {
            name: item.name.clone(),
            source,
        })?;

    // Timeline is newest-first; replay oldest-first.
    for pos in timeline.iter().rev() {
        dst.create_position_direct(pos)
            .map_err(|source| MigrateError::CreatePosition {
                name: item.name.clone(),
                position_id: pos.id,
                source,
            })?;
    }
    Ok(timeline.len())
}

fn stage_name(err: &MigrateError) -> &'static str {
    match err {
        MigrateError::ListItems(_) => "list_items",
        MigrateError::CreateItem { .. } => "create_item",
        MigrateError::ReadTimeline { .. } => "read_timeline",
        MigrateError::CreatePosition { .. } => "create_position",
    }
}

/// Returns whether `path` is a directory holding at least one entry.
///
/// A missing path is reported as empty.
pub fn is_dir_non_empty(path: &Path) -> io::Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
