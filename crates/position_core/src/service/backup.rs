//! YAML backup export and restore.
//!
//! # Invariants
//! - Restore never deduplicates: positions go through `create_position_direct`.
//! - Restore replays positions oldest-first so every backend rebuilds the
//!   same timeline.

use crate::model::item::Item;
use crate::model::position::{timeline_order, Position, PositionId};
use crate::repo::{RepoError, Repository};
use crate::service::migration::MigrateSummary;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Backup format version written and accepted by this crate.
pub const BACKUP_VERSION: &str = "1.0";

/// Tool marker identifying backups produced by this crate.
pub const BACKUP_TOOL: &str = "position";

/// On-disk backup document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub tool: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

#[derive(Debug)]
pub enum BackupError {
    /// Backup document cannot be serialized or parsed.
    Yaml(serde_yaml::Error),
    UnsupportedVersion(String),
    WrongTool(String),
    /// Reading the source repository failed.
    Read(RepoError),
    CreateItem {
        name: String,
        source: RepoError,
    },
    CreatePosition {
        position_id: PositionId,
        source: RepoError,
    },
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml(err) => write!(f, "invalid backup document: {err}"),
            Self::UnsupportedVersion(found) => write!(
                f,
                "unsupported backup version `{found}` (expected {BACKUP_VERSION})"
            ),
            Self::WrongTool(found) => {
                write!(f, "backup was written by `{found}`, expected {BACKUP_TOOL}")
            }
            Self::Read(err) => write!(f, "failed to read repository: {err}"),
            Self::CreateItem { name, source } => {
                write!(f, "failed to restore item `{name}`: {source}")
            }
            Self::CreatePosition {
                position_id,
                source,
            } => write!(f, "failed to restore position {position_id}: {source}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Yaml(err) => Some(err),
            Self::Read(err) => Some(err),
            Self::CreateItem { source, .. } | Self::CreatePosition { source, .. } => Some(source),
            Self::UnsupportedVersion(_) | Self::WrongTool(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for BackupError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

/// Serializes every item and position of `repo` into a backup document.
pub fn export_backup<R>(repo: &R) -> Result<String, BackupError>
where
    R: Repository + ?Sized,
{
    let backup = Backup {
        version: BACKUP_VERSION.to_string(),
        exported_at: Utc::now(),
        tool: BACKUP_TOOL.to_string(),
        items: repo.list_items().map_err(BackupError::Read)?,
        positions: repo.get_all_positions().map_err(BackupError::Read)?,
    };
    Ok(serde_yaml::to_string(&backup)?)
}

/// Restores a backup document into `repo`.
///
/// Items are created first; an item whose name already exists aborts the
/// restore with `CreateItem`. Nothing already written is rolled back.
pub fn import_backup<R>(repo: &R, yaml: &str) -> Result<MigrateSummary, BackupError>
where
    R: Repository + ?Sized,
{
    let mut backup: Backup = serde_yaml::from_str(yaml)?;
    if backup.version != BACKUP_VERSION {
        return Err(BackupError::UnsupportedVersion(backup.version));
    }
    if backup.tool != BACKUP_TOOL {
        return Err(BackupError::WrongTool(backup.tool));
    }

    info!(
        "event=backup_import module=service.backup status=start items={} positions={}",
        backup.items.len(),
        backup.positions.len()
    );
    let result = restore(repo, &mut backup);
    match &result {
        Ok(_) => info!("event=backup_import module=service.backup status=ok"),
        Err(_) => error!("event=backup_import module=service.backup status=error"),
    }
    result
}

fn restore<R>(repo: &R, backup: &mut Backup) -> Result<MigrateSummary, BackupError>
where
    R: Repository + ?Sized,
{
    for item in &backup.items {
        repo.create_item(item)
            .map_err(|source| BackupError::CreateItem {
                name: item.name.clone(),
                source,
            })?;
    }

    backup.positions.sort_by(|a, b| timeline_order(b, a));
    for pos in &backup.positions {
        repo.create_position_direct(pos)
            .map_err(|source| BackupError::CreatePosition {
                position_id: pos.id,
                source,
            })?;
    }

    Ok(MigrateSummary {
        items: backup.items.len(),
        positions: backup.positions.len(),
    })
}
