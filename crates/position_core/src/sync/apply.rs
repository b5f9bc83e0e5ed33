//! Replays changes received from a remote peer into local storage.
//!
//! # Invariants
//! - Upserts are keyed by id and never deduplicated.
//! - Deletes are tolerant: a missing record is not an error.
//! - A position change names its item; the item is created on first
//!   reference.

use crate::model::item::{Item, ItemId};
use crate::model::position::{Position, PositionId};
use crate::repo::{RepoResult, Repository};
use log::{error, info};

/// One remote change to apply locally.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    UpsertItem(Item),
    DeleteItem(ItemId),
    /// The position's `item_id` is ignored; `item_name` decides ownership.
    UpsertPosition {
        item_name: String,
        position: Position,
    },
    DeletePosition(PositionId),
}

impl RemoteChange {
    fn kind(&self) -> &'static str {
        match self {
            Self::UpsertItem(_) => "upsert_item",
            Self::DeleteItem(_) => "delete_item",
            Self::UpsertPosition { .. } => "upsert_position",
            Self::DeletePosition(_) => "delete_position",
        }
    }
}

/// Applies `change` to `repo`.
pub fn apply_remote_change<R>(repo: &R, change: &RemoteChange) -> RepoResult<()>
where
    R: Repository + ?Sized,
{
    let result = match change {
        RemoteChange::UpsertItem(item) => repo.upsert_item(item),
        RemoteChange::DeleteItem(id) => repo.delete_item(*id),
        RemoteChange::UpsertPosition {
            item_name,
            position,
        } => upsert_position_for(repo, item_name, position),
        RemoteChange::DeletePosition(id) => repo.delete_position(*id),
    };

    match &result {
        Ok(()) => info!(
            "event=remote_apply module=sync status=ok change={}",
            change.kind()
        ),
        Err(err) => error!(
            "event=remote_apply module=sync status=error change={} kind={:?}",
            change.kind(),
            err.kind()
        ),
    }
    result
}

fn upsert_position_for<R>(repo: &R, item_name: &str, position: &Position) -> RepoResult<()>
where
    R: Repository + ?Sized,
{
    let item = match repo.get_item_by_name(item_name) {
        Ok(item) => item,
        Err(err) if err.is_not_found() => {
            let item = Item::new(item_name);
            repo.create_item(&item)?;
            item
        }
        Err(err) => return Err(err),
    };

    let owned = Position {
        item_id: item.id,
        ..position.clone()
    };
    repo.upsert_position(&owned)
}
