//! File-tree implementation of the repository contract.
//!
//! Layout under the storage root:
//!
//! ```text
//! _items.yaml                          item index (YAML sequence)
//! .lock                                advisory lock file
//! <slug>/<recorded_at>-<id8>.md        one file per position
//! ```
//!
//! # Invariants
//! - Index read-modify-write sequences run under [`DirLock`]; reads take no lock.
//! - Every file write goes through [`write_atomic`].
//! - A position file is only trusted when its `item_id` matches the item
//!   whose directory it was found in (two names can share one slug).

use crate::filestore::atomic::{write_atomic, TEMP_FILE_PREFIX};
use crate::filestore::frontmatter;
use crate::filestore::lock::{DirLock, LOCK_FILE_NAME};
use crate::filestore::slug::slugify;
use crate::model::item::{Item, ItemId};
use crate::model::position::{sort_timeline, Position, PositionId};
use crate::repo::{RepoError, RepoResult, Repository};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the item index at the storage root.
pub const INDEX_FILE_NAME: &str = "_items.yaml";

/// Default bounded wait for the directory lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POSITION_FILE_EXTENSION: &str = "md";
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Repository storing items in a YAML index and positions as markdown files.
#[derive(Debug)]
pub struct FileRepository {
    root: PathBuf,
    lock_timeout: Duration,
    closed: bool,
}

/// A parsed position file and where it was found.
struct StoredPosition {
    path: PathBuf,
    position: Position,
}

/// The index document, in file order.
///
/// Entries that fail to parse keep their raw value so a rewrite of the
/// index never drops hand-edited records.
#[derive(Default)]
struct Index {
    entries: Vec<IndexEntry>,
}

struct IndexEntry {
    raw: serde_yaml::Value,
    item: Option<Item>,
}

impl IndexEntry {
    fn from_item(item: &Item) -> RepoResult<Self> {
        let raw = serde_yaml::to_value(item)
            .map_err(|err| RepoError::InvalidData(format!("serialize item {}: {err}", item.id)))?;
        Ok(Self {
            raw,
            item: Some(item.clone()),
        })
    }

    /// Name of the entry, read from the raw value when it did not parse.
    fn name(&self) -> Option<&str> {
        match &self.item {
            Some(item) => Some(&item.name),
            None => self.raw.get("name").and_then(serde_yaml::Value::as_str),
        }
    }
}

impl Index {
    fn into_items(self) -> Vec<Item> {
        self.entries.into_iter().filter_map(|entry| entry.item).collect()
    }

    /// Finds a parsed entry by id, returning its slot and a copy of the item.
    fn find(&self, id: ItemId) -> Option<(usize, Item)> {
        self.entries.iter().enumerate().find_map(|(slot, entry)| {
            entry
                .item
                .as_ref()
                .filter(|item| item.id == id)
                .map(|item| (slot, item.clone()))
        })
    }

    fn name_taken(&self, name: &str, except: Option<ItemId>) -> bool {
        self.entries.iter().any(|entry| {
            entry.name() == Some(name)
                && !matches!((&entry.item, except), (Some(item), Some(id)) if item.id == id)
        })
    }
}

impl FileRepository {
    /// Opens the storage root, creating it when missing.
    pub fn open(root: impl Into<PathBuf>) -> RepoResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            RepoError::io(format!("create storage root `{}`", root.display()), err)
        })?;
        Ok(Self {
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            closed: false,
        })
    }

    /// Overrides how long index mutations wait for the directory lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn ensure_open(&self) -> RepoResult<()> {
        if self.closed {
            Err(RepoError::Closed)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> RepoResult<DirLock> {
        self.ensure_open()?;
        DirLock::acquire(&self.root, self.lock_timeout)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    fn item_dir(&self, name: &str) -> PathBuf {
        self.root.join(slugify(name))
    }

    /// Loads the index as stored, keeping entries that fail to parse.
    fn load_index(&self) -> RepoResult<Index> {
        self.ensure_open()?;

        let path = self.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Index::default()),
            Err(err) => {
                return Err(RepoError::io(
                    format!("read index `{}`", path.display()),
                    err,
                ))
            }
        };
        if content.trim().is_empty() {
            return Ok(Index::default());
        }

        let document: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|err| RepoError::CorruptState {
                path: path.clone(),
                message: err.to_string(),
            })?;
        let values = match document {
            serde_yaml::Value::Null => return Ok(Index::default()),
            serde_yaml::Value::Sequence(values) => values,
            _ => {
                return Err(RepoError::CorruptState {
                    path,
                    message: "index root is not a sequence".to_string(),
                })
            }
        };

        let mut entries = Vec::with_capacity(values.len());
        for (entry, raw) in values.into_iter().enumerate() {
            let item = match parse_index_entry(&raw) {
                Ok(item) => Some(item),
                Err(reason) => {
                    warn!(
                        "event=index_entry_skipped module=repo.file status=skipped entry={entry} reason={reason}"
                    );
                    None
                }
            };
            entries.push(IndexEntry { raw, item });
        }
        Ok(Index { entries })
    }

    fn read_index(&self) -> RepoResult<Vec<Item>> {
        Ok(self.load_index()?.into_items())
    }

    fn write_index(&self, index: &Index) -> RepoResult<()> {
        let values: Vec<&serde_yaml::Value> = index.entries.iter().map(|entry| &entry.raw).collect();
        let yaml = serde_yaml::to_string(&values)
            .map_err(|err| RepoError::InvalidData(format!("serialize index: {err}")))?;
        write_atomic(&self.index_path(), yaml.as_bytes())
    }

    fn find_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        Ok(self.read_index()?.into_iter().find(|item| item.id == id))
    }

    fn require_item(&self, id: ItemId) -> RepoResult<Item> {
        self.find_item(id)?
            .ok_or_else(|| RepoError::item_not_found(id))
    }

    /// Parses every position file in `dir`, whichever item it belongs to.
    fn scan_dir(&self, dir: &Path) -> RepoResult<Vec<StoredPosition>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(RepoError::io(
                    format!("list item directory `{}`", dir.display()),
                    err,
                ))
            }
        };

        let mut stored = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                RepoError::io(format!("list item directory `{}`", dir.display()), err)
            })?;
            let path = entry.path();
            if !is_position_file(&path) {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(|err| err.to_string())
                .and_then(|content| parse_position_file(&content));
            match parsed {
                Ok(position) => stored.push(StoredPosition { path, position }),
                Err(_) => warn!(
                    "event=position_file_skipped module=repo.file status=skipped path={}",
                    path.display()
                ),
            }
        }
        Ok(stored)
    }

    fn stored_positions_of(&self, item: &Item) -> RepoResult<Vec<StoredPosition>> {
        let mut stored = self.scan_dir(&self.item_dir(&item.name))?;
        stored.retain(|entry| entry.position.item_id == item.id);
        Ok(stored)
    }

    fn timeline_of(&self, item: &Item) -> RepoResult<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .stored_positions_of(item)?
            .into_iter()
            .map(|entry| entry.position)
            .collect();
        sort_timeline(&mut positions);
        Ok(positions)
    }

    fn item_timeline(&self, item_id: ItemId) -> RepoResult<Vec<Position>> {
        match self.find_item(item_id)? {
            Some(item) => self.timeline_of(&item),
            None => Ok(Vec::new()),
        }
    }

    fn all_stored_positions(&self) -> RepoResult<Vec<StoredPosition>> {
        let mut stored = Vec::new();
        for item in self.read_index()? {
            stored.extend(self.stored_positions_of(&item)?);
        }
        Ok(stored)
    }

    fn find_stored_position(&self, id: PositionId) -> RepoResult<Option<StoredPosition>> {
        Ok(self
            .all_stored_positions()?
            .into_iter()
            .find(|entry| entry.position.id == id))
    }

    fn write_position_file(&self, item: &Item, pos: &Position) -> RepoResult<PathBuf> {
        let dir = self.item_dir(&item.name);
        fs::create_dir_all(&dir).map_err(|err| {
            RepoError::io(format!("create item directory `{}`", dir.display()), err)
        })?;

        let body = pos
            .label
            .as_deref()
            .filter(|label| !label.is_empty())
            .map(|label| format!("\n{label}\n"))
            .unwrap_or_default();
        let document = frontmatter::render(pos, &body)
            .map_err(|err| RepoError::InvalidData(format!("serialize position {}: {err}", pos.id)))?;

        let path = dir.join(position_file_name(pos));
        write_atomic(&path, document.as_bytes())?;
        Ok(path)
    }

    /// Moves an item's position files after a rename changed its slug.
    fn move_item_files(&self, item_id: ItemId, from: &Path, to: &Path) -> RepoResult<()> {
        fs::create_dir_all(to).map_err(|err| {
            RepoError::io(format!("create item directory `{}`", to.display()), err)
        })?;

        for entry in self.scan_dir(from)? {
            if entry.position.item_id != item_id {
                continue;
            }
            let Some(file_name) = entry.path.file_name() else {
                continue;
            };
            let target = to.join(file_name);
            fs::rename(&entry.path, &target).map_err(|err| {
                RepoError::io(
                    format!("move `{}` to `{}`", entry.path.display(), target.display()),
                    err,
                )
            })?;
        }

        // Another item sharing the slug keeps the directory alive.
        match fs::remove_dir(from) {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound) => {
                Ok(())
            }
            Err(err) => Err(RepoError::io(
                format!("remove item directory `{}`", from.display()),
                err,
            )),
        }
    }
}

impl Repository for FileRepository {
    fn create_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        if index.name_taken(&item.name, None) {
            return Err(RepoError::AlreadyExists(format!("item named `{}`", item.name)));
        }
        if index.find(item.id).is_some() {
            return Err(RepoError::AlreadyExists(format!("item {}", item.id)));
        }

        index.entries.push(IndexEntry::from_item(item)?);
        self.write_index(&index)?;

        let dir = self.item_dir(&item.name);
        fs::create_dir_all(&dir).map_err(|err| {
            RepoError::io(format!("create item directory `{}`", dir.display()), err)
        })?;

        info!("event=item_create module=repo.file status=ok");
        Ok(())
    }

    fn get_item_by_id(&self, id: ItemId) -> RepoResult<Item> {
        self.require_item(id)
    }

    fn get_item_by_name(&self, name: &str) -> RepoResult<Item> {
        self.read_index()?
            .into_iter()
            .find(|item| item.name == name)
            .ok_or_else(|| RepoError::item_name_not_found(name))
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        let mut items = self.read_index()?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        let Some((slot, item)) = index.find(id) else {
            debug!("event=item_delete module=repo.file status=skipped");
            return Ok(());
        };

        index.entries.remove(slot);
        self.write_index(&index)?;

        let slug = slugify(&item.name);
        let dir = self.root.join(&slug);
        let shared = index
            .entries
            .iter()
            .filter_map(IndexEntry::name)
            .any(|other| slugify(other) == slug);
        if shared {
            for entry in self.scan_dir(&dir)? {
                if entry.position.item_id == item.id {
                    remove_file_if_exists(&entry.path)?;
                }
            }
        } else {
            remove_dir_if_exists(&dir)?;
        }

        info!("event=item_delete module=repo.file status=ok");
        Ok(())
    }

    fn create_position(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;

        let item = self.require_item(pos.item_id)?;
        if let Some(current) = self.timeline_of(&item)?.first() {
            if current.same_location(pos) {
                debug!("event=position_dedup module=repo.file status=skipped");
                return Ok(());
            }
        }
        self.write_position_file(&item, pos)?;
        Ok(())
    }

    fn create_position_direct(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;

        let item = self.require_item(pos.item_id)?;
        self.write_position_file(&item, pos)?;
        Ok(())
    }

    fn get_position(&self, id: PositionId) -> RepoResult<Position> {
        self.find_stored_position(id)?
            .map(|entry| entry.position)
            .ok_or_else(|| RepoError::position_not_found(id))
    }

    fn get_current_position(&self, item_id: ItemId) -> RepoResult<Position> {
        let item = self.require_item(item_id)?;
        self.timeline_of(&item)?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::no_current_position(item_id))
    }

    fn get_timeline(&self, item_id: ItemId) -> RepoResult<Vec<Position>> {
        self.item_timeline(item_id)
    }

    fn get_positions_since(
        &self,
        item_id: ItemId,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        let mut positions = self.item_timeline(item_id)?;
        positions.retain(|pos| pos.recorded_at > since);
        Ok(positions)
    }

    fn get_positions_in_range(
        &self,
        item_id: ItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        let mut positions = self.item_timeline(item_id)?;
        positions.retain(|pos| pos.recorded_at >= from && pos.recorded_at <= to);
        Ok(positions)
    }

    fn get_all_positions(&self) -> RepoResult<Vec<Position>> {
        let mut positions: Vec<Position> = self
            .all_stored_positions()?
            .into_iter()
            .map(|entry| entry.position)
            .collect();
        sort_timeline(&mut positions);
        Ok(positions)
    }

    fn get_all_positions_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Position>> {
        let mut positions = self.get_all_positions()?;
        positions.retain(|pos| pos.recorded_at > since);
        Ok(positions)
    }

    fn get_all_positions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Position>> {
        let mut positions = self.get_all_positions()?;
        positions.retain(|pos| pos.recorded_at >= from && pos.recorded_at <= to);
        Ok(positions)
    }

    fn delete_position(&self, id: PositionId) -> RepoResult<()> {
        match self.find_stored_position(id)? {
            Some(entry) => remove_file_if_exists(&entry.path),
            None => Ok(()),
        }
    }

    fn upsert_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        if index.name_taken(&item.name, Some(item.id)) {
            return Err(RepoError::AlreadyExists(format!("item named `{}`", item.name)));
        }

        let new_dir = self.item_dir(&item.name);
        match index.find(item.id) {
            Some((_, existing)) if existing.name == item.name => return Ok(()),
            Some((slot, existing)) => {
                let old_dir = self.item_dir(&existing.name);
                let renamed = Item {
                    name: item.name.clone(),
                    ..existing
                };
                index.entries[slot] = IndexEntry::from_item(&renamed)?;
                self.write_index(&index)?;
                if old_dir != new_dir {
                    self.move_item_files(item.id, &old_dir, &new_dir)?;
                }
            }
            None => {
                index.entries.push(IndexEntry::from_item(item)?);
                self.write_index(&index)?;
                fs::create_dir_all(&new_dir).map_err(|err| {
                    RepoError::io(
                        format!("create item directory `{}`", new_dir.display()),
                        err,
                    )
                })?;
            }
        }
        Ok(())
    }

    fn upsert_position(&self, pos: &Position) -> RepoResult<()> {
        pos.validate()?;

        let item = self.require_item(pos.item_id)?;
        let previous = self.find_stored_position(pos.id)?;
        let path = self.write_position_file(&item, pos)?;
        if let Some(previous) = previous {
            if previous.path != path {
                remove_file_if_exists(&previous.path)?;
            }
        }
        Ok(())
    }

    fn sync(&self) -> RepoResult<()> {
        self.ensure_open()
    }

    fn reset(&self) -> RepoResult<()> {
        let _lock = self.lock()?;
        let entries = fs::read_dir(&self.root).map_err(|err| {
            RepoError::io(format!("list storage root `{}`", self.root.display()), err)
        })?;

        for entry in entries {
            let entry = entry.map_err(|err| {
                RepoError::io(format!("list storage root `{}`", self.root.display()), err)
            })?;
            if entry.file_name() == LOCK_FILE_NAME {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                remove_dir_if_exists(&path)?;
            } else {
                remove_file_if_exists(&path)?;
            }
        }

        info!("event=storage_reset module=repo.file status=ok");
        Ok(())
    }

    fn close(&mut self) -> RepoResult<()> {
        self.closed = true;
        Ok(())
    }
}

fn parse_index_entry(value: &serde_yaml::Value) -> Result<Item, String> {
    let item: Item = serde_yaml::from_value(value.clone()).map_err(|err| err.to_string())?;
    item.validate().map_err(|err| err.to_string())?;
    Ok(item)
}

fn parse_position_file(content: &str) -> Result<Position, String> {
    let (position, _body): (Position, &str) = frontmatter::parse(content)?;
    position.validate().map_err(|err| err.to_string())?;
    Ok(position)
}

fn is_position_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.starts_with(TEMP_FILE_PREFIX) || name.starts_with('.') {
        return false;
    }
    path.extension().and_then(|ext| ext.to_str()) == Some(POSITION_FILE_EXTENSION)
        && path.is_file()
}

fn position_file_name(pos: &Position) -> String {
    let id = pos.id.to_string();
    format!(
        "{}-{}.{POSITION_FILE_EXTENSION}",
        pos.recorded_at.format(FILE_TIMESTAMP_FORMAT),
        &id[..8]
    )
}

fn remove_file_if_exists(path: &Path) -> RepoResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RepoError::io(format!("remove `{}`", path.display()), err)),
    }
}

fn remove_dir_if_exists(path: &Path) -> RepoResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RepoError::io(format!("remove `{}`", path.display()), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{position_file_name, FileRepository, INDEX_FILE_NAME};
    use crate::model::item::Item;
    use crate::model::position::Position;
    use crate::repo::Repository;
    use chrono::{TimeZone, Utc};
    use std::fs;

    #[test]
    fn position_file_name_uses_timestamp_and_id_prefix() {
        let item = Item::new("harper");
        let pos = Position::with_recorded_at(
            item.id,
            41.8781,
            -87.6298,
            None,
            Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
        );
        let name = position_file_name(&pos);
        assert!(name.starts_with("2026-03-04T05-06-07-"));
        assert!(name.ends_with(".md"));
        assert_eq!(&name[20..28], &pos.id.to_string()[..8]);
    }

    #[test]
    fn label_is_written_as_body_line() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::open(dir.path()).unwrap();
        let item = Item::new("harper");
        repo.create_item(&item).unwrap();

        let pos = Position::new(item.id, 41.8781, -87.6298, Some("chicago".to_string()));
        repo.create_position(&pos).unwrap();

        let path = dir.path().join("harper").join(position_file_name(&pos));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("label: chicago\n"));
        assert!(content.ends_with("---\n\nchicago\n"));
    }

    #[test]
    fn closed_repository_rejects_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = FileRepository::open(dir.path()).unwrap();
        repo.close().unwrap();
        repo.close().unwrap();
        assert!(repo.list_items().is_err());
        assert!(!dir.path().join(INDEX_FILE_NAME).exists());
    }
}
