//! Storage configuration and backend factory.
//!
//! Stored as TOML, by default in `<config_dir>/position/config.toml`.

use crate::filestore::atomic::write_atomic;
use crate::repo::file_repo::FileRepository;
use crate::repo::sqlite_repo::SqliteRepository;
use crate::repo::{RepoError, Repository};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "position";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "position.db";

/// Storage backend selected at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    #[default]
    #[serde(rename = "sql", alias = "sqlite")]
    Sql,
    #[serde(rename = "file", alias = "markdown")]
    File,
}

impl Backend {
    /// Name used in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::File => "file",
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to open.
    pub backend: Backend,

    /// Root directory for data; a leading `~` is expanded.
    /// SQL stores `position.db` here, the file backend uses it as its root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Serialize(toml::ser::Error),
    /// The platform has no such standard directory (e.g. no home).
    MissingDirectory(&'static str),
    Repo(RepoError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to access config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::Serialize(err) => write!(f, "failed to serialize config: {err}"),
            Self::MissingDirectory(which) => {
                write!(f, "cannot determine the {which} directory")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::MissingDirectory(_) => None,
        }
    }
}

impl From<RepoError> for ConfigError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl StorageConfig {
    /// Loads config from `path`, falling back to defaults when it is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(ConfigError::MissingDirectory("data")),
        }
    }

    /// Opens the configured backend.
    pub fn open_repository(&self) -> Result<Box<dyn Repository>, ConfigError> {
        let data_dir = self.data_dir()?;
        info!(
            "event=storage_open module=config status=start backend={}",
            self.backend.as_str()
        );
        let repo: Box<dyn Repository> = match self.backend {
            Backend::Sql => Box::new(SqliteRepository::open(data_dir.join(DATABASE_FILE_NAME))?),
            Backend::File => Box::new(FileRepository::open(data_dir)?),
        };
        Ok(repo)
    }
}

/// Default config location: `<config_dir>/position/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::MissingDirectory("config"))
}

/// Expands a leading `~` component to the home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or(ConfigError::MissingDirectory("home")),
        Err(_) => Ok(path.to_path_buf()),
    }
}
