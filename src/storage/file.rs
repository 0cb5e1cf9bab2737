use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::error::{LandingError, Result};

const STORE_FILE_NAME: &str = "storage.json";
const STORE_FILE_VERSION: u32 = 1;

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    pub base_dir: PathBuf,
}

impl FileStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_storage_dir()
    }
}

/// Durable store: one JSON document holding every key, rewritten atomically.
///
/// # Example
/// ```no_run
/// use oauth_landing::storage::{keys, FileStore, FileStoreConfig, KeyValueStore};
///
/// let store = FileStore::new(FileStoreConfig::new(std::path::PathBuf::from("/tmp/landing")));
/// store.set(keys::USER_ID, "user-123")?;
/// # Ok::<(), oauth_landing::error::LandingError>(())
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            path: config.base_dir.join(STORE_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn new_default() -> Self {
        Self::new(FileStoreConfig::new(default_storage_dir()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(LandingError::Io(err)),
        };
        match serde_json::from_str::<StoreFile>(&raw) {
            Ok(file) if file.version == STORE_FILE_VERSION => Ok(file.values),
            Ok(file) => Err(LandingError::Storage(format!(
                "Unsupported storage file version {} at {}",
                file.version,
                self.path.display()
            ))),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Discarding unreadable storage file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn modify(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LandingError::Storage("file store lock poisoned".to_string()))?;
        let mut values = self.read_all()?;
        change(&mut values);
        let file = StoreFile {
            version: STORE_FILE_VERSION,
            values,
        };
        let serialized = serde_json::to_vec_pretty(&file)?;
        atomic_write(&self.path, &serialized)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    values: BTreeMap<String, String>,
}

fn default_storage_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".oauth-landing"))
        .unwrap_or_else(|| PathBuf::from(".oauth-landing"))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        LandingError::Configuration(format!("Storage path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(LandingError::Io(err));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(LandingError::Io(err));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
