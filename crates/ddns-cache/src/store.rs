// # Record Store
//
// Filesystem-backed CRUD over JSON items.
//
// ## Addressing
//
// An item is addressed by a section path and an id. Both are escaped by the
// codec, so the item with id `A-home` in section `["example.com", "www"]`
// lives at `<root>/example.com/www/A-home.json`.
//
// ## Locking
//
// One `RwLock` per store instance serializes every operation: `get`/`list`
// take it shared, `put`/`remove_item`/`clean` take it exclusive. The guard
// lives for the whole operation and is dropped on every exit path.
//
// ## Atomic Writes
//
// `put` writes to a staging file next to the target and renames it into
// place, so a reader never sees a partially written item. Staging files are
// skipped by listing and by the change notifier.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::codec;
use crate::config::StoreConfig;
use crate::listing;
use crate::record::Record;
use crate::section::Section;
use crate::{Error, Result};

/// Empty section path, addressing items directly under the store root
pub const ROOT: &[&str] = &[];

/// Indentation of stored items
const JSON_INDENT: &[u8] = b"    ";

/// File-based hierarchical record store
///
/// Cloning is cheap; clones share the root and the lock.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_cache::Store;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Store::new("/var/cache/ddns");
///
///     store
///         .put(&serde_json::json!({ "ip": "1.2.3.4" }), "home", &["example.com", "www"])
///         .await?;
///
///     let value: serde_json::Value = store.get("home", &["example.com", "www"]).await?;
///     assert_eq!(value["ip"], "1.2.3.4");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    guard: Arc<RwLock<()>>,
    notify_capacity: usize,
    staging_seq: AtomicU64,
}

impl Store {
    /// Create a store with its own lock
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_lock(root, Arc::new(RwLock::new(())))
    }

    /// Create a store that serializes its operations on `guard`
    ///
    /// Stores sharing a guard exclude each other's writes.
    pub fn with_lock(root: impl Into<PathBuf>, guard: Arc<RwLock<()>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: root.into(),
                guard,
                notify_capacity: StoreConfig::default().notify_capacity,
                staging_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Create a store from validated configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                root: config.root.clone(),
                guard: Arc::new(RwLock::new(())),
                notify_capacity: config.notify_capacity,
                staging_seq: AtomicU64::new(0),
            }),
        })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Capacity of notifier delivery channels created from this store
    pub fn notify_capacity(&self) -> usize {
        self.inner.notify_capacity
    }

    /// Directory of a section. Does not touch the filesystem.
    ///
    /// Fails with [`Error::EmptySegment`] if any segment is empty.
    pub fn dir_location<S: AsRef<str>>(&self, section: &[S]) -> Result<PathBuf> {
        codec::dir_location(&self.inner.root, section)
    }

    /// File of an item. Does not touch the filesystem.
    pub fn item_location<S: AsRef<str>>(&self, section: &[S], id: &str) -> Result<PathBuf> {
        codec::item_location(&self.inner.root, section, id)
    }

    /// Handle bound to a section path
    pub fn section<S: AsRef<str>>(&self, section: &[S]) -> Section {
        Section::new(self.clone(), owned_path(section))
    }

    /// Put or replace an item
    pub async fn put<T, S>(&self, value: &T, id: &str, section: &[S]) -> Result<()>
    where
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        let location = self.item_location(section, id)?;
        let data = to_indented_json(value)?;

        let _guard = self.inner.guard.write().await;

        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let seq = self.inner.staging_seq.fetch_add(1, Ordering::Relaxed);
        let staging = codec::staging_location(&location, seq);
        if let Err(e) = write_file(&staging, &data).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &location).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Error::io(&location, e));
        }

        debug!("Stored {} ({} bytes)", location.display(), data.len());
        Ok(())
    }

    /// Read an item and decode it into `T`
    pub async fn get<T, S>(&self, id: &str, section: &[S]) -> Result<T>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        let location = self.item_location(section, id)?;

        let _guard = self.inner.guard.read().await;

        let data = fs::read(&location)
            .await
            .map_err(|e| Error::lookup(&location, e))?;
        trace!("Read {} ({} bytes)", location.display(), data.len());

        serde_json::from_slice(&data).map_err(|e| Error::decode(&location, e))
    }

    /// Remove a single item
    ///
    /// Fails with [`Error::NotFound`] if the item does not exist.
    pub async fn remove_item<S: AsRef<str>>(&self, id: &str, section: &[S]) -> Result<()> {
        let location = self.item_location(section, id)?;

        let _guard = self.inner.guard.write().await;

        fs::remove_file(&location)
            .await
            .map_err(|e| Error::lookup(&location, e))?;
        debug!("Removed {}", location.display());
        Ok(())
    }

    /// Remove a section with all its items and subsections
    ///
    /// A missing section is not an error.
    pub async fn clean<S: AsRef<str>>(&self, section: &[S]) -> Result<()> {
        let location = self.dir_location(section)?;

        let _guard = self.inner.guard.write().await;

        match fs::remove_dir_all(&location).await {
            Ok(()) => {
                debug!("Cleaned {}", location.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("Nothing to clean at {}", location.display());
                Ok(())
            }
            Err(e) => Err(Error::io(&location, e)),
        }
    }

    /// Items and subsections directly under a section
    ///
    /// A missing section lists as empty.
    pub async fn list<S: AsRef<str>>(&self, section: &[S]) -> Result<Vec<Record>> {
        let location = self.dir_location(section)?;

        let _guard = self.inner.guard.read().await;

        listing::scan(self, owned_path(section), &location).await
    }

    /// Create the section directory if needed and return its location
    pub(crate) async fn ensure_section<S: AsRef<str>>(&self, section: &[S]) -> Result<PathBuf> {
        let location = self.dir_location(section)?;

        let _guard = self.inner.guard.write().await;

        fs::create_dir_all(&location)
            .await
            .map_err(|e| Error::io(&location, e))?;
        Ok(location)
    }
}

fn owned_path<S: AsRef<str>>(section: &[S]) -> Vec<String> {
    section.iter().map(|s| s.as_ref().to_string()).collect()
}

fn to_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut data, formatter);
    value.serialize(&mut serializer).map_err(Error::Encode)?;
    Ok(data)
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    file.write_all(data).await.map_err(|e| Error::io(path, e))?;
    file.flush().await.map_err(|e| Error::io(path, e))?;
    file.sync_all().await.map_err(|e| Error::io(path, e))?;
    Ok(())
}
