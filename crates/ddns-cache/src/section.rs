//! Section handle
//!
//! A [`Section`] binds a section path to a store. It carries no state of its
//! own; every call forwards to the [`Store`] with the bound path.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::Result;
use crate::notifier::ChangeNotifier;
use crate::record::Record;
use crate::store::Store;

/// View over one section of a store
#[derive(Debug, Clone)]
pub struct Section {
    store: Store,
    path: Vec<String>,
}

impl Section {
    pub(crate) fn new(store: Store, path: Vec<String>) -> Self {
        Self { store, path }
    }

    /// Bound section path
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Store this section belongs to
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Directory of this section in the filesystem
    pub fn location(&self) -> Result<PathBuf> {
        self.store.dir_location(self.path.as_slice())
    }

    /// Handle for a nested section
    pub fn subsection(&self, name: &str) -> Section {
        let mut path = self.path.clone();
        path.push(name.to_string());
        Section::new(self.store.clone(), path)
    }

    /// Put or replace an item in this section
    pub async fn put<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> Result<()> {
        self.store.put(value, id, self.path.as_slice()).await
    }

    /// Read an item of this section
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.store.get(id, self.path.as_slice()).await
    }

    /// Remove an item of this section
    pub async fn remove_item(&self, id: &str) -> Result<()> {
        self.store.remove_item(id, self.path.as_slice()).await
    }

    /// Remove this section with everything beneath it
    pub async fn clean(&self) -> Result<()> {
        self.store.clean(self.path.as_slice()).await
    }

    /// Items and subsections directly under this section
    pub async fn list(&self) -> Result<Vec<Record>> {
        self.store.list(self.path.as_slice()).await
    }

    /// Idle change notifier for this section
    ///
    /// Call [`ChangeNotifier::start`] to begin receiving events.
    pub fn notifier(&self) -> ChangeNotifier {
        ChangeNotifier::new(self.clone())
    }
}
