//! Logical records produced by listing and by change notifications

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

use crate::store::Store;
use crate::{Error, Result};

/// Entry of a section: either an item or a nested subsection
#[derive(Debug, Clone)]
pub struct Record {
    store: Store,
    section: Vec<String>,
    name: String,
    subsection: bool,
}

impl Record {
    pub(crate) fn new(store: Store, section: Vec<String>, name: String, subsection: bool) -> Self {
        Self {
            store,
            section,
            name,
            subsection,
        }
    }

    /// Section path the record was found in
    pub fn section(&self) -> &[String] {
        &self.section
    }

    /// Decoded item id or subsection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the record is a subsection rather than an item
    pub fn is_subsection(&self) -> bool {
        self.subsection
    }

    /// Section path of this record when it is a subsection
    pub fn path(&self) -> Vec<String> {
        let mut path = self.section.clone();
        path.push(self.name.clone());
        path
    }

    /// Read the item's content
    ///
    /// Returns [`Error::NotAnItem`] for subsections.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<T> {
        self.ensure_item()?;
        self.store.get(&self.name, self.section.as_slice()).await
    }

    /// Replace the item's content
    ///
    /// Returns [`Error::NotAnItem`] for subsections.
    pub async fn update<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.ensure_item()?;
        self.store.put(value, &self.name, self.section.as_slice()).await
    }

    /// Remove the item
    ///
    /// Returns [`Error::NotAnItem`] for subsections.
    pub async fn remove(&self) -> Result<()> {
        self.ensure_item()?;
        self.store.remove_item(&self.name, self.section.as_slice()).await
    }

    fn ensure_item(&self) -> Result<()> {
        if self.subsection {
            return Err(Error::not_an_item(&self.name));
        }
        Ok(())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.store.root() == other.store.root()
            && self.section == other.section
            && self.name == other.name
            && self.subsection == other.subsection
    }
}

impl Eq for Record {}

/// Kind of change observed on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Record created, copied or moved in
    Create,
    /// Record content changed
    Update,
    /// Record removed or moved out
    Remove,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "Create"),
            ChangeKind::Update => write!(f, "Update"),
            ChangeKind::Remove => write!(f, "Remove"),
        }
    }
}

/// A record tagged with the change that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEvent {
    /// Affected record
    pub record: Record,
    /// What happened to it
    pub kind: ChangeKind,
}

impl RecordEvent {
    /// Create a new record event
    pub fn new(record: Record, kind: ChangeKind) -> Self {
        Self { record, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_subsection_rejects_item_operations() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let record = Record::new(store, vec!["example.com".into()], "www".into(), true);

        assert!(matches!(
            record.get::<Value>().await,
            Err(Error::NotAnItem { .. })
        ));
        assert!(matches!(
            record.update(&1).await,
            Err(Error::NotAnItem { .. })
        ));
        assert!(matches!(record.remove().await, Err(Error::NotAnItem { .. })));
    }

    #[test]
    fn test_record_path() {
        let record = Record::new(
            Store::new("/cache"),
            vec!["example.com".into()],
            "www".into(),
            true,
        );
        assert_eq!(record.path(), vec!["example.com", "www"]);
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Create.to_string(), "Create");
        assert_eq!(ChangeKind::Update.to_string(), "Update");
        assert_eq!(ChangeKind::Remove.to_string(), "Remove");
    }
}
