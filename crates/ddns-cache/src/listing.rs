//! Section enumeration
//!
//! Rebuilds logical records from the raw entries of a section directory.
//! Directories are subsections; files carrying the item suffix are items.
//! Anything else (staging files, foreign files) is skipped. Records come back
//! in filesystem order.

use std::path::Path;
use tokio::fs;
use tracing::trace;

use crate::codec;
use crate::record::Record;
use crate::store::Store;
use crate::{Error, Result};

/// Scan the immediate children of `location`
///
/// The caller holds the store's read lock. A missing directory yields no
/// records.
pub(crate) async fn scan(store: &Store, section: Vec<String>, location: &Path) -> Result<Vec<Record>> {
    let mut entries = match fs::read_dir(location).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(location, e)),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io(location, e))?
    {
        let raw = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::io(entry.path(), e))?;

        if let Some((name, subsection)) = classify(&raw, file_type.is_dir()) {
            records.push(Record::new(store.clone(), section.clone(), name, subsection));
        } else {
            trace!("Skipping entry {} in {}", raw, location.display());
        }
    }

    Ok(records)
}

/// Decoded name and subsection flag of a raw entry, or `None` if the entry
/// is not part of the store
pub(crate) fn classify(raw: &str, is_dir: bool) -> Option<(String, bool)> {
    if codec::is_staging(raw) {
        return None;
    }
    if is_dir {
        return Some((codec::decode(raw), true));
    }
    codec::item_id(raw).map(|name| (name, false))
}
