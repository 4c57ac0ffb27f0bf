//! DNS cache layout
//!
//! The update workflow caches provider state in a fixed layout:
//!
//! ```text
//! <root>/cacheTime.json                 unix time of the last refresh
//! <root>/<domain>.json                  zone metadata as returned by the provider
//! <root>/<domain>/<subdomain>/<TYPE>-<remark>.json   record snapshots
//! ```
//!
//! [`DnsCache`] reads and writes that layout and decides when the cached
//! state has to be refreshed from the provider.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::section::Section;
use crate::store::{ROOT, Store};
use crate::{Error, Result};

/// Id of the refresh stamp item at the store root
pub const CACHE_TIME_ID: &str = "cacheTime";

/// Cached copy of one provider DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Provider-assigned record id
    pub record_id: String,
    /// Subdomain the record belongs to (`@` for the apex)
    pub name: String,
    /// Record type, e.g. `A`, `AAAA`, `HTTPS`
    pub record_type: String,
    /// Record content
    pub value: String,
    /// Remark labelling which IP source the record follows
    #[serde(default)]
    pub remark: String,
    /// When the snapshot was taken
    pub updated_at: DateTime<Utc>,
}

impl RecordSnapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(
        record_id: impl Into<String>,
        name: impl Into<String>,
        record_type: impl Into<String>,
        value: impl Into<String>,
        remark: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            name: name.into(),
            record_type: record_type.into(),
            value: value.into(),
            remark: remark.into(),
            updated_at: Utc::now(),
        }
    }

    /// Item id of this snapshot within its subdomain section
    pub fn cache_id(&self) -> String {
        snapshot_id(&self.record_type, &self.remark)
    }
}

/// Item id for a record type and remark
pub fn snapshot_id(record_type: &str, remark: &str) -> String {
    format!("{}-{}", record_type, remark)
}

/// Provider state cache on top of a [`Store`]
#[derive(Debug, Clone)]
pub struct DnsCache {
    store: Store,
    stale_after_secs: u64,
}

impl DnsCache {
    /// Create a cache with the default expiry
    pub fn new(store: Store) -> Self {
        Self {
            store,
            stale_after_secs: StoreConfig::default().stale_after_secs,
        }
    }

    /// Create a cache from validated configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            store: Store::from_config(config)?,
            stale_after_secs: config.stale_after_secs,
        })
    }

    /// Set the expiry; 0 disables age-based expiry
    pub fn with_stale_after_secs(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Record the current time as the last successful refresh
    pub async fn stamp(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.store.put(&now.timestamp(), CACHE_TIME_ID, ROOT).await?;
        debug!("Cache stamped at {}", now);
        Ok(now)
    }

    /// Time of the last successful refresh, if any
    pub async fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        match self.store.get::<i64, _>(CACHE_TIME_ID, ROOT).await {
            Ok(secs) => Ok(DateTime::from_timestamp(secs, 0)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cache zone metadata for a domain
    pub async fn put_zone<T: Serialize + ?Sized>(&self, domain: &str, zone: &T) -> Result<()> {
        self.store.put(zone, domain, ROOT).await
    }

    /// Cached zone metadata for a domain
    pub async fn zone<T: DeserializeOwned>(&self, domain: &str) -> Result<Option<T>> {
        match self.store.get(domain, ROOT).await {
            Ok(zone) => Ok(Some(zone)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Section holding the snapshots of one subdomain
    pub fn records(&self, domain: &str, subdomain: &str) -> Section {
        self.store.section(&[domain, subdomain])
    }

    /// Cache a record snapshot under its domain and subdomain
    pub async fn put_snapshot(&self, domain: &str, snapshot: &RecordSnapshot) -> Result<()> {
        self.records(domain, &snapshot.name)
            .put(&snapshot.cache_id(), snapshot)
            .await
    }

    /// Cached snapshot for a record type and remark
    pub async fn snapshot(
        &self,
        domain: &str,
        subdomain: &str,
        record_type: &str,
        remark: &str,
    ) -> Result<Option<RecordSnapshot>> {
        let id = snapshot_id(record_type, remark);
        match self.records(domain, subdomain).get(&id).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All readable snapshots of a subdomain
    ///
    /// Unreadable entries are logged and skipped so one corrupt file does not
    /// hide the others.
    pub async fn snapshots(&self, domain: &str, subdomain: &str) -> Result<Vec<RecordSnapshot>> {
        let mut snapshots = Vec::new();
        for record in self.records(domain, subdomain).list().await? {
            if record.is_subsection() {
                continue;
            }
            match record.get::<RecordSnapshot>().await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(
                    "Skipping cached record {} of {}.{}: {}",
                    record.name(),
                    subdomain,
                    domain,
                    e
                ),
            }
        }
        Ok(snapshots)
    }

    /// Whether a subdomain's cached state must be fetched again
    ///
    /// True when no snapshot is cached, the cache was never stamped, the
    /// stamp predates the last configuration change, or the stamp has
    /// expired.
    pub async fn needs_refresh(
        &self,
        domain: &str,
        subdomain: &str,
        config_modified: DateTime<Utc>,
    ) -> Result<bool> {
        let cached = self.records(domain, subdomain).list().await?;
        if !cached.iter().any(|record| !record.is_subsection()) {
            debug!("No cached records for {}.{}", subdomain, domain);
            return Ok(true);
        }

        let Some(stamp) = self.last_refresh().await? else {
            debug!("Cache was never stamped");
            return Ok(true);
        };

        if stamp.timestamp() < config_modified.timestamp() {
            debug!("Configuration changed since {}", stamp);
            return Ok(true);
        }

        if let Some(max_age) = self.max_age() {
            let age = Utc::now().signed_duration_since(stamp);
            if age > max_age {
                debug!("Cache stamp {} expired ({}s old)", stamp, age.num_seconds());
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Cache lifetime, or `None` if stamps never expire
    ///
    /// Zero and lifetimes too large for a `TimeDelta` mean no expiry.
    fn max_age(&self) -> Option<TimeDelta> {
        if self.stale_after_secs == 0 {
            return None;
        }
        i64::try_from(self.stale_after_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    /// Drop everything cached for a domain
    pub async fn invalidate(&self, domain: &str) -> Result<()> {
        self.store.clean(&[domain]).await?;
        match self.store.remove_item(domain, ROOT).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

impl From<Store> for DnsCache {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}

/// Modification time of a file, for [`DnsCache::needs_refresh`]
pub async fn modified_at(path: impl AsRef<Path>) -> Result<DateTime<Utc>> {
    let path = path.as_ref();
    tokio::fs::metadata(path)
        .await
        .and_then(|metadata| metadata.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|e| Error::io(path, e))
}
