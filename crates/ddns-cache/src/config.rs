//! Configuration types for the record cache

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Environment variable holding the store root
pub const ENV_ROOT: &str = "DDNS_CACHE_ROOT";
/// Environment variable holding the notifier channel capacity
pub const ENV_NOTIFY_CAPACITY: &str = "DDNS_CACHE_NOTIFY_CAPACITY";
/// Environment variable holding the cache expiry in seconds
pub const ENV_STALE_AFTER_SECS: &str = "DDNS_CACHE_STALE_AFTER_SECS";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the cache
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Capacity of each change notifier's delivery channel
    ///
    /// A full channel blocks event translation until the consumer catches up.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,

    /// Age after which a refresh stamp no longer counts as fresh
    ///
    /// Set to 0 to only expire on configuration changes.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl StoreConfig {
    /// Create a configuration for the given root with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            notify_capacity: default_notify_capacity(),
            stale_after_secs: default_stale_after_secs(),
        }
    }

    /// Set the notifier channel capacity
    pub fn with_notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }

    /// Set the cache expiry
    pub fn with_stale_after_secs(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults; unparsable numbers are errors.
    pub fn from_env() -> Result<Self, crate::Error> {
        let root = env::var(ENV_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_root());

        let notify_capacity = match env::var(ENV_NOTIFY_CAPACITY) {
            Ok(value) => value.trim().parse().map_err(|e| {
                crate::Error::config(format!("{} must be a number: {}", ENV_NOTIFY_CAPACITY, e))
            })?,
            Err(_) => default_notify_capacity(),
        };

        let stale_after_secs = match env::var(ENV_STALE_AFTER_SECS) {
            Ok(value) => value.trim().parse().map_err(|e| {
                crate::Error::config(format!("{} must be a number: {}", ENV_STALE_AFTER_SECS, e))
            })?,
            Err(_) => default_stale_after_secs(),
        };

        Ok(Self {
            root,
            notify_capacity,
            stale_after_secs,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.root.as_os_str().is_empty() {
            return Err(crate::Error::config("Store root cannot be empty"));
        }
        if !self.root.is_absolute() {
            return Err(crate::Error::config(format!(
                "Store root must be an absolute path. Got: {}",
                self.root.display()
            )));
        }
        if self.notify_capacity == 0 {
            return Err(crate::Error::config("Notifier capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(default_root())
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/tmp/dns.Cache")
}

fn default_notify_capacity() -> usize {
    64
}

fn default_stale_after_secs() -> u64 {
    86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.root, PathBuf::from("/tmp/dns.Cache"));
        assert_eq!(config.notify_capacity, 64);
        assert_eq!(config.stale_after_secs, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_root() {
        let config = StoreConfig::new("relative/cache");
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = StoreConfig::new("/var/cache/ddns").with_notify_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "root": "/var/cache/ddns" }"#).unwrap();
        assert_eq!(config.root, PathBuf::from("/var/cache/ddns"));
        assert_eq!(config.notify_capacity, 64);
        assert_eq!(config.stale_after_secs, 86_400);
    }
}
