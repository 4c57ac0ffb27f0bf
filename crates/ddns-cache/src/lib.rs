// # ddns-cache
//
// Filesystem-backed record cache for the DDNS system.
//
// ## Architecture Overview
//
// Provider state (zone metadata, DNS record snapshots) is cached between runs
// so the update check can skip network calls when nothing changed:
// - **codec**: Reversible mapping from section/item names to filesystem paths
// - **Store**: Locked CRUD over JSON items addressed by (section path, id)
// - **Section**: Stateless view over one section path
// - **listing**: Rebuilds logical records from a section directory
// - **ChangeNotifier**: Turns filesystem events into typed record events
// - **DnsCache**: The cache layout used by the update workflow
//
// ## On-disk Layout
//
// ```text
// <root>/
//   cacheTime.json
//   example.com.json
//   example.com/
//     www/
//       A-home.json
// ```
//
// Every section segment and item id is query-escaped, so any string is a
// valid item id and any non-empty string a valid section name.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod listing;
pub mod notifier;
pub mod record;
pub mod section;
pub mod store;

// Re-export core types for convenience
pub use cache::{DnsCache, RecordSnapshot};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use notifier::{ChangeNotifier, NotifierState};
pub use record::{ChangeKind, Record, RecordEvent};
pub use section::Section;
pub use store::{ROOT, Store};
