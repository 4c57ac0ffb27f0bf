// # Change Notifier
//
// Turns filesystem events of one section directory into typed record events.
//
// ## Lifecycle
//
// ```text
// Idle ──start()──▶ Watching ──stop()──▶ Stopped
// ```
//
// `Stopped` is terminal. Starting twice, or calling `start()`/`stop()` on a
// stopped notifier, fails with `Error::Misuse`. Dropping a watching notifier
// stops it.
//
// ## Delivery
//
// ```text
// notify thread ──raw events──▶ delivery task ──RecordEvent──▶ caller
//                (bounded)                       (bounded)
// ```
//
// Both channels are bounded by the store's notify capacity. A consumer that
// stops draining stalls the delivery task, which in turn stalls the watch
// thread. Events are delivered in the order the watch reports them.
//
// The watch is non-recursive: changes inside subsections are not observed.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::codec;
use crate::record::{ChangeKind, Record, RecordEvent};
use crate::section::Section;
use crate::{Error, Result};

/// Lifecycle state of a [`ChangeNotifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    /// Created, not yet started
    Idle,
    /// Watch open, delivery task running
    Watching,
    /// Watch closed; cannot be restarted
    Stopped,
}

/// Per-section subscription to record changes
///
/// Obtained from [`Section::notifier`].
///
/// # Example
///
/// ```rust,no_run
/// use ddns_cache::Store;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Store::new("/var/cache/ddns");
///     let mut notifier = store.section(&["example.com", "www"]).notifier();
///
///     let mut events = notifier.start().await?;
///     while let Some(event) = events.recv().await {
///         println!("{} {}", event.kind, event.record.name());
///     }
///
///     notifier.stop()?;
///     Ok(())
/// }
/// ```
pub struct ChangeNotifier {
    section: Section,
    state: NotifierState,
    running: Option<Running>,
}

/// Resources held while watching
struct Running {
    // Dropping the watcher closes the underlying watch.
    _watcher: RecommendedWatcher,
    stop_tx: oneshot::Sender<()>,
}

impl ChangeNotifier {
    pub(crate) fn new(section: Section) -> Self {
        Self {
            section,
            state: NotifierState::Idle,
            running: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> NotifierState {
        self.state
    }

    /// Section being watched
    pub fn section(&self) -> &Section {
        &self.section
    }

    /// Start watching the section
    ///
    /// Creates the section directory if needed, opens the watch and spawns
    /// the delivery task. Must be called within a tokio runtime.
    ///
    /// # Returns
    ///
    /// - `Ok(Receiver)`: Stream of record events for this section
    /// - `Err(Error::Misuse)`: Notifier already started or stopped
    /// - `Err(Error)`: Directory or watch could not be set up
    pub async fn start(&mut self) -> Result<mpsc::Receiver<RecordEvent>> {
        match self.state {
            NotifierState::Idle => {}
            NotifierState::Watching => {
                return Err(Error::misuse("change notifier already started"));
            }
            NotifierState::Stopped => {
                return Err(Error::misuse("change notifier cannot be restarted after stop"));
            }
        }

        let store = self.section.store();
        let location = store.ensure_section(self.section.path()).await?;
        let capacity = store.notify_capacity();

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>(capacity);
        let mut watcher = RecommendedWatcher::new(
            move |result| {
                // Runs on the watcher's own thread, never inside the runtime.
                if raw_tx.blocking_send(result).is_err() {
                    trace!("Delivery task gone, dropping filesystem event");
                }
            },
            Config::default(),
        )?;
        watcher.watch(&location, RecursiveMode::NonRecursive)?;

        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(deliver(
            self.section.clone(),
            location.clone(),
            raw_rx,
            event_tx,
            stop_rx,
        ));

        self.running = Some(Running {
            _watcher: watcher,
            stop_tx,
        });
        self.state = NotifierState::Watching;

        info!("Watching {}", location.display());
        Ok(event_rx)
    }

    /// Stop watching
    ///
    /// Closes the watch and signals the delivery task. Events already
    /// translated may or may not reach the receiver.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            NotifierState::Watching => {}
            NotifierState::Idle => {
                return Err(Error::misuse("change notifier was never started"));
            }
            NotifierState::Stopped => {
                return Err(Error::misuse("change notifier already stopped"));
            }
        }

        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
        }
        self.state = NotifierState::Stopped;

        info!("Stopped watching section {:?}", self.section.path());
        Ok(())
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("section", &self.section.path())
            .field("state", &self.state)
            .finish()
    }
}

/// Delivery loop: translate raw events and forward them until stopped
async fn deliver(
    section: Section,
    location: PathBuf,
    mut raw_rx: mpsc::Receiver<notify::Result<Event>>,
    event_tx: mpsc::Sender<RecordEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        let raw = tokio::select! {
            _ = &mut stop_rx => break,
            raw = raw_rx.recv() => raw,
        };

        let event = match raw {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                warn!("Watch error on {}: {}", location.display(), e);
                continue;
            }
            None => break,
        };

        for record_event in translate(&section, &location, &event).await {
            tokio::select! {
                _ = &mut stop_rx => {
                    debug!("Delivery for {} stopped", location.display());
                    return;
                }
                sent = event_tx.send(record_event) => {
                    if sent.is_err() {
                        debug!("Event receiver for {} dropped", location.display());
                        return;
                    }
                }
            }
        }
    }

    debug!("Delivery for {} stopped", location.display());
}

/// Record events for one raw filesystem event
async fn translate(section: &Section, location: &Path, event: &Event) -> Vec<RecordEvent> {
    let Some(kind) = change_kind(&event.kind) else {
        trace!("Ignoring {:?} on {:?}", event.kind, event.paths);
        return Vec::new();
    };

    let mut events = Vec::with_capacity(event.paths.len());
    for path in &event.paths {
        if let Some(record) = record_for_path(section, location, path).await {
            events.push(RecordEvent::new(record, kind));
        }
    }
    events
}

/// Map a raw event kind to a record change
///
/// Metadata and access events carry no content change and map to `None`.
/// A rename is reported as the removal of its source and the creation of its
/// target; the combined rename event is dropped since both halves arrive on
/// their own.
pub(crate) fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Update),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Update),
    }
}

/// Record for a path inside the watched directory
///
/// Existing directories are subsections. Otherwise the item suffix decides;
/// a vanished entry without the suffix was a subsection.
async fn record_for_path(section: &Section, location: &Path, path: &Path) -> Option<Record> {
    if path == location {
        return None;
    }
    let raw = path.file_name()?.to_string_lossy().into_owned();
    if codec::is_staging(&raw) {
        return None;
    }

    let (name, subsection) = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => (codec::decode(&raw), true),
        Ok(_) => (codec::item_id(&raw)?, false),
        Err(_) => match codec::item_id(&raw) {
            Some(name) => (name, false),
            None => (codec::decode(&raw), true),
        },
    };

    Some(Record::new(
        section.store().clone(),
        section.path().to_vec(),
        name,
        subsection,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::tempdir;

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(
            change_kind(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Create)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Update)
        );
        assert_eq!(
            change_kind(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Remove)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            None
        );
        assert_eq!(
            change_kind(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            None
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(ChangeKind::Create)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(ChangeKind::Remove)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            None
        );
        assert_eq!(change_kind(&EventKind::Any), Some(ChangeKind::Update));
    }

    #[tokio::test]
    async fn test_record_for_path() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let section = store.section(&["example.com"]);
        let location = section.location().unwrap();
        std::fs::create_dir_all(location.join("sub")).unwrap();
        std::fs::write(location.join("www.json"), b"{}").unwrap();

        let item = record_for_path(&section, &location, &location.join("www.json"))
            .await
            .unwrap();
        assert_eq!(item.name(), "www");
        assert!(!item.is_subsection());
        assert_eq!(item.section(), ["example.com"]);

        let sub = record_for_path(&section, &location, &location.join("sub"))
            .await
            .unwrap();
        assert_eq!(sub.name(), "sub");
        assert!(sub.is_subsection());

        let gone_item = record_for_path(&section, &location, &location.join("old.json"))
            .await
            .unwrap();
        assert!(!gone_item.is_subsection());

        let gone_dir = record_for_path(&section, &location, &location.join("old"))
            .await
            .unwrap();
        assert!(gone_dir.is_subsection());

        assert!(
            record_for_path(&section, &location, &location.join("!www.json.1-0"))
                .await
                .is_none()
        );
        assert!(record_for_path(&section, &location, &location).await.is_none());
    }

    #[tokio::test]
    async fn test_misuse_is_rejected() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let mut notifier = store.section(&["example.com"]).notifier();

        assert!(matches!(notifier.stop(), Err(Error::Misuse(_))));

        let _events = notifier.start().await.unwrap();
        assert_eq!(notifier.state(), NotifierState::Watching);
        assert!(matches!(notifier.start().await, Err(Error::Misuse(_))));

        notifier.stop().unwrap();
        assert_eq!(notifier.state(), NotifierState::Stopped);
        assert!(matches!(notifier.stop(), Err(Error::Misuse(_))));
        assert!(matches!(notifier.start().await, Err(Error::Misuse(_))));
    }
}
