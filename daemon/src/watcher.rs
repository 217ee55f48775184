use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use sshsync::FileEvent;

/// How long one half of a rename waits for its partner
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(100);

/// Recursive watch on the local root that feeds the event queue.
///
/// Watching stops when this is dropped.
pub struct TreeWatcher {
    _watcher: RecommendedWatcher,
}

impl TreeWatcher {
    pub fn start(root: &Path, events: mpsc::Sender<FileEvent>) -> Result<Self> {
        let (raw_tx, raw_rx) = std_mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // the receiver only goes away once the forwarder has given up
            let _ = raw_tx.send(res);
        })
        .context("creating the file watcher")?;

        // A single forwarding thread keeps arrival order, pairs rename
        // halves, and blocks on a full queue instead of dropping events.
        // It exits once the watcher (and with it the sender) is dropped.
        thread::Builder::new()
            .name("sshsync-watcher".to_string())
            .spawn(move || forward_events(raw_rx, events))
            .context("starting the watcher thread")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", root.display()))?;

        info!("Watching {}", root.display());
        Ok(Self { _watcher: watcher })
    }
}

fn forward_events(raw: std_mpsc::Receiver<notify::Result<Event>>, events: mpsc::Sender<FileEvent>) {
    let mut converter = EventConverter::default();
    loop {
        let received = if converter.is_holding() {
            raw.recv_timeout(RENAME_PAIR_WINDOW)
        } else {
            raw.recv().map_err(|_| std_mpsc::RecvTimeoutError::Disconnected)
        };

        let (converted, done) = match received {
            Ok(Ok(event)) => (converter.convert(&event), false),
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                continue;
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => (converter.flush(), false),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => (converter.flush(), true),
        };

        for file_event in converted {
            trace!(?file_event, "Queueing file event");
            if events.blocking_send(file_event).is_err() {
                debug!("Event queue closed, dropping file event");
                return;
            }
        }
        if done {
            return;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RenameHalf {
    From,
    To,
}

#[derive(Debug)]
struct PendingRename {
    tracker: usize,
    from: Option<PathBuf>,
    to: Option<PathBuf>,
}

/// Stateful conversion that folds the separate halves of a rename into a
/// single event.
///
/// inotify reports a rename as `From`, `To` and then `Both`, all sharing one
/// tracker. Tracked halves are held until their partner arrives; `Both`
/// consumes them and produces one move. A half that is never paired is
/// released by [`EventConverter::flush`]: a lone `From` (moved out of the
/// tree) becomes a deletion and a lone `To` a creation.
#[derive(Debug, Default)]
pub struct EventConverter {
    pending: Option<PendingRename>,
}

impl EventConverter {
    /// Whether a rename half is waiting for its partner
    pub fn is_holding(&self) -> bool {
        self.pending.is_some()
    }

    pub fn convert(&mut self, event: &Event) -> Vec<FileEvent> {
        if let (EventKind::Modify(ModifyKind::Name(mode)), Some(tracker)) =
            (&event.kind, event.attrs.tracker())
        {
            match (mode, event.paths.as_slice()) {
                (RenameMode::From, [path]) => return self.hold(RenameHalf::From, tracker, path),
                (RenameMode::To, [path]) => return self.hold(RenameHalf::To, tracker, path),
                (RenameMode::Both, _) => {
                    if matches!(&self.pending, Some(pending) if pending.tracker == tracker) {
                        self.pending = None;
                    }
                }
                _ => {}
            }
        }

        let mut converted = self.flush();
        converted.extend(convert_event(event));
        converted
    }

    /// Release a held rename half as a standalone event
    pub fn flush(&mut self) -> Vec<FileEvent> {
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };
        match (pending.from, pending.to) {
            (Some(from), Some(to)) => vec![mark_dir(FileEvent::moved(from, &to), &to)],
            (Some(from), None) => vec![FileEvent::deleted(from)],
            (None, Some(to)) => vec![mark_dir(FileEvent::created(&to), &to)],
            (None, None) => Vec::new(),
        }
    }

    fn hold(&mut self, half: RenameHalf, tracker: usize, path: &Path) -> Vec<FileEvent> {
        if let Some(pending) = self.pending.as_mut() {
            if pending.tracker == tracker {
                let slot = match half {
                    RenameHalf::From => &mut pending.from,
                    RenameHalf::To => &mut pending.to,
                };
                if slot.is_none() {
                    *slot = Some(path.to_path_buf());
                    return Vec::new();
                }
            }
        }

        let released = self.flush();
        let path = Some(path.to_path_buf());
        self.pending = Some(match half {
            RenameHalf::From => PendingRename { tracker, from: path, to: None },
            RenameHalf::To => PendingRename { tracker, from: None, to: path },
        });
        released
    }
}

/// Translate one notify event into the engine's file events
pub fn convert_event(event: &Event) -> Vec<FileEvent> {
    match &event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|path| {
                let file_event = FileEvent::created(path);
                match kind {
                    CreateKind::Folder => file_event.directory(),
                    CreateKind::File => file_event,
                    _ if path.is_dir() => file_event.directory(),
                    _ => file_event,
                }
            })
            .collect(),

        EventKind::Remove(kind) => event
            .paths
            .iter()
            .map(|path| {
                let file_event = FileEvent::deleted(path);
                match kind {
                    RemoveKind::Folder => file_event.directory(),
                    _ => file_event,
                }
            })
            .collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => convert_rename(*mode, event),

        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|path| mark_dir(FileEvent::modified(path), path))
            .collect(),

        // Access, Any and Other carry nothing to sync
        _ => Vec::new(),
    }
}

fn convert_rename(mode: RenameMode, event: &Event) -> Vec<FileEvent> {
    match (mode, event.paths.as_slice()) {
        (RenameMode::Both, [from, to, ..]) => vec![mark_dir(FileEvent::moved(from, to), to)],
        (RenameMode::From, paths) => paths.iter().map(|path| FileEvent::deleted(path)).collect(),
        (RenameMode::To, paths) => paths
            .iter()
            .map(|path| mark_dir(FileEvent::created(path), path))
            .collect(),
        // Backends that cannot pair the two halves of a rename report each
        // side on its own; whether the path still exists tells them apart
        (_, paths) => paths
            .iter()
            .map(|path| {
                if path.exists() {
                    mark_dir(FileEvent::created(path), path)
                } else {
                    FileEvent::deleted(path)
                }
            })
            .collect(),
    }
}

fn mark_dir(event: FileEvent, path: &Path) -> FileEvent {
    if path.is_dir() {
        event.directory()
    } else {
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};
    use std::fs;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.to_path_buf()))
    }

    #[test]
    fn test_create_file_and_folder() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.py");
        let sub = dir.path().join("src");

        assert_eq!(
            convert_event(&event(EventKind::Create(CreateKind::File), &[&file])),
            vec![FileEvent::created(&file)]
        );
        assert_eq!(
            convert_event(&event(EventKind::Create(CreateKind::Folder), &[&sub])),
            vec![FileEvent::created(&sub).directory()]
        );
    }

    #[test]
    fn test_create_any_checks_filesystem() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("src");
        fs::create_dir(&sub).unwrap();

        assert_eq!(
            convert_event(&event(EventKind::Create(CreateKind::Any), &[&sub])),
            vec![FileEvent::created(&sub).directory()]
        );
    }

    #[test]
    fn test_modify_and_remove() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.py");
        fs::write(&file, b"x").unwrap();

        assert_eq!(
            convert_event(&event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &[&file])),
            vec![FileEvent::modified(&file)]
        );
        assert_eq!(
            convert_event(&event(EventKind::Remove(RemoveKind::File), &[&file])),
            vec![FileEvent::deleted(&file)]
        );
        assert_eq!(
            convert_event(&event(EventKind::Remove(RemoveKind::Folder), &[dir.path()])),
            vec![FileEvent::deleted(dir.path()).directory()]
        );
    }

    #[test]
    fn test_rename_both_is_a_move() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.py");
        let to = dir.path().join("b.py");
        fs::write(&to, b"x").unwrap();

        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert_eq!(
            convert_event(&event(kind, &[&from, &to])),
            vec![FileEvent::moved(&from, &to)]
        );
    }

    #[test]
    fn test_rename_halves() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("old.py");
        let arrived = dir.path().join("new.py");
        fs::write(&arrived, b"x").unwrap();

        let from = EventKind::Modify(ModifyKind::Name(RenameMode::From));
        let to = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert_eq!(convert_event(&event(from, &[&gone])), vec![FileEvent::deleted(&gone)]);
        assert_eq!(convert_event(&event(to, &[&arrived])), vec![FileEvent::created(&arrived)]);
    }

    #[test]
    fn test_unpaired_rename_uses_existence() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("here.py");
        let missing: PathBuf = dir.path().join("gone.py");
        fs::write(&present, b"x").unwrap();

        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Any));
        assert_eq!(
            convert_event(&event(kind, &[&present, &missing])),
            vec![FileEvent::created(&present), FileEvent::deleted(&missing)]
        );
    }

    #[test]
    fn test_access_and_other_ignored() {
        let path = Path::new("/proj/main.py");

        assert!(convert_event(&event(EventKind::Access(AccessKind::Any), &[path])).is_empty());
        assert!(convert_event(&event(EventKind::Other, &[path])).is_empty());
        assert!(convert_event(&event(EventKind::Any, &[path])).is_empty());
    }

    fn rename(mode: RenameMode, tracker: usize, paths: &[&Path]) -> Event {
        event(EventKind::Modify(ModifyKind::Name(mode)), paths).set_tracker(tracker)
    }

    #[test]
    fn test_tracked_rename_sequence_is_one_move() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.py");
        let to = dir.path().join("b.py");
        fs::write(&to, b"x").unwrap();

        let mut converter = EventConverter::default();
        assert!(converter.convert(&rename(RenameMode::From, 7, &[&from])).is_empty());
        assert!(converter.convert(&rename(RenameMode::To, 7, &[&to])).is_empty());
        assert_eq!(
            converter.convert(&rename(RenameMode::Both, 7, &[&from, &to])),
            vec![FileEvent::moved(&from, &to)]
        );
        assert!(!converter.is_holding());
        assert!(converter.flush().is_empty());
    }

    #[test]
    fn test_to_before_from_still_pairs() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.py");
        let to = dir.path().join("b.py");

        let mut converter = EventConverter::default();
        assert!(converter.convert(&rename(RenameMode::To, 3, &[&to])).is_empty());
        assert!(converter.convert(&rename(RenameMode::From, 3, &[&from])).is_empty());
        assert_eq!(
            converter.convert(&rename(RenameMode::Both, 3, &[&from, &to])),
            vec![FileEvent::moved(&from, &to)]
        );
    }

    #[test]
    fn test_lone_from_becomes_deletion() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("old.py");
        let other = dir.path().join("main.py");

        let mut converter = EventConverter::default();
        assert!(converter.convert(&rename(RenameMode::From, 1, &[&gone])).is_empty());
        assert!(converter.is_holding());
        assert_eq!(
            converter.convert(&event(EventKind::Create(CreateKind::File), &[&other])),
            vec![FileEvent::deleted(&gone), FileEvent::created(&other)]
        );

        assert!(converter.convert(&rename(RenameMode::From, 2, &[&gone])).is_empty());
        assert_eq!(converter.flush(), vec![FileEvent::deleted(&gone)]);
    }

    #[test]
    fn test_unrelated_tracker_releases_held_half() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.py");
        let second = dir.path().join("two.py");

        let mut converter = EventConverter::default();
        assert!(converter.convert(&rename(RenameMode::From, 1, &[&first])).is_empty());
        assert_eq!(
            converter.convert(&rename(RenameMode::From, 2, &[&second])),
            vec![FileEvent::deleted(&first)]
        );
        assert_eq!(converter.flush(), vec![FileEvent::deleted(&second)]);
    }

    #[test]
    fn test_lone_to_becomes_creation() {
        let dir = TempDir::new().unwrap();
        let arrived = dir.path().join("new.py");
        fs::write(&arrived, b"x").unwrap();

        let mut converter = EventConverter::default();
        assert!(converter.convert(&rename(RenameMode::To, 9, &[&arrived])).is_empty());
        assert_eq!(converter.flush(), vec![FileEvent::created(&arrived)]);
    }

    #[test]
    fn test_untracked_halves_pass_through() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("old.py");

        let mut converter = EventConverter::default();
        let from = EventKind::Modify(ModifyKind::Name(RenameMode::From));
        assert_eq!(converter.convert(&event(from, &[&gone])), vec![FileEvent::deleted(&gone)]);
        assert!(!converter.is_holding());
    }

    /// Drain the queue until it stays quiet for a second
    async fn drain(rx: &mut mpsc::Receiver<FileEvent>) -> Vec<FileEvent> {
        let mut received = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            received.push(event);
        }
        received
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_real_rename_reports_source_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let cache = root.join("__pycache__");
        fs::create_dir(&cache).unwrap();
        let src = root.join("a.py");
        fs::write(&src, b"print(1)\n").unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let _watcher = TreeWatcher::start(&root, tx).unwrap();

        let dst = cache.join("a.py");
        fs::rename(&src, &dst).unwrap();

        let received = drain(&mut rx).await;
        let source_removals = received
            .iter()
            .filter(|event| match &event.kind {
                sshsync::FileEventKind::Deleted(path) => path == &src,
                sshsync::FileEventKind::Moved { from, .. } => from == &src,
                _ => false,
            })
            .count();

        assert_eq!(source_removals, 1, "events: {:?}", received);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_delivers_created_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let _watcher = TreeWatcher::start(&root, tx).unwrap();

        let file = root.join("main.py");
        fs::write(&file, b"print(1)\n").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if matches!(&event.kind, sshsync::FileEventKind::Created(p) | sshsync::FileEventKind::Modified(p) if p == &file) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        assert!(received);
    }
}
