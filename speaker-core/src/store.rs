use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::note::{self, Note};
use crate::paths;

/// Change notifications emitted by [`NoteStore`] after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    Loaded { count: usize },
    Created { id: Uuid },
    Updated { id: Uuid },
    Deleted { id: Uuid },
}

/// Token returned by [`NoteStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A file in the notes directory that could not be turned into a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`NoteStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

/// One-file-per-note JSON storage with an in-memory collection kept sorted
/// by creation time.
///
/// The in-memory collection only changes after the matching disk operation
/// succeeded, so it always mirrors the notes directory as this process last
/// saw it.
pub struct NoteStore {
    dir: PathBuf,
    notes: Vec<Note>,
    /// Notes loaded from a file whose name is not the canonical `<ID>.json`.
    stray_paths: HashMap<Uuid, PathBuf>,
    /// Files skipped on load because another file already held their id.
    duplicate_paths: HashMap<Uuid, Vec<PathBuf>>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for NoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteStore")
            .field("dir", &self.dir)
            .field("notes", &self.notes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl NoteStore {
    /// Create a store over `dir`. Nothing is read until [`NoteStore::load`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        NoteStore {
            dir: dir.into(),
            notes: Vec::new(),
            stray_paths: HashMap::new(),
            duplicate_paths: HashMap::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Store over the platform default notes directory.
    pub fn with_default_dir() -> Result<Self, StoreError> {
        let dir = paths::default_notes_dir().ok_or(StoreError::NoDocumentsDir)?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Notes in ascending creation order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: Uuid) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Register a callback invoked after every successful mutation.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&StoreEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Read every note file in the directory, replacing the in-memory
    /// collection.
    ///
    /// The directory is created if missing. Files that cannot be read or
    /// parsed are skipped and listed in the report; hidden entries and
    /// sub-directories are ignored.
    pub fn load(&mut self) -> Result<LoadReport, StoreError> {
        self.ensure_dir()?;

        let read_dir = fs::read_dir(&self.dir).map_err(|source| {
            let err = StoreError::ReadDir {
                path: self.dir.clone(),
                source,
            };
            log::error!("{}", err);
            err
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => log::warn!("Failed to read entry in {:?}: {}", self.dir, e),
            }
        }
        // Directory order is platform dependent; sort so duplicate resolution
        // is deterministic.
        paths.sort();

        let mut report = LoadReport::default();
        let mut notes = Vec::new();
        let mut seen = HashSet::new();
        let mut stray_paths = HashMap::new();
        let mut duplicate_paths: HashMap<Uuid, Vec<PathBuf>> = HashMap::new();

        for path in paths {
            if is_hidden(&path) || path.is_dir() {
                continue;
            }
            let note = match read_note(&path) {
                Ok(note) => note,
                Err(reason) => {
                    log::warn!("Skipping note file {:?}: {}", path, reason);
                    report.skipped.push(SkippedFile { path, reason });
                    continue;
                }
            };
            if !seen.insert(note.id) {
                log::warn!("Skipping {:?}: duplicate note id {}", path, note.id);
                report.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: format!("duplicate note id {}", note.id),
                });
                duplicate_paths.entry(note.id).or_default().push(path);
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) != Some(note.file_name().as_str()) {
                stray_paths.insert(note.id, path);
            }
            notes.push(note);
        }

        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        report.loaded = notes.len();
        log::info!(
            "Loaded {} notes from {:?} ({} skipped)",
            report.loaded,
            self.dir,
            report.skipped.len()
        );

        self.notes = notes;
        self.stray_paths = stray_paths;
        self.duplicate_paths = duplicate_paths;
        self.emit(&StoreEvent::Loaded {
            count: report.loaded,
        });
        Ok(report)
    }

    /// Create, persist and return a new untitled note.
    pub fn create(&mut self) -> Result<Note, StoreError> {
        let mut note = Note::new();
        while self.contains(note.id) {
            note.id = Uuid::new_v4();
        }
        self.write_file(&note)?;
        self.insert_sorted(note.clone());
        log::debug!("Created note {}", note.id);
        self.emit(&StoreEvent::Created { id: note.id });
        Ok(note)
    }

    /// Write `note` to its file and replace the in-memory entry with the
    /// same id (inserting it if the store did not know it yet).
    pub fn save(&mut self, note: &Note) -> Result<(), StoreError> {
        self.write_file(note)?;
        let existed = match self.position(note.id) {
            Some(index) if self.notes[index].created_at == note.created_at => {
                self.notes[index] = note.clone();
                true
            }
            Some(index) => {
                self.notes.remove(index);
                self.insert_sorted(note.clone());
                true
            }
            None => {
                self.insert_sorted(note.clone());
                false
            }
        };
        let event = if existed {
            StoreEvent::Updated { id: note.id }
        } else {
            StoreEvent::Created { id: note.id }
        };
        self.emit(&event);
        Ok(())
    }

    pub fn set_title(&mut self, id: Uuid, title: &str) -> Result<(), StoreError> {
        self.edit(id, |note| note.title = title.to_string())
    }

    pub fn set_body(&mut self, id: Uuid, body: &str) -> Result<(), StoreError> {
        self.edit(id, |note| note.body = body.to_string())
    }

    /// Remove a note's file and drop it from memory.
    ///
    /// A note that is already gone is not an error.
    pub fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        let mut removed = self.remove_file(&self.path_for(id))?;
        if let Some(stray) = self.stray_paths.get(&id).cloned() {
            removed |= self.remove_file(&stray)?;
            self.stray_paths.remove(&id);
        }
        if let Some(duplicates) = self.duplicate_paths.get(&id).cloned() {
            for duplicate in &duplicates {
                removed |= self.remove_file(duplicate)?;
            }
            self.duplicate_paths.remove(&id);
        }

        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if removed || self.notes.len() != before {
            log::debug!("Deleted note {}", id);
            self.emit(&StoreEvent::Deleted { id });
        }
        Ok(())
    }

    fn edit(&mut self, id: Uuid, apply: impl FnOnce(&mut Note)) -> Result<(), StoreError> {
        let index = self.position(id).ok_or(StoreError::NotFound(id))?;
        let mut updated = self.notes[index].clone();
        apply(&mut updated);
        updated.id = id;
        updated.created_at = self.notes[index].created_at;
        if updated == self.notes[index] {
            return Ok(());
        }
        self.write_file(&updated)?;
        self.notes[index] = updated;
        self.emit(&StoreEvent::Updated { id });
        Ok(())
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    /// Insert after every note created at or before `note`, which appends
    /// whenever `note` is the newest.
    fn insert_sorted(&mut self, note: Note) {
        let index = self
            .notes
            .partition_point(|n| n.created_at <= note.created_at);
        self.notes.insert(index, note);
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(note::file_name_for(id))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| {
            let err = StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            };
            log::error!("{}", err);
            err
        })
    }

    /// Serialize to a hidden temp file and rename it over the note file.
    fn write_file(&mut self, note: &Note) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let mut data = serde_json::to_vec_pretty(note).map_err(|source| {
            let err = StoreError::Serialize {
                id: note.id,
                source,
            };
            log::error!("{}", err);
            err
        })?;
        data.push(b'\n');

        let path = self.path_for(note.id);
        let tmp = self.dir.join(format!(".{}.tmp", note.file_name()));
        let result = fs::write(&tmp, &data).and_then(|()| fs::rename(&tmp, &path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            let err = StoreError::Write { path, source };
            log::error!("{}", err);
            return Err(err);
        }

        // The note now lives under its canonical name only. On
        // case-insensitive file systems an old name may refer to the file
        // just written.
        let old_paths = self
            .stray_paths
            .remove(&note.id)
            .into_iter()
            .chain(self.duplicate_paths.remove(&note.id).unwrap_or_default());
        for old in old_paths {
            if is_same_file(&old, &path) {
                continue;
            }
            if let Err(e) = fs::remove_file(&old) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove old note file {:?}: {}", old, e);
                }
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => {
                let err = StoreError::Remove {
                    path: path.to_path_buf(),
                    source,
                };
                log::error!("{}", err);
                Err(err)
            }
        }
    }

    fn emit(&mut self, event: &StoreEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
}

fn read_note(path: &Path) -> Result<Note, String> {
    let data = fs::read(path).map_err(|e| format!("read failed: {}", e))?;
    serde_json::from_slice(&data).map_err(|e| format!("invalid note JSON: {}", e))
}
