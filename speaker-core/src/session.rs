use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::paths;

pub const DEFAULT_TELEPROMPTER_OPACITY: f64 = crate::surface::DEFAULT_OPACITY;

/// Presentation state remembered between launches, persisted to
/// `<config>/speaker-note/session.json`.
///
/// `#[serde(default)]` fills in anything missing from an older file, so new
/// fields can be added without breaking existing sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    #[serde(rename = "selectedNoteID")]
    pub selected_note_id: Option<Uuid>,
    #[serde(rename = "openTabIDs")]
    pub open_tab_ids: Vec<Uuid>,
    #[serde(rename = "teleprompterOpacity")]
    pub teleprompter_opacity: f64,
    #[serde(rename = "teleprompterDarkMode")]
    pub teleprompter_dark_mode: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            selected_note_id: None,
            open_tab_ids: Vec::new(),
            teleprompter_opacity: DEFAULT_TELEPROMPTER_OPACITY,
            teleprompter_dark_mode: true,
        }
    }
}

impl Session {
    /// Read a session file. A missing or unreadable file yields the defaults.
    pub fn load_from(path: &Path) -> Session {
        let mut session = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable session file {:?}: {}", path, e);
                Session::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Session::default(),
            Err(e) => {
                log::warn!("Failed to read session file {:?}: {}", path, e);
                Session::default()
            }
        };
        let stored = session.teleprompter_opacity;
        session.teleprompter_opacity = DEFAULT_TELEPROMPTER_OPACITY;
        session.set_teleprompter_opacity(stored);
        session
    }

    /// Read the session from its default location.
    pub fn load() -> Session {
        match paths::default_session_path() {
            Some(path) => Self::load_from(&path),
            None => Session::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SessionError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SessionError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), SessionError> {
        let path = paths::default_session_path().ok_or(SessionError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn select(&mut self, id: Option<Uuid>) {
        self.selected_note_id = id;
    }

    /// Add a tab for `id` unless one is already open.
    pub fn open_tab(&mut self, id: Uuid) {
        if !self.open_tab_ids.contains(&id) {
            self.open_tab_ids.push(id);
        }
    }

    pub fn close_tab(&mut self, id: Uuid) {
        self.open_tab_ids.retain(|tab| *tab != id);
    }

    /// Drop every reference to a deleted note.
    pub fn forget(&mut self, id: Uuid) {
        self.close_tab(id);
        if self.selected_note_id == Some(id) {
            self.selected_note_id = None;
        }
    }

    /// Drop references to notes for which `exists` returns false. Returns
    /// true when anything changed.
    pub fn retain_existing(&mut self, exists: impl Fn(Uuid) -> bool) -> bool {
        let before = self.clone();
        self.open_tab_ids.retain(|id| exists(*id));
        if let Some(id) = self.selected_note_id {
            if !exists(id) {
                self.selected_note_id = None;
            }
        }
        *self != before
    }

    pub fn set_teleprompter_opacity(&mut self, opacity: f64) {
        if opacity.is_finite() {
            self.teleprompter_opacity = opacity.clamp(0.0, 1.0);
        }
    }
}
