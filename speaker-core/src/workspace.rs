use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{StoreError, SurfaceError};
use crate::note::Note;
use crate::session::Session;
use crate::store::{LoadReport, NoteStore};
use crate::surface::{SurfaceHost, SurfaceId};
use crate::teleprompter::Teleprompter;

/// The notes, the session and the teleprompter, driven by UI actions.
///
/// Session changes are written immediately when a session path is set;
/// failures there are logged since the session is presentation state only.
#[derive(Debug)]
pub struct Workspace<H: SurfaceHost> {
    store: NoteStore,
    session: Session,
    session_path: Option<PathBuf>,
    teleprompter: Teleprompter<H>,
}

impl<H: SurfaceHost> Workspace<H> {
    /// Load notes and session, dropping session references to notes that no
    /// longer exist.
    pub fn open(
        mut store: NoteStore,
        session_path: Option<PathBuf>,
        host: H,
    ) -> Result<(Self, LoadReport), StoreError> {
        let report = store.load()?;
        let session = match &session_path {
            Some(path) => Session::load_from(path),
            None => Session::default(),
        };
        let mut workspace = Workspace {
            store,
            session,
            session_path,
            teleprompter: Teleprompter::new(host),
        };
        let store = &workspace.store;
        if workspace.session.retain_existing(|id| store.contains(id)) {
            workspace.persist_session();
        }
        Ok((workspace, report))
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NoteStore {
        &mut self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn teleprompter(&self) -> &Teleprompter<H> {
        &self.teleprompter
    }

    pub fn teleprompter_mut(&mut self) -> &mut Teleprompter<H> {
        &mut self.teleprompter
    }

    /// Re-read the notes directory.
    pub fn reload(&mut self) -> Result<LoadReport, StoreError> {
        let report = self.store.load()?;
        let store = &self.store;
        if self.session.retain_existing(|id| store.contains(id)) {
            self.persist_session();
        }
        Ok(report)
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.session
            .selected_note_id
            .and_then(|id| self.store.get(id))
    }

    /// Notes with an open tab, in tab order.
    pub fn open_tabs(&self) -> Vec<&Note> {
        self.session
            .open_tab_ids
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect()
    }

    /// Create a note, select it and open a tab for it.
    pub fn new_note(&mut self) -> Result<Note, StoreError> {
        let note = self.store.create()?;
        self.session.select(Some(note.id));
        self.session.open_tab(note.id);
        self.persist_session();
        Ok(note)
    }

    /// Select a note. Returns false (and changes nothing) for unknown ids.
    pub fn select(&mut self, id: Option<Uuid>) -> bool {
        if let Some(id) = id {
            if !self.store.contains(id) {
                log::warn!("Ignoring selection of unknown note {}", id);
                return false;
            }
        }
        if self.session.selected_note_id != id {
            self.session.select(id);
            self.persist_session();
        }
        true
    }

    pub fn close_tab(&mut self, id: Uuid) {
        self.session.close_tab(id);
        self.persist_session();
    }

    pub fn set_title(&mut self, id: Uuid, title: &str) -> Result<(), StoreError> {
        self.store.set_title(id, title)
    }

    pub fn set_body(&mut self, id: Uuid, body: &str) -> Result<(), StoreError> {
        self.store.set_body(id, body)
    }

    /// Delete a note and drop every session reference to it.
    pub fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.store.delete(id)?;
        self.session.forget(id);
        self.persist_session();
        Ok(())
    }

    /// Show the selected note's body on the teleprompter using the session's
    /// opacity and theme. Returns `Ok(None)` when no note is selected.
    pub fn open_teleprompter(&mut self) -> Result<Option<SurfaceId>, SurfaceError> {
        let Some(note) = self.selected_note() else {
            return Ok(None);
        };
        let text = note.body.clone();
        let opacity = self.session.teleprompter_opacity;
        let dark = self.session.teleprompter_dark_mode;
        self.teleprompter.show(&text, opacity, dark).map(Some)
    }

    pub fn close_teleprompter(&mut self) -> bool {
        self.teleprompter.close()
    }

    /// Update teleprompter preferences, refreshing the surface if it is open.
    pub fn set_teleprompter_style(
        &mut self,
        opacity: f64,
        dark_mode: bool,
    ) -> Result<(), SurfaceError> {
        self.session.set_teleprompter_opacity(opacity);
        self.session.teleprompter_dark_mode = dark_mode;
        self.persist_session();

        if let Some(current) = self.teleprompter.current() {
            let text = current.text.clone();
            self.teleprompter.show(
                &text,
                self.session.teleprompter_opacity,
                self.session.teleprompter_dark_mode,
            )?;
        }
        Ok(())
    }

    pub fn set_teleprompter_opacity(&mut self, opacity: f64) -> Result<(), SurfaceError> {
        let dark = self.session.teleprompter_dark_mode;
        self.set_teleprompter_style(opacity, dark)
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) -> Result<(), SurfaceError> {
        let opacity = self.session.teleprompter_opacity;
        self.set_teleprompter_style(opacity, dark_mode)
    }

    fn persist_session(&self) {
        if let Some(path) = &self.session_path {
            if let Err(e) = self.session.save_to(path) {
                log::warn!("Failed to save session: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessHost;
    use std::path::Path;

    fn open_workspace(root: &Path) -> Workspace<HeadlessHost> {
        let store = NoteStore::new(root.join("Notes"));
        let (workspace, _) =
            Workspace::open(store, Some(root.join("session.json")), HeadlessHost::new()).unwrap();
        workspace
    }

    #[test]
    fn new_note_is_selected_and_opened() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        let note = ws.new_note().unwrap();
        assert_eq!(ws.selected_note().map(|n| n.id), Some(note.id));
        assert_eq!(ws.session().open_tab_ids, vec![note.id]);

        let reopened = open_workspace(tmp.path());
        assert_eq!(reopened.session().selected_note_id, Some(note.id));
        assert_eq!(reopened.open_tabs().len(), 1);
    }

    #[test]
    fn delete_drops_tab_and_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        let keep = ws.new_note().unwrap();
        let gone = ws.new_note().unwrap();
        ws.delete(gone.id).unwrap();

        assert_eq!(ws.session().open_tab_ids, vec![keep.id]);
        assert_eq!(ws.session().selected_note_id, None);
        assert!(!ws.store().contains(gone.id));
        ws.delete(gone.id).unwrap();
    }

    #[test]
    fn stale_session_ids_are_pruned_on_open() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::default();
        let missing = Uuid::new_v4();
        session.open_tab(missing);
        session.select(Some(missing));
        session.save_to(&tmp.path().join("session.json")).unwrap();

        let ws = open_workspace(tmp.path());
        assert!(ws.session().open_tab_ids.is_empty());
        assert_eq!(ws.session().selected_note_id, None);
        let on_disk = Session::load_from(&tmp.path().join("session.json"));
        assert!(on_disk.open_tab_ids.is_empty());
    }

    #[test]
    fn selecting_unknown_note_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        let note = ws.new_note().unwrap();
        assert!(!ws.select(Some(Uuid::new_v4())));
        assert_eq!(ws.session().selected_note_id, Some(note.id));
        assert!(ws.select(None));
        assert!(ws.selected_note().is_none());
    }

    #[test]
    fn teleprompter_shows_selected_body() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        assert_eq!(ws.open_teleprompter().unwrap(), None);

        let note = ws.new_note().unwrap();
        ws.set_body(note.id, "Slide one").unwrap();
        let first = ws.open_teleprompter().unwrap().unwrap();

        ws.set_body(note.id, "Slide two").unwrap();
        let second = ws.open_teleprompter().unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(ws.teleprompter().host().open_count(), 1);
        assert_eq!(ws.teleprompter().current().unwrap().text, "Slide two");
        assert_eq!(ws.teleprompter().current().unwrap().opacity, 0.8);
    }

    #[test]
    fn style_change_refreshes_open_surface() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        let note = ws.new_note().unwrap();
        ws.set_body(note.id, "Body").unwrap();
        ws.open_teleprompter().unwrap();

        ws.set_teleprompter_style(0.5, false).unwrap();
        let current = ws.teleprompter().current().unwrap();
        assert_eq!(current.opacity, 0.5);
        assert!(!current.theme.is_dark());
        assert_eq!(ws.teleprompter().host().opened_total(), 1);

        assert!(ws.close_teleprompter());
        ws.set_teleprompter_style(0.9, true).unwrap();
        assert_eq!(ws.teleprompter().host().open_count(), 0);
    }

    #[test]
    fn single_preference_setters_keep_the_other() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        ws.set_dark_mode(false).unwrap();
        ws.set_teleprompter_opacity(3.0).unwrap();
        assert_eq!(ws.session().teleprompter_opacity, 1.0);
        assert!(!ws.session().teleprompter_dark_mode);

        let reopened = open_workspace(tmp.path());
        assert_eq!(reopened.session().teleprompter_opacity, 1.0);
        assert!(!reopened.session().teleprompter_dark_mode);
    }

    #[test]
    fn edits_persist_through_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ws = open_workspace(tmp.path());
        let note = ws.new_note().unwrap();
        ws.set_title(note.id, "Intro").unwrap();

        let reopened = open_workspace(tmp.path());
        assert_eq!(reopened.selected_note().unwrap().title, "Intro");
    }
}
