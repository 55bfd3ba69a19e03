//! C-compatible FFI wrappers around speaker-core and speaker-display.
//!
//! All functions use C strings for input/output and JSON encoding for
//! complex types. Callers must free returned strings with `speaker_free_string`.
//!
//! All extern "C" functions are wrapped in `ffi_catch` to prevent Rust
//! panics from crossing the FFI boundary (which is undefined behavior).
//! Panic payloads are logged before returning the fallback value.
//!
//! The teleprompter window itself belongs to the Swift side: it passes a
//! `SpeakerSurfaceCallbacks` table when opening a workspace, and Rust calls
//! back into it to open the floating window, run display commands in its web
//! view, and close it.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use speaker_core::{
    LoadReport, Note, NoteStore, StoreEvent, SurfaceContent, SurfaceError, SurfaceHost,
    SurfaceId, SurfaceSpec, Workspace,
};
use speaker_display::{render_teleprompter_page, DisplayCommand, DisplayEvent};
use uuid::Uuid;

/// Run `f` inside `catch_unwind`, logging the panic payload before returning the
/// fallback value.
fn ffi_catch<T>(fallback: T, f: impl FnOnce() -> T + std::panic::UnwindSafe) -> T {
    match catch_unwind(f) {
        Ok(v) => v,
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            log::error!("FFI panic caught: {}", msg);
            fallback
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_rust_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: Caller guarantees `ptr` is a valid, null-terminated C string
    // whose memory remains valid for the duration of this call.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(String::from)
}

/// Build a `CString`, dropping interior NUL bytes.
fn c_string_lossy(s: &str) -> CString {
    match CString::new(s) {
        Ok(cs) => cs,
        Err(_) => {
            log::warn!(
                "String contains interior NUL bytes, sanitizing ({} chars)",
                s.len()
            );
            let sanitized: String = s.chars().filter(|&c| c != '\0').collect();
            CString::new(sanitized).unwrap_or_default()
        }
    }
}

fn to_c_string(s: &str) -> *mut c_char {
    c_string_lossy(s).into_raw()
}

fn parse_id(ptr: *const c_char) -> Option<Uuid> {
    let raw = to_rust_str(ptr)?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("Invalid note id {:?}: {}", raw, e);
            None
        }
    }
}

fn json_string(value: &impl serde::Serialize) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(j) => to_c_string(&j),
        Err(e) => {
            log::error!("JSON serialization failed: {}", e);
            error_json(&format!("serialization failed: {}", e))
        }
    }
}

fn error_json(message: &str) -> *mut c_char {
    to_c_string(&serde_json::json!({ "error": message }).to_string())
}

fn ok_json() -> *mut c_char {
    to_c_string(&serde_json::json!({ "ok": true }).to_string())
}

fn note_json(note: &Note) -> serde_json::Value {
    let mut value = serde_json::to_value(note).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("preview".to_string(), note.preview().into());
        obj.insert("fileName".to_string(), note.file_name().into());
    }
    value
}

// ---------------------------------------------------------------------------
// Memory management and logging
// ---------------------------------------------------------------------------

/// Free a string previously returned by a `speaker_*` function.
#[no_mangle]
pub extern "C" fn speaker_free_string(s: *mut c_char) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            if !s.is_null() {
                // SAFETY: `s` was previously returned by `CString::into_raw` from
                // one of the `speaker_*` functions, so it is valid to reclaim it.
                unsafe {
                    drop(CString::from_raw(s));
                }
            }
        }),
    );
}

/// Install the `env_logger` backend (filter with `RUST_LOG`).
///
/// Returns false if a logger was already installed.
#[no_mangle]
pub extern "C" fn speaker_init_logging() -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let installed = env_logger::Builder::from_default_env().try_init().is_ok();
            if installed {
                log::info!("Speaker Note core logging initialized");
            }
            installed
        }),
    )
}

/// Return the JSON Schema of a note file as a static string.
///
/// The returned pointer is valid for the lifetime of the process and must
/// NOT be freed.
#[no_mangle]
pub extern "C" fn speaker_note_file_schema() -> *const c_char {
    ffi_catch(
        std::ptr::null(),
        AssertUnwindSafe(|| {
            static CACHED: OnceLock<CString> = OnceLock::new();
            CACHED
                .get_or_init(|| c_string_lossy(&speaker_core::note::note_file_schema().to_string()))
                .as_ptr()
        }),
    )
}

// ---------------------------------------------------------------------------
// Teleprompter surface host
// ---------------------------------------------------------------------------

/// Callback table implemented by the native shell.
///
/// Every callback receives `context` unchanged. Strings passed to callbacks
/// are only valid for the duration of the call.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SpeakerSurfaceCallbacks {
    pub context: *mut c_void,
    /// Open a floating window described by `spec_json` (a `SurfaceSpec`)
    /// and load `html` into its web view. Returns a non-zero surface id, or
    /// 0 if the window could not be created.
    pub open: Option<
        extern "C" fn(context: *mut c_void, spec_json: *const c_char, html: *const c_char) -> u64,
    >,
    /// Evaluate `script` in the web view of surface `id`. Returns false if the
    /// surface no longer exists.
    pub evaluate: Option<extern "C" fn(context: *mut c_void, id: u64, script: *const c_char) -> bool>,
    pub is_open: Option<extern "C" fn(context: *mut c_void, id: u64) -> bool>,
    pub close: Option<extern "C" fn(context: *mut c_void, id: u64)>,
}

/// [`SurfaceHost`] backed by the native shell's callbacks.
struct FfiSurfaceHost {
    callbacks: SpeakerSurfaceCallbacks,
}

// SAFETY: the shell only calls into a workspace from its main thread, and the
// context pointer is owned by the shell for as long as the workspace lives.
unsafe impl Send for FfiSurfaceHost {}

impl SurfaceHost for FfiSurfaceHost {
    fn open(
        &mut self,
        spec: &SurfaceSpec,
        content: &SurfaceContent,
    ) -> Result<SurfaceId, SurfaceError> {
        let open = self
            .callbacks
            .open
            .ok_or_else(|| SurfaceError::Host("no open callback registered".to_string()))?;
        let spec_json =
            serde_json::to_string(spec).map_err(|e| SurfaceError::Host(e.to_string()))?;
        let spec_c = c_string_lossy(&spec_json);
        let html_c = c_string_lossy(&render_teleprompter_page(content));
        match open(self.callbacks.context, spec_c.as_ptr(), html_c.as_ptr()) {
            0 => Err(SurfaceError::OpenFailed(
                "shell returned no surface".to_string(),
            )),
            id => Ok(SurfaceId(id)),
        }
    }

    fn update(&mut self, id: SurfaceId, content: &SurfaceContent) -> Result<(), SurfaceError> {
        let evaluate = self
            .callbacks
            .evaluate
            .ok_or_else(|| SurfaceError::Host("no evaluate callback registered".to_string()))?;
        for command in DisplayCommand::for_content(content) {
            let script = command
                .to_script()
                .map_err(|e| SurfaceError::Host(e.to_string()))?;
            let script_c = c_string_lossy(&script);
            if !evaluate(self.callbacks.context, id.0, script_c.as_ptr()) {
                return Err(SurfaceError::Gone(id.0));
            }
        }
        Ok(())
    }

    fn is_open(&self, id: SurfaceId) -> bool {
        match self.callbacks.is_open {
            Some(is_open) => is_open(self.callbacks.context, id.0),
            None => false,
        }
    }

    fn close(&mut self, id: SurfaceId) {
        if let Some(close) = self.callbacks.close {
            close(self.callbacks.context, id.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Workspace handles
// ---------------------------------------------------------------------------

/// Maximum number of store events buffered for `speaker_workspace_poll_event`.
const STORE_EVENT_CHANNEL_CAPACITY: usize = 1_000;

/// Inner data for a workspace handle, stored in the global registry.
struct WorkspaceInner {
    workspace: parking_lot::Mutex<Workspace<FfiSurfaceHost>>,
    last_report: parking_lot::Mutex<LoadReport>,
    event_rx: Receiver<StoreEvent>,
}

/// Global registry mapping handle addresses to their inner data.
/// The pointer is only used as an opaque key, never dereferenced.
fn workspace_registry() -> &'static parking_lot::Mutex<HashMap<usize, Arc<WorkspaceInner>>> {
    static REGISTRY: OnceLock<parking_lot::Mutex<HashMap<usize, Arc<WorkspaceInner>>>> =
        OnceLock::new();
    REGISTRY.get_or_init(|| parking_lot::Mutex::new(HashMap::new()))
}

/// Look up a handle in the global registry and run `f` with the inner data.
/// Returns `default` if the handle is null or freed.
fn with_workspace<T>(
    handle: *mut WorkspaceHandle,
    default: T,
    f: impl FnOnce(&WorkspaceInner) -> T,
) -> T {
    if handle.is_null() {
        return default;
    }
    let key = handle as usize;
    let guard = workspace_registry().lock();
    match guard.get(&key) {
        Some(inner) => {
            let inner = Arc::clone(inner);
            drop(guard); // Release lock before calling f
            f(&inner)
        }
        None => {
            log::warn!("Attempted to use invalid or freed workspace handle");
            default
        }
    }
}

/// Opaque workspace handle for the C API. Only its address is used.
pub struct WorkspaceHandle {
    _private: (),
}

fn forward_event(tx: &Sender<StoreEvent>, event: &StoreEvent) {
    match tx.try_send(event.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            log::warn!(
                "Store event channel full ({} capacity), dropping event",
                STORE_EVENT_CHANNEL_CAPACITY
            );
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Open a workspace: load notes from `notes_dir` and the session from
/// `session_path`.
///
/// Either path may be null to use the platform default
/// (`~/Documents/Notes` and the user config directory). Returns an opaque
/// handle, or null if the notes directory cannot be created or read. The
/// caller must free it with `speaker_workspace_free`.
#[no_mangle]
pub extern "C" fn speaker_workspace_open(
    notes_dir: *const c_char,
    session_path: *const c_char,
    callbacks: SpeakerSurfaceCallbacks,
) -> *mut WorkspaceHandle {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            let mut store = match to_rust_str(notes_dir) {
                Some(dir) => NoteStore::new(dir),
                None => match NoteStore::with_default_dir() {
                    Ok(store) => store,
                    Err(e) => {
                        log::error!("Failed to open notes directory: {}", e);
                        return std::ptr::null_mut();
                    }
                },
            };
            let session_path = to_rust_str(session_path)
                .map(PathBuf::from)
                .or_else(speaker_core::paths::default_session_path);

            let (event_tx, event_rx) = crossbeam_channel::bounded(STORE_EVENT_CHANNEL_CAPACITY);
            store.subscribe(move |event| forward_event(&event_tx, event));

            let host = FfiSurfaceHost { callbacks };
            let (workspace, report) = match Workspace::open(store, session_path, host) {
                Ok(opened) => opened,
                Err(e) => {
                    log::error!("Failed to open workspace: {}", e);
                    return std::ptr::null_mut();
                }
            };

            let inner = Arc::new(WorkspaceInner {
                workspace: parking_lot::Mutex::new(workspace),
                last_report: parking_lot::Mutex::new(report),
                event_rx,
            });

            // Allocate a stable address to use as an opaque handle key
            let handle = Box::into_raw(Box::new(WorkspaceHandle { _private: () }));
            workspace_registry().lock().insert(handle as usize, inner);
            handle
        }),
    )
}

/// Release a workspace handle. The teleprompter surface, if open, is closed.
#[no_mangle]
pub extern "C" fn speaker_workspace_free(handle: *mut WorkspaceHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            if handle.is_null() {
                return;
            }
            let removed = workspace_registry().lock().remove(&(handle as usize));
            let Some(inner) = removed else {
                log::warn!("Attempted to free invalid or already freed workspace handle");
                return;
            };
            inner.workspace.lock().close_teleprompter();
            // SAFETY: `handle` was allocated by `Box::into_raw` in `speaker_workspace_open`.
            // The registry removal above ensures this only happens once per handle.
            unsafe {
                drop(Box::from_raw(handle));
            }
        }),
    );
}

/// Re-read the notes directory.
///
/// Returns the load report as JSON (`{"loaded": n, "skipped": [...]}`) or an
/// `{"error": ...}` object. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_reload(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().reload();
                match result {
                    Ok(report) => {
                        let json = json_string(&report);
                        *inner.last_report.lock() = report;
                        json
                    }
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Report of the most recent load, as JSON. The caller must free it.
#[no_mangle]
pub extern "C" fn speaker_workspace_load_report(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                json_string(&*inner.last_report.lock())
            })
        }),
    )
}

/// All notes in creation order as a JSON array. Each note carries `id`,
/// `title`, `body`, `createdAt`, `preview` and `fileName`.
/// The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_notes(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let workspace = inner.workspace.lock();
                let notes: Vec<serde_json::Value> =
                    workspace.store().notes().iter().map(note_json).collect();
                json_string(&notes)
            })
        }),
    )
}

/// The session (`selectedNoteID`, `openTabIDs`, teleprompter preferences)
/// as JSON. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_session(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                json_string(inner.workspace.lock().session())
            })
        }),
    )
}

/// Create a note, select it and open a tab for it.
///
/// Returns the note as JSON or an `{"error": ...}` object.
/// The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_new_note(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().new_note();
                match result {
                    Ok(note) => json_string(&note_json(&note)),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Select the note with `note_id`, or clear the selection when null.
///
/// Returns false for malformed or unknown ids.
#[no_mangle]
pub extern "C" fn speaker_workspace_select(
    handle: *mut WorkspaceHandle,
    note_id: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let id = if note_id.is_null() {
                None
            } else {
                match parse_id(note_id) {
                    Some(id) => Some(id),
                    None => return false,
                }
            };
            with_workspace(handle, false, |inner| inner.workspace.lock().select(id))
        }),
    )
}

/// Close the tab of `note_id`. Returns false for malformed ids.
#[no_mangle]
pub extern "C" fn speaker_workspace_close_tab(
    handle: *mut WorkspaceHandle,
    note_id: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let Some(id) = parse_id(note_id) else {
                return false;
            };
            with_workspace(handle, false, |inner| {
                inner.workspace.lock().close_tab(id);
                true
            })
        }),
    )
}

/// Set a note's title and save it.
///
/// Returns `{"ok": true}` or `{"error": ...}`. The caller must free the
/// returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_set_title(
    handle: *mut WorkspaceHandle,
    note_id: *const c_char,
    title: *const c_char,
) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            let Some(id) = parse_id(note_id) else {
                return error_json("invalid note id");
            };
            let Some(title) = to_rust_str(title) else {
                return error_json("title is not valid UTF-8");
            };
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().set_title(id, &title);
                match result {
                    Ok(()) => ok_json(),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Set a note's body and save it.
///
/// Returns `{"ok": true}` or `{"error": ...}`. The caller must free the
/// returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_set_body(
    handle: *mut WorkspaceHandle,
    note_id: *const c_char,
    body: *const c_char,
) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            let Some(id) = parse_id(note_id) else {
                return error_json("invalid note id");
            };
            let Some(body) = to_rust_str(body) else {
                return error_json("body is not valid UTF-8");
            };
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().set_body(id, &body);
                match result {
                    Ok(()) => ok_json(),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Delete a note, removing it from the open tabs and the selection.
///
/// Deleting a note that no longer exists succeeds. Returns `{"ok": true}` or
/// `{"error": ...}`. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_delete(
    handle: *mut WorkspaceHandle,
    note_id: *const c_char,
) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            let Some(id) = parse_id(note_id) else {
                return error_json("invalid note id");
            };
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().delete(id);
                match result {
                    Ok(()) => ok_json(),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Show the selected note on the teleprompter.
///
/// Returns `{"surfaceId": n}` (`null` when no note is selected) or
/// `{"error": ...}`. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_open_teleprompter(
    handle: *mut WorkspaceHandle,
) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner.workspace.lock().open_teleprompter();
                match result {
                    Ok(surface) => to_c_string(
                        &serde_json::json!({ "surfaceId": surface.map(|id| id.0) }).to_string(),
                    ),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Close the teleprompter. Returns true if a surface was open.
#[no_mangle]
pub extern "C" fn speaker_workspace_close_teleprompter(handle: *mut WorkspaceHandle) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            with_workspace(handle, false, |inner| {
                inner.workspace.lock().close_teleprompter()
            })
        }),
    )
}

/// Change the teleprompter opacity (clamped to 0..=1) and theme, refreshing
/// the surface if it is open.
///
/// Returns `{"ok": true}` or `{"error": ...}`. The caller must free the
/// returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_set_teleprompter_style(
    handle: *mut WorkspaceHandle,
    opacity: f64,
    dark_mode: bool,
) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                let result = inner
                    .workspace
                    .lock()
                    .set_teleprompter_style(opacity, dark_mode);
                match result {
                    Ok(()) => ok_json(),
                    Err(e) => error_json(&e.to_string()),
                }
            })
        }),
    )
}

/// Deliver an event posted by the teleprompter page of `surface_id`
/// (`{"type": "Ready" | "Resized" | "Closed", ...}`).
///
/// Returns false if the event could not be parsed.
#[no_mangle]
pub extern "C" fn speaker_workspace_surface_event(
    handle: *mut WorkspaceHandle,
    surface_id: u64,
    event_json: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let Some(event) = to_rust_str(event_json).and_then(|json| DisplayEvent::parse(&json))
            else {
                return false;
            };
            with_workspace(handle, false, |inner| {
                match event {
                    DisplayEvent::Ready => {
                        log::debug!("Teleprompter surface {} ready", surface_id);
                    }
                    DisplayEvent::Resized { width, height } => {
                        log::debug!(
                            "Teleprompter surface {} resized to {}x{}",
                            surface_id,
                            width,
                            height
                        );
                    }
                    DisplayEvent::Closed => {
                        inner
                            .workspace
                            .lock()
                            .teleprompter_mut()
                            .surface_closed(SurfaceId(surface_id));
                    }
                }
                true
            })
        }),
    )
}

/// Pop the next store change event as JSON (`{"type": "Created", "id": ...}`),
/// or null when none are pending. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn speaker_workspace_poll_event(handle: *mut WorkspaceHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_workspace(handle, std::ptr::null_mut(), |inner| {
                match inner.event_rx.try_recv() {
                    Ok(event) => json_string(&event),
                    Err(_) => std::ptr::null_mut(),
                }
            })
        }),
    )
}
