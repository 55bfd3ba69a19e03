//! Core library for Speaker Note: one-file-per-note storage, session state
//! and the teleprompter window lifecycle.

pub mod error;
pub mod note;
pub mod paths;
pub mod session;
pub mod store;
pub mod surface;
pub mod teleprompter;
pub mod workspace;

pub use error::{SessionError, StoreError, SurfaceError};
pub use note::Note;
pub use session::Session;
pub use store::{LoadReport, NoteStore, SkippedFile, StoreEvent, SubscriptionId};
pub use surface::{HeadlessHost, SurfaceContent, SurfaceHost, SurfaceId, SurfaceSpec, Theme};
pub use teleprompter::Teleprompter;
pub use workspace::Workspace;
