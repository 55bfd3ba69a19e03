use std::path::PathBuf;

/// Name of the folder inside the user's documents directory holding note files.
pub const NOTES_FOLDER: &str = "Notes";

const APP_DIR: &str = "speaker-note";
const SESSION_FILE: &str = "session.json";

/// Default notes directory (`~/Documents/Notes` on macOS).
///
/// Falls back to `~/Notes` when the platform has no documents directory.
pub fn default_notes_dir() -> Option<PathBuf> {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|docs| docs.join(NOTES_FOLDER))
}

/// Default location of the session file
/// (`~/Library/Application Support/speaker-note/session.json` on macOS,
/// `~/.config/speaker-note/session.json` on Linux).
pub fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|config| config.join(APP_DIR).join(SESSION_FILE))
}
