use serde::{Deserialize, Serialize};
use speaker_core::surface::{SurfaceContent, Theme};

use crate::colors::ThemeColors;

/// Name of the JS function the page exposes for commands.
pub const RECEIVE_FUNCTION: &str = "speakerReceiveCommand";

/// Name of the script message handler the page posts events to.
pub const MESSAGE_HANDLER: &str = "speaker";

// ---------------------------------------------------------------------------
// Commands: Rust → teleprompter page (sent via evaluateJavaScript)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DisplayCommand {
    SetText {
        text: String,
    },
    SetAppearance {
        opacity: f64,
        theme: Theme,
        colors: ThemeColors,
        font_size: f64,
    },
    ScrollToTop,
}

impl DisplayCommand {
    /// Commands that bring an already loaded page to `content`.
    pub fn for_content(content: &SurfaceContent) -> Vec<DisplayCommand> {
        vec![
            DisplayCommand::SetAppearance {
                opacity: content.opacity,
                theme: content.theme,
                colors: ThemeColors::for_theme(content.theme),
                font_size: content.font_size,
            },
            DisplayCommand::SetText {
                text: content.text.clone(),
            },
        ]
    }

    /// JavaScript statement delivering this command to the page.
    pub fn to_script(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        // Escape for embedding in a single-quoted JS string literal
        let escaped = json
            .replace('\\', "\\\\")
            .replace('\'', "\\'")
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029");
        Ok(format!("{}('{}')", RECEIVE_FUNCTION, escaped))
    }
}

// ---------------------------------------------------------------------------
// Events: teleprompter page → Rust (sent via postMessage)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DisplayEvent {
    Ready,
    Resized { width: f64, height: f64 },
    Closed,
}

impl DisplayEvent {
    pub fn parse(json: &str) -> Option<DisplayEvent> {
        match serde_json::from_str(json) {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("Ignoring malformed display event {:?}: {}", json, e);
                None
            }
        }
    }
}
