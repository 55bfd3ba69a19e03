use serde::{Deserialize, Serialize};
use speaker_core::surface::Theme;

/// Colors used by the teleprompter page for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub scrollbar: String,
}

impl ThemeColors {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => ThemeColors {
                bg: "#000000".to_string(),
                fg: "#ffffff".to_string(),
                scrollbar: "rgba(255, 255, 255, 0.25)".to_string(),
            },
            Theme::Light => ThemeColors {
                bg: "#ffffff".to_string(),
                fg: "#000000".to_string(),
                scrollbar: "rgba(0, 0, 0, 0.25)".to_string(),
            },
        }
    }
}
