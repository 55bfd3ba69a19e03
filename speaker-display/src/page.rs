use speaker_core::surface::SurfaceContent;

use crate::colors::ThemeColors;

pub const TELEPROMPTER_JS: &str = include_str!("../web/teleprompter.js");

const FONT_FAMILY: &str =
    "-apple-system, BlinkMacSystemFont, \"Helvetica Neue\", Helvetica, Arial, sans-serif";

/// Render `content` to a standalone HTML document for the teleprompter
/// surface.
///
/// The text is HTML-escaped and shown with line breaks preserved. The page
/// also installs `speakerReceiveCommand` so later updates can be applied
/// without reloading.
pub fn render_teleprompter_page(content: &SurfaceContent) -> String {
    let colors = ThemeColors::for_theme(content.theme);
    let text = ammonia::clean_text(&content.text);

    format!(
        r#"<!DOCTYPE html>
<html data-theme="{theme}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Teleprompter</title>
<style>
:root {{
    --bg: {bg};
    --fg: {fg};
    --scrollbar: {scrollbar};
    --opacity: {opacity};
    --font-size: {font_size}px;
}}
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
html, body {{
    width: 100%;
    min-height: 100%;
    background: var(--bg);
}}
body {{
    overflow-y: auto;
}}
#content {{
    opacity: var(--opacity);
    background: var(--bg);
    min-height: 100vh;
    padding: 16px;
}}
#text {{
    color: var(--fg);
    font-family: {font_family};
    font-size: var(--font-size);
    font-weight: 500;
    line-height: 1.35;
    text-align: left;
    white-space: pre-wrap;
    overflow-wrap: break-word;
}}
::-webkit-scrollbar {{ width: 8px; }}
::-webkit-scrollbar-thumb {{ background: var(--scrollbar); border-radius: 4px; }}
</style>
</head>
<body>
<div id="content"><div id="text">{text}</div></div>
<script>
{script}
</script>
</body>
</html>"#,
        theme = if content.theme.is_dark() { "dark" } else { "light" },
        bg = colors.bg,
        fg = colors.fg,
        scrollbar = colors.scrollbar,
        opacity = content.opacity,
        font_size = content.font_size,
        font_family = FONT_FAMILY,
        text = text,
        script = TELEPROMPTER_JS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use speaker_core::surface::Theme;

    #[test]
    fn escapes_markup_in_text() {
        let content = SurfaceContent::new("<script>alert(1)</script> & more", 0.8, Theme::Dark);
        let html = render_teleprompter_page(&content);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn applies_theme_and_opacity() {
        let content = SurfaceContent::new("Hello", 0.5, Theme::Light);
        let html = render_teleprompter_page(&content);
        assert!(html.contains("--bg: #ffffff;"));
        assert!(html.contains("--fg: #000000;"));
        assert!(html.contains("--opacity: 0.5;"));
        assert!(html.contains("--font-size: 28px;"));
        assert!(html.contains(r#"data-theme="light""#));
    }

    #[test]
    fn dark_theme_is_white_on_black() {
        let html = render_teleprompter_page(&SurfaceContent::new("Hi", 0.8, Theme::Dark));
        assert!(html.contains("--bg: #000000;"));
        assert!(html.contains("--fg: #ffffff;"));
    }

    #[test]
    fn embeds_command_receiver() {
        let html = render_teleprompter_page(&SurfaceContent::new("", 1.0, Theme::Dark));
        assert!(html.contains("speakerReceiveCommand"));
        assert!(html.contains(r#"<div id="text"></div>"#));
    }
}
