//! Teleprompter display page and the command/event protocol spoken between
//! Rust and the web view hosted in the floating surface.

pub mod colors;
pub mod page;
pub mod protocol;

pub use colors::ThemeColors;
pub use page::render_teleprompter_page;
pub use protocol::{DisplayCommand, DisplayEvent};
