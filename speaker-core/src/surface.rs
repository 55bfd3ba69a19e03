//! Platform abstraction for the floating teleprompter surface.
//!
//! The native shell owns the real window; Rust describes what to show and
//! asks the host to open, update or close it. [`HeadlessHost`] keeps surfaces
//! in memory for tests and for running without a window system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

pub const TELEPROMPTER_TITLE: &str = "Teleprompter";
pub const DEFAULT_WIDTH: f64 = 600.0;
pub const DEFAULT_HEIGHT: f64 = 400.0;
pub const DEFAULT_FONT_SIZE: f64 = 28.0;
pub const DEFAULT_OPACITY: f64 = 0.8;

/// Host-assigned identifier of an open surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u64);

/// Background theme of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }
}

/// Window chrome requested when a surface is first opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSpec {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub centered: bool,
    pub floating: bool,
    pub resizable: bool,
    pub closable: bool,
    pub miniaturizable: bool,
}

impl Default for SurfaceSpec {
    fn default() -> Self {
        SurfaceSpec {
            title: TELEPROMPTER_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            centered: true,
            floating: true,
            resizable: true,
            closable: true,
            miniaturizable: true,
        }
    }
}

/// What the surface displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceContent {
    pub text: String,
    /// Always within `0.0..=1.0`.
    pub opacity: f64,
    pub theme: Theme,
    pub font_size: f64,
}

impl SurfaceContent {
    /// Build content, clamping `opacity` into range. Non-finite values fall
    /// back to [`DEFAULT_OPACITY`].
    pub fn new(text: impl Into<String>, opacity: f64, theme: Theme) -> Self {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            DEFAULT_OPACITY
        };
        SurfaceContent {
            text: text.into(),
            opacity,
            theme,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

/// A window system able to show teleprompter surfaces.
pub trait SurfaceHost {
    /// Create a new surface and return its id.
    fn open(
        &mut self,
        spec: &SurfaceSpec,
        content: &SurfaceContent,
    ) -> Result<SurfaceId, SurfaceError>;

    /// Replace the content of an open surface. Returns
    /// [`SurfaceError::Gone`] if the surface has been closed.
    fn update(&mut self, id: SurfaceId, content: &SurfaceContent) -> Result<(), SurfaceError>;

    fn is_open(&self, id: SurfaceId) -> bool;

    /// Close a surface. Closing an unknown surface does nothing.
    fn close(&mut self, id: SurfaceId);
}

impl<H: SurfaceHost + ?Sized> SurfaceHost for Box<H> {
    fn open(
        &mut self,
        spec: &SurfaceSpec,
        content: &SurfaceContent,
    ) -> Result<SurfaceId, SurfaceError> {
        (**self).open(spec, content)
    }

    fn update(&mut self, id: SurfaceId, content: &SurfaceContent) -> Result<(), SurfaceError> {
        (**self).update(id, content)
    }

    fn is_open(&self, id: SurfaceId) -> bool {
        (**self).is_open(id)
    }

    fn close(&mut self, id: SurfaceId) {
        (**self).close(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSurface {
    pub spec: SurfaceSpec,
    pub content: SurfaceContent,
}

/// In-memory [`SurfaceHost`].
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, HeadlessSurface>,
    opened: usize,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&HeadlessSurface> {
        self.surfaces.get(&id)
    }

    /// Currently open surfaces.
    pub fn open_surfaces(&self) -> impl Iterator<Item = (SurfaceId, &HeadlessSurface)> {
        self.surfaces.iter().map(|(id, s)| (*id, s))
    }

    pub fn open_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Number of surfaces ever opened.
    pub fn opened_total(&self) -> usize {
        self.opened
    }

    /// Close a surface the way a user clicking the close button would,
    /// without telling the manager.
    pub fn user_close(&mut self, id: SurfaceId) {
        self.surfaces.remove(&id);
    }
}

impl SurfaceHost for HeadlessHost {
    fn open(
        &mut self,
        spec: &SurfaceSpec,
        content: &SurfaceContent,
    ) -> Result<SurfaceId, SurfaceError> {
        self.next_id += 1;
        self.opened += 1;
        let id = SurfaceId(self.next_id);
        self.surfaces.insert(
            id,
            HeadlessSurface {
                spec: spec.clone(),
                content: content.clone(),
            },
        );
        Ok(id)
    }

    fn update(&mut self, id: SurfaceId, content: &SurfaceContent) -> Result<(), SurfaceError> {
        match self.surfaces.get_mut(&id) {
            Some(surface) => {
                surface.content = content.clone();
                Ok(())
            }
            None => Err(SurfaceError::Gone(id.0)),
        }
    }

    fn is_open(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    fn close(&mut self, id: SurfaceId) {
        self.surfaces.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_clamps_opacity() {
        assert_eq!(SurfaceContent::new("", 1.5, Theme::Dark).opacity, 1.0);
        assert_eq!(SurfaceContent::new("", -0.1, Theme::Dark).opacity, 0.0);
        assert_eq!(
            SurfaceContent::new("", f64::INFINITY, Theme::Dark).opacity,
            DEFAULT_OPACITY
        );
    }

    #[test]
    fn default_spec_is_centered_teleprompter() {
        let spec = SurfaceSpec::default();
        assert_eq!(spec.title, "Teleprompter");
        assert_eq!((spec.width, spec.height), (600.0, 400.0));
        assert!(spec.centered && spec.resizable && spec.closable);
    }

    #[test]
    fn headless_update_after_user_close_is_gone() {
        let mut host = HeadlessHost::new();
        let content = SurfaceContent::new("hi", 0.8, Theme::Dark);
        let id = host.open(&SurfaceSpec::default(), &content).unwrap();
        host.user_close(id);
        assert_eq!(host.update(id, &content), Err(SurfaceError::Gone(id.0)));
        assert!(!host.is_open(id));
    }

    #[test]
    fn theme_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Theme::Light).unwrap(), "\"light\"");
        assert_eq!(Theme::from_dark_mode(true), Theme::Dark);
    }
}
