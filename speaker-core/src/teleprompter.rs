use crate::error::SurfaceError;
use crate::surface::{SurfaceContent, SurfaceHost, SurfaceId, SurfaceSpec, Theme};

/// Owner of the single teleprompter surface.
///
/// Holds at most one surface id. The user may close the window without the
/// manager hearing about it; the next [`Teleprompter::show`] notices through
/// the host and opens a fresh surface.
#[derive(Debug)]
pub struct Teleprompter<H: SurfaceHost> {
    host: H,
    spec: SurfaceSpec,
    active: Option<SurfaceId>,
    current: Option<SurfaceContent>,
}

impl<H: SurfaceHost> Teleprompter<H> {
    pub fn new(host: H) -> Self {
        Self::with_spec(host, SurfaceSpec::default())
    }

    pub fn with_spec(host: H, spec: SurfaceSpec) -> Self {
        Teleprompter {
            host,
            spec,
            active: None,
            current: None,
        }
    }

    /// Show `text` on the teleprompter, reusing the open surface if there is
    /// one.
    pub fn show(
        &mut self,
        text: &str,
        opacity: f64,
        dark_mode: bool,
    ) -> Result<SurfaceId, SurfaceError> {
        self.show_content(SurfaceContent::new(
            text,
            opacity,
            Theme::from_dark_mode(dark_mode),
        ))
    }

    pub fn show_content(&mut self, content: SurfaceContent) -> Result<SurfaceId, SurfaceError> {
        if let Some(id) = self.active.take() {
            if self.host.is_open(id) {
                match self.host.update(id, &content) {
                    Ok(()) => {
                        log::debug!("Updated teleprompter surface {}", id.0);
                        self.active = Some(id);
                        self.current = Some(content);
                        return Ok(id);
                    }
                    Err(SurfaceError::Gone(_)) => {
                        log::debug!("Teleprompter surface {} vanished during update", id.0);
                    }
                    Err(e) => {
                        self.active = Some(id);
                        return Err(e);
                    }
                }
            } else {
                log::debug!("Teleprompter surface {} was closed by the user", id.0);
            }
            self.current = None;
        }

        let id = self.host.open(&self.spec, &content)?;
        log::info!(
            "Opened teleprompter surface {} ({}x{})",
            id.0,
            self.spec.width,
            self.spec.height
        );
        self.active = Some(id);
        self.current = Some(content);
        Ok(id)
    }

    /// Close the surface if one is open. Returns whether anything was closed.
    pub fn close(&mut self) -> bool {
        self.current = None;
        match self.active.take() {
            Some(id) if self.host.is_open(id) => {
                self.host.close(id);
                log::info!("Closed teleprompter surface {}", id.0);
                true
            }
            _ => false,
        }
    }

    /// Notification from hosts that report user-initiated closes.
    pub fn surface_closed(&mut self, id: SurfaceId) {
        if self.active == Some(id) {
            self.active = None;
            self.current = None;
        }
    }

    pub fn is_showing(&self) -> bool {
        self.active.is_some_and(|id| self.host.is_open(id))
    }

    /// Content of the open surface, if any.
    pub fn current(&self) -> Option<&SurfaceContent> {
        if self.is_showing() {
            self.current.as_ref()
        } else {
            None
        }
    }

    pub fn active_surface(&self) -> Option<SurfaceId> {
        self.active.filter(|id| self.host.is_open(*id))
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessHost;

    #[test]
    fn first_show_opens_centered_default_surface() {
        let mut prompter = Teleprompter::new(HeadlessHost::new());
        let id = prompter.show("Welcome", 0.8, true).unwrap();
        let surface = prompter.host().surface(id).unwrap();
        assert_eq!(surface.spec.title, "Teleprompter");
        assert_eq!((surface.spec.width, surface.spec.height), (600.0, 400.0));
        assert!(surface.spec.centered);
        assert_eq!(surface.content.theme, Theme::Dark);
        assert!(prompter.is_showing());
    }

    #[test]
    fn second_show_reuses_the_surface() {
        let mut prompter = Teleprompter::new(HeadlessHost::new());
        let first = prompter.show("First draft", 0.5, false).unwrap();
        let second = prompter.show("Final text", 0.5, false).unwrap();

        assert_eq!(first, second);
        assert_eq!(prompter.host().open_count(), 1);
        assert_eq!(prompter.host().opened_total(), 1);
        let surface = prompter.host().surface(second).unwrap();
        assert_eq!(surface.content.text, "Final text");
        assert_eq!(surface.content.opacity, 0.5);
        assert_eq!(surface.content.theme, Theme::Light);
    }

    #[test]
    fn show_after_user_close_opens_a_new_surface() {
        let mut prompter = Teleprompter::new(HeadlessHost::new());
        let first = prompter.show("one", 0.8, true).unwrap();
        prompter.host_mut().user_close(first);
        assert!(!prompter.is_showing());
        assert!(prompter.current().is_none());

        let second = prompter.show("two", 0.8, true).unwrap();
        assert_ne!(first, second);
        assert_eq!(prompter.host().open_count(), 1);
        assert_eq!(prompter.current().unwrap().text, "two");
    }

    #[test]
    fn close_is_deterministic() {
        let mut prompter = Teleprompter::new(HeadlessHost::new());
        assert!(!prompter.close());
        prompter.show("text", 0.8, true).unwrap();
        assert!(prompter.close());
        assert!(!prompter.close());
        assert_eq!(prompter.host().open_count(), 0);
    }

    #[test]
    fn surface_closed_notification_forgets_the_surface() {
        let mut prompter = Teleprompter::new(HeadlessHost::new());
        let id = prompter.show("text", 0.8, true).unwrap();
        prompter.surface_closed(SurfaceId(id.0 + 100));
        assert_eq!(prompter.active_surface(), Some(id));
        prompter.surface_closed(id);
        assert_eq!(prompter.active_surface(), None);
    }

    struct RefusingHost;

    impl SurfaceHost for RefusingHost {
        fn open(
            &mut self,
            _spec: &SurfaceSpec,
            _content: &SurfaceContent,
        ) -> Result<SurfaceId, SurfaceError> {
            Err(SurfaceError::OpenFailed("no display".to_string()))
        }

        fn update(&mut self, id: SurfaceId, _content: &SurfaceContent) -> Result<(), SurfaceError> {
            Err(SurfaceError::Gone(id.0))
        }

        fn is_open(&self, _id: SurfaceId) -> bool {
            false
        }

        fn close(&mut self, _id: SurfaceId) {}
    }

    #[test]
    fn open_failure_is_reported() {
        let mut prompter = Teleprompter::new(RefusingHost);
        assert!(matches!(
            prompter.show("text", 0.8, true),
            Err(SurfaceError::OpenFailed(_))
        ));
        assert!(!prompter.is_showing());
    }
}
