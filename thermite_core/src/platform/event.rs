/*
    ABSTRACT: Window-level lifecycle events, folded into the closed
    ThermiteEvent family in messaging::event.
*/
use crate::messaging::event::ThermiteEvent;

/// Window lifecycle notifications a platform window producer emits.
///
/// `Resized` carries the new physical size so listeners (e.g. a renderer's
/// swapchain) don't need a second round-trip back to the window to learn it.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum WindowEvent {
    Shown,
    Hidden,
    CloseRequested,
    Resized { width: u32, height: u32 },
    Generic,
}

impl From<WindowEvent> for ThermiteEvent {
    fn from(w_evt: WindowEvent) -> Self {
        ThermiteEvent::Window(w_evt)
    }
}
