/*
    ABSTRACT: The single closed event family this crate's ObserverBus instances
    carry, folding keyboard, mouse, and window payloads behind one top-level
    discriminator.
*/
use crate::input::keyboard::KeyboardEvent;
use crate::input::mouse::MouseEvent;
use crate::platform::event::WindowEvent;

/// The top-level discriminator for a [`ThermiteEvent`]. Lets a listener that
/// only cares about the broad category match on `event.kind()` without
/// destructuring the inner payload.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub enum ThermiteEventKind {
    Keyboard,
    Mouse,
    Window,
}

/// The event family carried by every `ObserverBus<ThermiteEvent>` this crate
/// wires up. A closed set of variants: producers and listeners specialize over
/// `ThermiteEvent` itself, never over some open-ended universal event type.
#[derive(Debug, PartialEq, Eq)]
pub enum ThermiteEvent {
    Keyboard(KeyboardEvent),
    Mouse(MouseEvent),
    Window(WindowEvent),
}

impl ThermiteEvent {
    /// The top-level category this event belongs to.
    pub fn kind(&self) -> ThermiteEventKind {
        match self {
            ThermiteEvent::Keyboard(_) => ThermiteEventKind::Keyboard,
            ThermiteEvent::Mouse(_) => ThermiteEventKind::Mouse,
            ThermiteEvent::Window(_) => ThermiteEventKind::Window,
        }
    }
}
