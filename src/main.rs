use std::sync::Arc;

use log::info;
use thermite_core::input::keyboard::KeyboardEvent;
use thermite_core::input::mouse::MouseEvent;
use thermite_core::messaging::{
    EventListener, EventProducer, ListenerState, ObserverBus, ProducerState, ThermiteEvent,
};
use thermite_core::platform::event::WindowEvent as ThermiteWindowEvent;
use thermite_core::thermite_logging;
use winit::event::{ElementState, Event as WinitEvent, WindowEvent as WinitWindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

/// The window/input side of the application. Owns nothing but its
/// registration set; every winit event it sees is translated into a
/// `ThermiteEvent` and handed to `dispatch_event`.
struct InputProducer {
    state: ProducerState<ThermiteEvent>,
}

impl InputProducer {
    fn new() -> Self {
        Self {
            state: ProducerState::new(),
        }
    }

    fn emit(&self, event: ThermiteEvent) {
        self.dispatch_event(Arc::new(event));
    }
}

impl EventProducer<ThermiteEvent> for InputProducer {
    fn producer_state(&self) -> &ProducerState<ThermiteEvent> {
        &self.state
    }
}

/// A stand-in gameplay system. Logs every event it receives; a real listener
/// would switch on `event.kind()` and route to whatever subsystem owns that
/// category.
struct GameplayListener {
    state: ListenerState<ThermiteEvent>,
}

impl GameplayListener {
    fn new() -> Self {
        Self {
            state: ListenerState::new(),
        }
    }
}

impl EventListener<ThermiteEvent> for GameplayListener {
    fn listener_state(&self) -> &ListenerState<ThermiteEvent> {
        &self.state
    }

    fn on_event(&self, event: Arc<ThermiteEvent>) {
        info!("gameplay observed {:?}", event);
    }
}

fn main() {
    thermite_logging::init().expect("couldn't initialize logging");

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("thermite")
        .build(&event_loop)
        .expect("couldn't create window");

    // The bus is constructed on, and therefore owned by, this thread: it is
    // the only thread allowed to call `communicate()`.
    let bus = ObserverBus::<ThermiteEvent>::new();
    let input = InputProducer::new();
    let gameplay = GameplayListener::new();

    bus.register_producer(&input);
    bus.register_listener(&gameplay);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        match event {
            WinitEvent::WindowEvent { event, .. } => match event {
                WinitWindowEvent::CloseRequested => {
                    input.emit(ThermiteWindowEvent::CloseRequested.into());
                    *control_flow = ControlFlow::Exit;
                }
                WinitWindowEvent::Resized(size) => {
                    input.emit(
                        ThermiteWindowEvent::Resized {
                            width: size.width,
                            height: size.height,
                        }
                        .into(),
                    );
                }
                WinitWindowEvent::KeyboardInput {
                    input: key_input, ..
                } => {
                    let evt = match key_input.state {
                        ElementState::Pressed => KeyboardEvent::KeyPressed(key_input.into()),
                        ElementState::Released => KeyboardEvent::KeyReleased(key_input.into()),
                    };
                    input.emit(evt.into());
                }
                WinitWindowEvent::ModifiersChanged(modifiers) => {
                    input.emit(KeyboardEvent::ModifiersChanged(modifiers.into()).into());
                }
                WinitWindowEvent::MouseInput { state, button, .. } => {
                    let evt = match state {
                        ElementState::Pressed => MouseEvent::ButtonPressed(button),
                        ElementState::Released => MouseEvent::ButtonReleased(button),
                    };
                    input.emit(evt.into());
                }
                WinitWindowEvent::MouseWheel { delta, .. } => {
                    input.emit(MouseEvent::Scroll(delta.into()).into());
                }
                WinitWindowEvent::CursorEntered { .. } => {
                    input.emit(MouseEvent::EnteredWindow.into());
                }
                WinitWindowEvent::CursorLeft { .. } => {
                    input.emit(MouseEvent::LeftWindow.into());
                }
                _ => (),
            },
            WinitEvent::MainEventsCleared => {
                // The owner-thread step: drain the bus queue into every
                // listener's own queue, then let each listener drain its own
                // queue on its own schedule.
                bus.communicate();
                gameplay.process_events();
                window.request_redraw();
            }
            _ => (),
        }
    });
}
