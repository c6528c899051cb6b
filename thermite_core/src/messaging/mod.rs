//! The concurrent event-communication core: per-event-family buses, the
//! producer/listener registration graph, and the dispatch fabric that
//! connects them. See the module-level docs on [`bus::ObserverBus`] for the
//! data flow.

mod dispatch;
mod queue;
mod registration;
mod token;

pub mod bus;
pub mod event;
pub mod listener;
pub mod producer;

pub use bus::ObserverBus;
pub use event::{ThermiteEvent, ThermiteEventKind};
pub use listener::{EventListener, ListenerState};
pub use producer::{EventProducer, ProducerState};
