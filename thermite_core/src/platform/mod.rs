//! Platform-level concerns that produce events for the messaging core. Only
//! the event payloads live here — window/surface creation is the embedding
//! application's concern (see `thermite`'s `src/main.rs`).

pub mod event;
