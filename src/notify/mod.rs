//! Event Sink collaborator: inventory-event delivery to subscribers.

mod dispatcher;

pub use dispatcher::{DispatchResult, EventDispatcher, EventReceiver, EventSender};
