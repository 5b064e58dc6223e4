use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use notepin_shared::{Comment, CommentPatch, Mode};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    PinPlaced,
    CommentCreated,
    CommentUpdated,
    CommentDeleted,
    CommentClicked,
    ModeChanged,
    Error,
}

impl EventName {
    pub const ALL: [EventName; 7] = [
        EventName::PinPlaced,
        EventName::CommentCreated,
        EventName::CommentUpdated,
        EventName::CommentDeleted,
        EventName::CommentClicked,
        EventName::ModeChanged,
        EventName::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::PinPlaced => "pin:placed",
            EventName::CommentCreated => "comment:created",
            EventName::CommentUpdated => "comment:updated",
            EventName::CommentDeleted => "comment:deleted",
            EventName::CommentClicked => "comment:clicked",
            EventName::ModeChanged => "mode:changed",
            EventName::Error => "error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventName {
    type Err = UnknownEvent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| UnknownEvent(value.to_string()))
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Load,
}

/// Payloads of every event the engine publishes. Serializes to the bare payload object.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum EngineEvent {
    PinPlaced {
        x: f64,
        y: f64,
    },
    CommentCreated(Comment),
    CommentUpdated {
        id: String,
        updates: CommentPatch,
    },
    CommentDeleted {
        id: String,
    },
    CommentClicked {
        comment: Comment,
    },
    ModeChanged {
        mode: Mode,
        #[serde(rename = "previousMode")]
        previous_mode: Mode,
    },
    Error {
        #[serde(rename = "type")]
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> EventName {
        match self {
            EngineEvent::PinPlaced { .. } => EventName::PinPlaced,
            EngineEvent::CommentCreated(_) => EventName::CommentCreated,
            EngineEvent::CommentUpdated { .. } => EventName::CommentUpdated,
            EngineEvent::CommentDeleted { .. } => EventName::CommentDeleted,
            EngineEvent::CommentClicked { .. } => EventName::CommentClicked,
            EngineEvent::ModeChanged { .. } => EventName::ModeChanged,
            EngineEvent::Error { .. } => EventName::Error,
        }
    }
}

/// Failure reported by an event handler. The bus logs it and moves on to the next handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

type Handler = Rc<dyn Fn(&EngineEvent) -> HandlerResult>;

#[derive(Default)]
struct Channels {
    handlers: RefCell<HashMap<EventName, Vec<(u64, Handler)>>>,
    next_id: Cell<u64>,
}

/// Named-channel publish/subscribe. Handlers run synchronously in registration order.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Rc<Channels>,
}

/// Handle returned by [`EventBus::on`]. Dropping it keeps the handler registered.
pub struct Subscription {
    channels: Weak<Channels>,
    name: EventName,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let Some(channels) = self.channels.upgrade() else {
            return;
        };
        let mut handlers = channels.handlers.borrow_mut();
        if let Some(list) = handlers.get_mut(&self.name) {
            list.retain(|(id, _)| *id != self.id);
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        name: EventName,
        handler: impl Fn(&EngineEvent) -> HandlerResult + 'static,
    ) -> Subscription {
        let id = self.channels.next_id.get();
        self.channels.next_id.set(id + 1);
        self.channels
            .handlers
            .borrow_mut()
            .entry(name)
            .or_default()
            .push((id, Rc::new(handler)));
        Subscription {
            channels: Rc::downgrade(&self.channels),
            name,
            id,
        }
    }

    /// Delivers `event` to the handlers registered at the moment of the call. A handler that
    /// returns `Err` is logged and the rest still run. Panics are caught the same way, but
    /// only where panics unwind; `wasm32-unknown-unknown` aborts on panic.
    pub fn emit(&self, event: EngineEvent) {
        let name = event.name();
        let handlers: Vec<Handler> = self
            .channels
            .handlers
            .borrow()
            .get(&name)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => log::error!("{name} handler failed: {error}"),
                Err(panic) => log::error!("{name} handler panicked: {}", panic_message(&panic)),
            }
        }
    }

    #[cfg(test)]
    fn listener_count(&self, name: EventName) -> usize {
        self.channels
            .handlers
            .borrow()
            .get(&name)
            .map_or(0, Vec::len)
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn placed(x: f64) -> EngineEvent {
        EngineEvent::PinPlaced { x, y: 0.0 }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            bus.on(EventName::PinPlaced, move |_| {
                seen.borrow_mut().push(tag);
                Ok(())
            });
        }
        bus.emit(placed(1.0));
        assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn events_only_reach_their_channel() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        bus.on(EventName::CommentDeleted, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        bus.emit(placed(1.0));
        bus.emit(EngineEvent::CommentDeleted { id: "x".into() });
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = {
            let seen = seen.clone();
            bus.on(EventName::PinPlaced, move |_| {
                seen.borrow_mut().push(1);
                Ok(())
            })
        };
        {
            let seen = seen.clone();
            bus.on(EventName::PinPlaced, move |_| {
                seen.borrow_mut().push(2);
                Ok(())
            });
        }
        first.unsubscribe();
        bus.emit(placed(1.0));
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(bus.listener_count(EventName::PinPlaced), 1);
    }

    #[test]
    fn failing_handler_does_not_stop_the_others() {
        let bus = EventBus::new();
        let reached = Rc::new(Cell::new(0));
        bus.on(EventName::PinPlaced, |_| Err(HandlerError::new("consumer bug")));
        let counter = reached.clone();
        bus.on(EventName::PinPlaced, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        bus.emit(placed(1.0));
        bus.emit(placed(2.0));
        assert_eq!(reached.get(), 2);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_others() {
        let bus = EventBus::new();
        let reached = Rc::new(Cell::new(false));
        bus.on(EventName::PinPlaced, |_| panic!("consumer bug"));
        let flag = reached.clone();
        bus.on(EventName::PinPlaced, move |_| {
            flag.set(true);
            Ok(())
        });
        bus.emit(placed(1.0));
        assert!(reached.get());
    }

    #[test]
    fn handler_may_subscribe_during_emit() {
        let bus = EventBus::new();
        let late_calls = Rc::new(Cell::new(0));
        let bus_in_handler = bus.clone();
        let late = late_calls.clone();
        bus.on(EventName::PinPlaced, move |_| {
            let late = late.clone();
            bus_in_handler.on(EventName::PinPlaced, move |_| {
                late.set(late.get() + 1);
                Ok(())
            });
            Ok(())
        });
        bus.emit(placed(1.0));
        assert_eq!(late_calls.get(), 0);
        bus.emit(placed(2.0));
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn event_names_round_trip_through_strings() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>(), Ok(name));
        }
        assert!("comment:moved".parse::<EventName>().is_err());
    }

    #[test]
    fn payloads_serialize_without_tags() {
        let value = serde_json::to_value(EngineEvent::ModeChanged {
            mode: Mode::Annotate,
            previous_mode: Mode::View,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "mode": "annotate", "previousMode": "view" })
        );
        let value = serde_json::to_value(EngineEvent::Error {
            kind: ErrorKind::Load,
            message: "offline".into(),
            error: None,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "type": "load", "message": "offline" })
        );
    }
}
