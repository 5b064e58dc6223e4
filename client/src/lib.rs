//! Comment pins over an embedded page.
//!
//! [`Annotator`] is the engine; it draws onto any [`Surface`]. [`DomSurface`] renders
//! into the browser DOM and [`Notepin`] exposes the whole thing to JavaScript.

mod adapter;
pub mod adapters;
mod bindings;
pub mod coords;
mod dom;
mod engine;
mod error;
mod events;
mod mode;
mod mount;
mod pins;
mod store;
mod surface;
mod util;

pub use adapter::{AdapterError, CommentAdapter};
pub use bindings::Notepin;
pub use dom::{DomSurface, ATTR_ACTIVE, ATTR_COMMENT_ID, ATTR_PIN_INDEX, ATTR_RESOLVED};
pub use engine::Annotator;
pub use error::{EngineError, MountError};
pub use events::{
    EngineEvent, ErrorKind, EventName, HandlerError, HandlerResult, Subscription, UnknownEvent,
};
pub use mount::{MountOptions, STABILIZE_MAX_FRAMES};
pub use surface::{PinLabel, PinView, PopoverView, Surface, SurfaceError, SurfaceListeners};

pub use notepin_shared::{
    Comment, CommentPatch, Mode, NewComment, ValidationError, DEFAULT_COLOR, PALETTE,
};
