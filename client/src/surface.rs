use std::rc::Rc;

use thiserror::Error;

use crate::coords::{ContentSize, Offset, PopoverSide};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("surface error: {0}")]
pub struct SurfaceError(pub String);

#[derive(Clone, Debug, PartialEq)]
pub enum PinLabel {
    Rank(usize),
    Resolved,
}

impl PinLabel {
    pub fn text(&self) -> String {
        match self {
            PinLabel::Rank(rank) => rank.to_string(),
            PinLabel::Resolved => "\u{2713}".to_string(),
        }
    }
}

/// Everything a surface needs to draw one pin, already in overlay pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PinView {
    pub id: String,
    pub left: f64,
    pub top: f64,
    pub color: String,
    pub rank: usize,
    pub label: PinLabel,
    pub resolved: bool,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PopoverView {
    pub comment_id: String,
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub side: PopoverSide,
}

/// Engine callbacks a surface invokes from its native event listeners.
#[derive(Clone)]
pub struct SurfaceListeners {
    pub on_overlay_click: Rc<dyn Fn(Offset)>,
    pub on_pin_click: Rc<dyn Fn(&str)>,
    pub on_scroll: Rc<dyn Fn()>,
    pub on_resize: Rc<dyn Fn()>,
}

/// The rendering target an [`Annotator`](crate::Annotator) mounts onto.
///
/// Implementations own the overlay node and every pin node; the engine only describes
/// what should be visible. Callbacks in [`SurfaceListeners`] must not be invoked from
/// inside another `Surface` method.
pub trait Surface {
    fn is_attached(&self) -> bool;
    fn content_size(&self) -> ContentSize;
    fn scroll_offset(&self) -> Offset;
    /// Top-left corner of the content in client coordinates.
    fn overlay_origin(&self) -> Offset;
    fn viewport_width(&self) -> f64;

    fn attach_overlay(
        &self,
        size: ContentSize,
        listeners: SurfaceListeners,
    ) -> Result<(), SurfaceError>;
    /// Removes the overlay, every pin, the popover and all listeners. Must be idempotent.
    fn detach_overlay(&self);
    fn resize_overlay(&self, size: ContentSize);
    fn translate_overlay(&self, offset: Offset);
    fn set_click_capture(&self, enabled: bool);

    /// Runs `callback` on the next animation frame.
    fn request_frame(&self, callback: Box<dyn FnOnce()>);

    /// Draws a pin, replacing any existing node for the same id.
    fn draw_pin(&self, pin: &PinView);
    fn remove_pin(&self, id: &str);
    fn set_pin_active(&self, id: &str, active: bool);
    fn show_popover(&self, popover: &PopoverView);
    fn hide_popover(&self);
}
