use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, HtmlIFrameElement, MouseEvent,
    ResizeObserver, Window,
};

use crate::coords::{ContentSize, Offset, PopoverSide, PIN_SIZE, POPOVER_WIDTH};
use crate::surface::{PinView, PopoverView, Surface, SurfaceError, SurfaceListeners};

pub const ATTR_COMMENT_ID: &str = "data-comment-id";
pub const ATTR_PIN_INDEX: &str = "data-pin-index";
pub const ATTR_ACTIVE: &str = "data-active";
pub const ATTR_RESOLVED: &str = "data-resolved";

const OVERLAY_CLASS: &str = "notepin-overlay";
const LAYER_CLASS: &str = "notepin-layer";
const PIN_CLASS: &str = "notepin-pin";
const POPOVER_CLASS: &str = "notepin-popover";

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn add(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }

    fn remove(&self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
    }
}

/// Reports size changes of the framed document, which reflows without any window event.
struct ContentObserver {
    observer: ResizeObserver,
    _callback: Closure<dyn FnMut()>,
}

impl ContentObserver {
    fn new(on_resize: Rc<dyn Fn()>) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut()>::new(move || on_resize());
        let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

/// Points `observer` at the current content root. A frame swaps its document on every load.
fn observe_content(observer: &ResizeObserver, target: &HtmlElement) {
    observer.disconnect();
    let document = target
        .dyn_ref::<HtmlIFrameElement>()
        .and_then(HtmlIFrameElement::content_document);
    match document {
        Some(document) => {
            if let Some(root) = document.document_element() {
                observer.observe(&root);
            }
            if let Some(body) = document.body() {
                observer.observe(&body);
            }
        }
        None => observer.observe(target),
    }
}

struct Overlay {
    root: HtmlElement,
    layer: HtmlElement,
    pins: HashMap<String, HtmlElement>,
    popover: Option<HtmlElement>,
    listeners: Vec<Listener>,
    content: ContentObserver,
}

/// [`Surface`] over a live DOM element, typically a sandboxed `<iframe>` showing the
/// annotated page. The overlay is inserted as a sibling of the target, so the target's
/// parent becomes the positioning context.
pub struct DomSurface {
    window: Window,
    document: Document,
    target: HtmlElement,
    overlay: RefCell<Option<Overlay>>,
}

impl DomSurface {
    pub fn new(target: HtmlElement) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
        let document = target
            .owner_document()
            .ok_or_else(|| JsValue::from_str("Missing document"))?;
        Ok(Self {
            window,
            document,
            target,
            overlay: RefCell::new(None),
        })
    }

    fn frame(&self) -> Option<&HtmlIFrameElement> {
        self.target.dyn_ref::<HtmlIFrameElement>()
    }

    fn frame_document(&self) -> Option<Document> {
        self.frame().and_then(HtmlIFrameElement::content_document)
    }

    fn scroll_source(&self) -> EventTarget {
        self.frame()
            .and_then(HtmlIFrameElement::content_window)
            .map(EventTarget::from)
            .unwrap_or_else(|| self.target.clone().into())
    }

    fn create_div(&self, class: &str) -> Result<HtmlElement, JsValue> {
        let element = self
            .document
            .create_element("div")?
            .dyn_into::<HtmlElement>()
            .map_err(|_| JsValue::from_str("Invalid element type: div"))?;
        element.set_class_name(class);
        Ok(element)
    }

    fn sync_root_geometry(&self, root: &HtmlElement) {
        set_styles(
            root,
            &[
                ("left", &px(f64::from(self.target.offset_left()))),
                ("top", &px(f64::from(self.target.offset_top()))),
                ("width", &px(f64::from(self.target.client_width()))),
                ("height", &px(f64::from(self.target.client_height()))),
            ],
        );
    }

    fn ensure_positioned_parent(&self, parent: &Element) {
        let Some(parent) = parent.dyn_ref::<HtmlElement>() else {
            return;
        };
        let position = self
            .window
            .get_computed_style(parent)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value("position").ok())
            .unwrap_or_default();
        if position.is_empty() || position == "static" {
            let _ = parent.style().set_property("position", "relative");
        }
    }

    fn build_overlay(
        &self,
        size: ContentSize,
        listeners: SurfaceListeners,
    ) -> Result<Overlay, JsValue> {
        let parent = self
            .target
            .parent_element()
            .ok_or_else(|| JsValue::from_str("Mount target has no parent element"))?;
        self.ensure_positioned_parent(&parent);

        let root = self.create_div(OVERLAY_CLASS)?;
        set_styles(
            &root,
            &[
                ("position", "absolute"),
                ("overflow", "hidden"),
                ("pointer-events", "none"),
                ("z-index", "2147483000"),
            ],
        );
        self.sync_root_geometry(&root);

        let layer = self.create_div(LAYER_CLASS)?;
        set_styles(
            &layer,
            &[
                ("position", "absolute"),
                ("left", "0"),
                ("top", "0"),
                ("width", &px(size.width)),
                ("height", &px(size.height)),
                ("will-change", "transform"),
            ],
        );
        root.append_child(&layer)?;

        let mut handles = Vec::new();
        {
            let on_pin_click = listeners.on_pin_click.clone();
            handles.push(Listener::add(&layer, "click", move |event: Event| {
                let Some(element) = event
                    .target()
                    .and_then(|target| target.dyn_into::<Element>().ok())
                else {
                    return;
                };
                if let Ok(Some(_)) = element.closest(&format!(".{POPOVER_CLASS}")) {
                    event.stop_propagation();
                    return;
                }
                if let Ok(Some(pin)) = element.closest(&format!("[{ATTR_COMMENT_ID}]")) {
                    event.stop_propagation();
                    if let Some(id) = pin.get_attribute(ATTR_COMMENT_ID) {
                        on_pin_click(&id);
                    }
                }
            })?);
        }
        {
            let on_overlay_click = listeners.on_overlay_click.clone();
            handles.push(Listener::add(&root, "click", move |event: Event| {
                if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
                    event.prevent_default();
                    on_overlay_click(Offset::new(
                        f64::from(mouse.client_x()),
                        f64::from(mouse.client_y()),
                    ));
                }
            })?);
        }
        {
            let on_scroll = listeners.on_scroll.clone();
            handles.push(Listener::add(&self.scroll_source(), "scroll", move |_| {
                on_scroll();
            })?);
        }
        {
            let on_resize = listeners.on_resize.clone();
            handles.push(Listener::add(&self.window, "resize", move |_| on_resize())?);
        }
        let content = ContentObserver::new(listeners.on_resize.clone())?;
        observe_content(&content.observer, &self.target);
        if self.frame().is_some() {
            let on_resize = listeners.on_resize.clone();
            let observer = content.observer.clone();
            let target = self.target.clone();
            handles.push(Listener::add(&self.target, "load", move |_| {
                observe_content(&observer, &target);
                on_resize();
            })?);
        }

        parent.append_child(&root)?;
        Ok(Overlay {
            root,
            layer,
            pins: HashMap::new(),
            popover: None,
            listeners: handles,
            content,
        })
    }

    fn build_pin(&self, pin: &PinView) -> Result<HtmlElement, JsValue> {
        let element = self.create_div(PIN_CLASS)?;
        element.set_attribute(ATTR_COMMENT_ID, &pin.id)?;
        element.set_attribute(ATTR_PIN_INDEX, &pin.rank.to_string())?;
        element.set_attribute(ATTR_ACTIVE, bool_attr(pin.active))?;
        element.set_attribute(ATTR_RESOLVED, bool_attr(pin.resolved))?;
        element.set_attribute("role", "button")?;
        element.set_attribute("aria-label", &format!("Comment {}", pin.rank))?;
        element.set_text_content(Some(&pin.label.text()));
        set_styles(
            &element,
            &[
                ("position", "absolute"),
                ("left", &px(pin.left - PIN_SIZE / 2.0)),
                ("top", &px(pin.top - PIN_SIZE / 2.0)),
                ("width", &px(PIN_SIZE)),
                ("height", &px(PIN_SIZE)),
                ("border-radius", "50% 50% 50% 0"),
                ("background", &pin.color),
                ("color", "#fff"),
                ("display", "flex"),
                ("align-items", "center"),
                ("justify-content", "center"),
                ("font", "600 12px/1 system-ui, sans-serif"),
                ("box-shadow", "0 2px 6px rgba(0, 0, 0, 0.3)"),
                ("cursor", "pointer"),
                ("pointer-events", "auto"),
                ("user-select", "none"),
            ],
        );
        if pin.resolved {
            let _ = element.style().set_property("opacity", "0.6");
        }
        set_active_style(&element, pin.active);
        Ok(element)
    }

    fn build_popover(&self, view: &PopoverView) -> Result<HtmlElement, JsValue> {
        let element = self.create_div(POPOVER_CLASS)?;
        element.set_attribute("data-popover-for", &view.comment_id)?;
        element.set_attribute(
            "data-side",
            match view.side {
                PopoverSide::Right => "right",
                PopoverSide::Left => "left",
            },
        )?;
        element.set_attribute("role", "dialog")?;
        element.set_text_content(Some(&view.text));
        set_styles(
            &element,
            &[
                ("position", "absolute"),
                ("left", &px(view.left)),
                ("top", &px(view.top)),
                ("width", &px(POPOVER_WIDTH)),
                ("box-sizing", "border-box"),
                ("padding", "10px 12px"),
                ("border-radius", "8px"),
                ("background", "#fff"),
                ("color", "#1f1f1f"),
                ("font", "13px/1.4 system-ui, sans-serif"),
                ("white-space", "pre-wrap"),
                ("box-shadow", "0 6px 20px rgba(0, 0, 0, 0.2)"),
                ("pointer-events", "auto"),
            ],
        );
        Ok(element)
    }
}

impl Surface for DomSurface {
    fn is_attached(&self) -> bool {
        self.target.is_connected()
    }

    fn content_size(&self) -> ContentSize {
        if let Some(root) = self
            .frame_document()
            .and_then(|document| document.document_element())
        {
            return ContentSize::new(
                f64::from(root.scroll_width()),
                f64::from(root.scroll_height()),
            );
        }
        ContentSize::new(
            f64::from(self.target.scroll_width()),
            f64::from(self.target.scroll_height()),
        )
    }

    fn scroll_offset(&self) -> Offset {
        if let Some(window) = self.frame().and_then(HtmlIFrameElement::content_window) {
            return Offset::new(
                window.scroll_x().unwrap_or_default(),
                window.scroll_y().unwrap_or_default(),
            );
        }
        Offset::new(
            f64::from(self.target.scroll_left()),
            f64::from(self.target.scroll_top()),
        )
    }

    fn overlay_origin(&self) -> Offset {
        if let Some(overlay) = self.overlay.borrow().as_ref() {
            let rect = overlay.layer.get_bounding_client_rect();
            return Offset::new(rect.left(), rect.top());
        }
        let rect = self.target.get_bounding_client_rect();
        let scroll = self.scroll_offset();
        Offset::new(rect.left() - scroll.x, rect.top() - scroll.y)
    }

    fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or_default()
    }

    fn attach_overlay(
        &self,
        size: ContentSize,
        listeners: SurfaceListeners,
    ) -> Result<(), SurfaceError> {
        self.detach_overlay();
        let overlay = self
            .build_overlay(size, listeners)
            .map_err(|error| SurfaceError(crate::util::js_error_message(&error)))?;
        *self.overlay.borrow_mut() = Some(overlay);
        Ok(())
    }

    fn detach_overlay(&self) {
        let Some(overlay) = self.overlay.borrow_mut().take() else {
            return;
        };
        overlay.content.observer.disconnect();
        for listener in &overlay.listeners {
            listener.remove();
        }
        overlay.root.remove();
    }

    fn resize_overlay(&self, size: ContentSize) {
        if let Some(overlay) = self.overlay.borrow().as_ref() {
            self.sync_root_geometry(&overlay.root);
            set_styles(
                &overlay.layer,
                &[("width", &px(size.width)), ("height", &px(size.height))],
            );
        }
    }

    fn translate_overlay(&self, offset: Offset) {
        if let Some(overlay) = self.overlay.borrow().as_ref() {
            let _ = overlay.layer.style().set_property(
                "transform",
                &format!("translate({}px, {}px)", offset.x, offset.y),
            );
        }
    }

    fn set_click_capture(&self, enabled: bool) {
        if let Some(overlay) = self.overlay.borrow().as_ref() {
            let (events, cursor) = if enabled {
                ("auto", "crosshair")
            } else {
                ("none", "default")
            };
            set_styles(&overlay.root, &[("pointer-events", events), ("cursor", cursor)]);
        }
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        let frame = Closure::once_into_js(move || callback());
        if let Err(error) = self.window.request_animation_frame(frame.unchecked_ref()) {
            log::error!(
                "requestAnimationFrame failed: {}",
                crate::util::js_error_message(&error)
            );
        }
    }

    fn draw_pin(&self, pin: &PinView) {
        let mut overlay = self.overlay.borrow_mut();
        let Some(overlay) = overlay.as_mut() else {
            return;
        };
        let element = match self.build_pin(pin) {
            Ok(element) => element,
            Err(error) => {
                log::error!(
                    "failed to draw pin {}: {}",
                    pin.id,
                    crate::util::js_error_message(&error)
                );
                return;
            }
        };
        if let Some(previous) = overlay.pins.remove(&pin.id) {
            previous.remove();
        }
        let inserted = match &overlay.popover {
            Some(popover) => {
                let before: &web_sys::Node = popover;
                overlay.layer.insert_before(&element, Some(before))
            }
            None => overlay.layer.append_child(&element),
        };
        if inserted.is_ok() {
            overlay.pins.insert(pin.id.clone(), element);
        }
    }

    fn remove_pin(&self, id: &str) {
        if let Some(overlay) = self.overlay.borrow_mut().as_mut() {
            if let Some(element) = overlay.pins.remove(id) {
                element.remove();
            }
        }
    }

    fn set_pin_active(&self, id: &str, active: bool) {
        if let Some(overlay) = self.overlay.borrow().as_ref() {
            if let Some(element) = overlay.pins.get(id) {
                let _ = element.set_attribute(ATTR_ACTIVE, bool_attr(active));
                set_active_style(element, active);
            }
        }
    }

    fn show_popover(&self, view: &PopoverView) {
        let mut overlay = self.overlay.borrow_mut();
        let Some(overlay) = overlay.as_mut() else {
            return;
        };
        if let Some(previous) = overlay.popover.take() {
            previous.remove();
        }
        match self.build_popover(view) {
            Ok(element) => {
                if overlay.layer.append_child(&element).is_ok() {
                    overlay.popover = Some(element);
                }
            }
            Err(error) => log::error!(
                "failed to open popover: {}",
                crate::util::js_error_message(&error)
            ),
        }
    }

    fn hide_popover(&self) {
        if let Some(overlay) = self.overlay.borrow_mut().as_mut() {
            if let Some(popover) = overlay.popover.take() {
                popover.remove();
            }
        }
    }
}

fn px(value: f64) -> String {
    format!("{value}px")
}

fn bool_attr(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) {
    let style = element.style();
    for (name, value) in styles {
        let _ = style.set_property(name, value);
    }
}

fn set_active_style(element: &HtmlElement, active: bool) {
    let (transform, outline) = if active {
        ("scale(1.15)", "2px solid #1f1f1f")
    } else {
        ("none", "none")
    };
    set_styles(element, &[("transform", transform), ("outline", outline)]);
}
