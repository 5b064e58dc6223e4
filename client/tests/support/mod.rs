#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use notepin_client::adapters::{MemoryAdapter, Operation};
use notepin_client::coords::{ContentSize, Offset};
use notepin_client::{
    AdapterError, Annotator, Comment, CommentAdapter, CommentPatch, EngineEvent, EventName,
    MountOptions, PinView, PopoverView, Surface, SurfaceError, SurfaceListeners,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Attach,
    Detach,
    Resize(ContentSize),
    Translate(Offset),
    Capture(bool),
    Draw(String),
    Remove(String),
    Active(String, bool),
    ShowPopover(String),
    HidePopover,
}

/// In-memory [`Surface`] that records every call. Frames run immediately unless
/// [`hold_frames`](Self::hold_frames) was called.
pub struct FakeSurface {
    connected: Cell<bool>,
    attached: Cell<bool>,
    size: Cell<ContentSize>,
    reflow: RefCell<VecDeque<ContentSize>>,
    scroll: Cell<Offset>,
    origin: Cell<Offset>,
    viewport_width: Cell<f64>,
    hold_frames: Cell<bool>,
    frames: RefCell<Vec<Box<dyn FnOnce()>>>,
    listeners: RefCell<Option<SurfaceListeners>>,
    pins: RefCell<HashMap<String, PinView>>,
    popover: RefCell<Option<PopoverView>>,
    capture: Cell<bool>,
    ops: RefCell<Vec<Op>>,
}

impl FakeSurface {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            connected: Cell::new(true),
            attached: Cell::new(false),
            size: Cell::new(ContentSize::new(1000.0, 2000.0)),
            reflow: RefCell::new(VecDeque::new()),
            scroll: Cell::new(Offset::default()),
            origin: Cell::new(Offset::default()),
            viewport_width: Cell::new(1600.0),
            hold_frames: Cell::new(false),
            frames: RefCell::new(Vec::new()),
            listeners: RefCell::new(None),
            pins: RefCell::new(HashMap::new()),
            popover: RefCell::new(None),
            capture: Cell::new(false),
            ops: RefCell::new(Vec::new()),
        })
    }

    pub fn detached() -> Rc<Self> {
        let surface = Self::new();
        surface.connected.set(false);
        surface
    }

    pub fn hold_frames(&self) {
        self.hold_frames.set(true);
    }

    /// Runs every queued frame callback; returns how many ran.
    pub fn run_frames(&self) -> usize {
        let frames: Vec<_> = self.frames.borrow_mut().drain(..).collect();
        let count = frames.len();
        for frame in frames {
            frame();
        }
        count
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn set_size(&self, size: ContentSize) {
        self.size.set(size);
    }

    /// Sizes returned by the next `content_size` calls before falling back to the fixed size.
    pub fn script_reflow(&self, sizes: &[ContentSize]) {
        self.reflow.borrow_mut().extend(sizes.iter().copied());
    }

    pub fn set_origin(&self, origin: Offset) {
        self.origin.set(origin);
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.viewport_width.set(width);
    }

    pub fn is_overlay_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn captures_clicks(&self) -> bool {
        self.capture.get()
    }

    pub fn pin(&self, id: &str) -> Option<PinView> {
        self.pins.borrow().get(id).cloned()
    }

    pub fn pin_count(&self) -> usize {
        self.pins.borrow().len()
    }

    pub fn popover(&self) -> Option<PopoverView> {
        self.popover.borrow().clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn draws(&self) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, Op::Draw(_)))
            .count()
    }

    fn listeners(&self) -> Option<SurfaceListeners> {
        self.listeners.borrow().clone()
    }

    pub fn click(&self, x: f64, y: f64) {
        if let Some(listeners) = self.listeners() {
            (listeners.on_overlay_click)(Offset::new(x, y));
        }
    }

    pub fn click_pin(&self, id: &str) {
        if let Some(listeners) = self.listeners() {
            (listeners.on_pin_click)(id);
        }
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        self.scroll.set(Offset::new(x, y));
        if let Some(listeners) = self.listeners() {
            (listeners.on_scroll)();
        }
    }

    pub fn resize(&self, size: ContentSize) {
        self.size.set(size);
        if let Some(listeners) = self.listeners() {
            (listeners.on_resize)();
        }
    }

    fn record(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }
}

impl Surface for FakeSurface {
    fn is_attached(&self) -> bool {
        self.connected.get()
    }

    fn content_size(&self) -> ContentSize {
        self.reflow
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.size.get())
    }

    fn scroll_offset(&self) -> Offset {
        self.scroll.get()
    }

    fn overlay_origin(&self) -> Offset {
        let origin = self.origin.get();
        let scroll = self.scroll.get();
        Offset::new(origin.x - scroll.x, origin.y - scroll.y)
    }

    fn viewport_width(&self) -> f64 {
        self.viewport_width.get()
    }

    fn attach_overlay(
        &self,
        _size: ContentSize,
        listeners: SurfaceListeners,
    ) -> Result<(), SurfaceError> {
        self.attached.set(true);
        *self.listeners.borrow_mut() = Some(listeners);
        self.record(Op::Attach);
        Ok(())
    }

    fn detach_overlay(&self) {
        self.attached.set(false);
        self.listeners.borrow_mut().take();
        self.pins.borrow_mut().clear();
        self.popover.borrow_mut().take();
        self.record(Op::Detach);
    }

    fn resize_overlay(&self, size: ContentSize) {
        self.record(Op::Resize(size));
    }

    fn translate_overlay(&self, offset: Offset) {
        self.record(Op::Translate(offset));
    }

    fn set_click_capture(&self, enabled: bool) {
        self.capture.set(enabled);
        self.record(Op::Capture(enabled));
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        if self.hold_frames.get() {
            self.frames.borrow_mut().push(callback);
        } else {
            callback();
        }
    }

    fn draw_pin(&self, pin: &PinView) {
        self.pins.borrow_mut().insert(pin.id.clone(), pin.clone());
        self.record(Op::Draw(pin.id.clone()));
    }

    fn remove_pin(&self, id: &str) {
        self.pins.borrow_mut().remove(id);
        self.record(Op::Remove(id.to_string()));
    }

    fn set_pin_active(&self, id: &str, active: bool) {
        if let Some(pin) = self.pins.borrow_mut().get_mut(id) {
            pin.active = active;
        }
        self.record(Op::Active(id.to_string(), active));
    }

    fn show_popover(&self, popover: &PopoverView) {
        *self.popover.borrow_mut() = Some(popover.clone());
        self.record(Op::ShowPopover(popover.comment_id.clone()));
    }

    fn hide_popover(&self) {
        self.popover.borrow_mut().take();
        self.record(Op::HidePopover);
    }
}

/// [`MemoryAdapter`] whose calls can be held open until released.
#[derive(Default)]
pub struct GatedAdapter {
    pub memory: MemoryAdapter,
    gates: RefCell<HashMap<Operation, oneshot::Receiver<()>>>,
}

impl GatedAdapter {
    pub fn with_comments(comments: Vec<Comment>) -> Self {
        Self {
            memory: MemoryAdapter::with_comments(comments),
            gates: RefCell::default(),
        }
    }

    /// Holds the next call to `operation` until the returned sender fires or is dropped.
    pub fn gate(&self, operation: Operation) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates.borrow_mut().insert(operation, receiver);
        sender
    }

    async fn wait(&self, operation: Operation) {
        let gate = self.gates.borrow_mut().remove(&operation);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

#[async_trait(?Send)]
impl CommentAdapter for GatedAdapter {
    async fn save(&self, comment: &Comment) -> Result<(), AdapterError> {
        self.wait(Operation::Save).await;
        self.memory.save(comment).await
    }

    async fn load(&self) -> Result<Vec<Comment>, AdapterError> {
        self.wait(Operation::Load).await;
        self.memory.load().await
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<(), AdapterError> {
        self.wait(Operation::Update).await;
        self.memory.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), AdapterError> {
        self.wait(Operation::Delete).await;
        self.memory.delete(id).await
    }
}

pub fn comment(id: &str, x: f64, y: f64, created_at: i64) -> Comment {
    Comment {
        id: id.to_string(),
        x,
        y,
        text: format!("note {id}"),
        color: None,
        resolved: None,
        created_at,
    }
}

/// Records every event published on `name`.
pub fn record(engine: &Annotator, name: EventName) -> Rc<RefCell<Vec<EngineEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    // Subscriptions live as long as the engine.
    let _ = engine.on(name, move |event| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });
    seen
}

pub fn mounted(adapter: Rc<dyn CommentAdapter>, options: MountOptions) -> (Annotator, Rc<FakeSurface>) {
    let engine = Annotator::new(adapter);
    let surface = FakeSurface::new();
    futures::executor::block_on(engine.mount(surface.clone(), options))
        .expect("mount succeeds");
    (engine, surface)
}
