use std::cell::RefCell;
use std::rc::{Rc, Weak};

use notepin_shared::{
    validate_position, validate_text, Comment, CommentPatch, Mode, NewComment,
};

use crate::adapter::CommentAdapter;
use crate::coords::{click_to_percent, ContentSize, Offset, ScrollThrottle, ThrottleDecision};
use crate::error::{EngineError, MountError};
use crate::events::{EngineEvent, ErrorKind, EventBus, EventName, HandlerResult, Subscription};
use crate::mode::{ModeMachine, Transition};
use crate::mount::{stabilize_content, CancelToken, Generation, MountOptions};
use crate::pins::{rank_of, PinRenderer, Viewport};
use crate::store::CommentStore;
use crate::surface::{Surface, SurfaceListeners};
use crate::util::{make_id, now_ms};

struct Session {
    surface: Rc<dyn Surface>,
    options: MountOptions,
    size: ContentSize,
    token: CancelToken,
    ready: bool,
}

struct Inner {
    adapter: Rc<dyn CommentAdapter>,
    bus: EventBus,
    generation: Generation,
    session: RefCell<Option<Session>>,
    store: RefCell<CommentStore>,
    pins: RefCell<PinRenderer>,
    mode: RefCell<ModeMachine>,
    throttle: RefCell<ScrollThrottle>,
}

/// The annotation engine: one overlay, one comment cache, one event bus.
///
/// Cloning is cheap and every clone drives the same engine. All state lives behind
/// `RefCell`s that are never held across an `.await` or while events are delivered, so
/// handlers may call back into the engine.
#[derive(Clone)]
pub struct Annotator {
    inner: Rc<Inner>,
}

impl Annotator {
    pub fn new(adapter: Rc<dyn CommentAdapter>) -> Self {
        Self {
            inner: Rc::new(Inner {
                adapter,
                bus: EventBus::new(),
                generation: Generation::default(),
                session: RefCell::new(None),
                store: RefCell::new(CommentStore::default()),
                pins: RefCell::new(PinRenderer::default()),
                mode: RefCell::new(ModeMachine::default()),
                throttle: RefCell::new(ScrollThrottle::default()),
            }),
        }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Attaches the overlay to `surface`, waits for the content to stop reflowing, then
    /// loads and draws the stored comments.
    ///
    /// Misuse fails before anything is attached. A failing adapter `load` does not fail
    /// the mount; it is reported as an `error` event and the layer starts empty. If
    /// [`unmount`](Self::unmount) runs while this is pending, the remaining work is
    /// abandoned and `Ok(())` is returned.
    pub async fn mount(
        &self,
        surface: Rc<dyn Surface>,
        options: MountOptions,
    ) -> Result<(), EngineError> {
        if self.inner.session.borrow().is_some() {
            return Err(MountError::AlreadyMounted.into());
        }
        if !surface.is_attached() {
            return Err(MountError::DetachedTarget.into());
        }

        let token = self.inner.generation.token();
        let size = surface.content_size();
        surface.attach_overlay(size, self.listeners())?;
        *self.inner.session.borrow_mut() = Some(Session {
            surface: surface.clone(),
            options,
            size,
            token: token.clone(),
            ready: false,
        });
        let forced = self.inner.mode.borrow_mut().set_read_only(options.read_only);
        surface.set_click_capture(self.inner.mode.borrow().captures_clicks());
        if let Some(transition) = forced {
            self.emit_mode_changed(transition);
        }
        log::debug!(
            "overlay attached (generation {}, read_only={}, builtin_dialog={})",
            token.generation(),
            options.read_only,
            !options.disable_builtin_dialog
        );

        let Some(size) = stabilize_content(&surface, &token).await else {
            log::debug!("mount abandoned during content stabilization");
            return Ok(());
        };
        if let Some(session) = self.inner.session.borrow_mut().as_mut() {
            session.size = size;
        }
        surface.resize_overlay(size);
        self.apply_scroll();

        let loaded = self.inner.adapter.load().await;
        if token.is_cancelled() {
            log::debug!("mount abandoned after load; discarding result");
            return Ok(());
        }
        match loaded {
            Ok(comments) => {
                let total = comments.len();
                let skipped = self.inner.store.borrow_mut().load(comments);
                log::debug!("loaded {} comments ({skipped} skipped)", total - skipped);
            }
            Err(error) => {
                log::error!("failed to load comments: {error}");
                self.inner.store.borrow_mut().clear();
                self.inner.bus.emit(EngineEvent::Error {
                    kind: ErrorKind::Load,
                    message: "Failed to load comments".to_string(),
                    error: Some(error.to_string()),
                });
            }
        }
        if let Some(session) = self.inner.session.borrow_mut().as_mut() {
            session.ready = true;
        }
        self.render_all();
        Ok(())
    }

    /// Detaches the overlay and drops every cached comment. Safe to call repeatedly.
    pub fn unmount(&self) {
        let Some(session) = self.inner.session.borrow_mut().take() else {
            return;
        };
        self.inner.generation.advance();
        self.inner.store.borrow_mut().clear();
        self.inner.pins.borrow_mut().clear();
        *self.inner.throttle.borrow_mut() = ScrollThrottle::default();
        self.inner.mode.borrow_mut().set_read_only(false);
        session.surface.detach_overlay();
        log::debug!("overlay detached (generation {})", session.token.generation());
    }

    pub fn is_mounted(&self) -> bool {
        self.inner
            .session
            .borrow()
            .as_ref()
            .is_some_and(|session| session.ready)
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode.borrow().mode()
    }

    /// Switches between `view` and `annotate`. Parse untrusted names with
    /// [`Mode::from_str`](std::str::FromStr) to get the validation error for unknown values.
    pub fn set_mode(&self, target: Mode) -> Result<(), EngineError> {
        if self.mode() == target {
            return Ok(());
        }
        let transition = self.inner.mode.borrow_mut().transition(target)?;
        if let Some(surface) = self.surface() {
            surface.set_click_capture(target == Mode::Annotate);
        }
        self.emit_mode_changed(transition);
        Ok(())
    }

    /// Caches and draws the comment before saving it, and rolls both back if the save fails.
    /// When the engine is unmounted mid-save the returned comment is not cached or drawn.
    pub async fn add_comment(&self, input: NewComment) -> Result<Comment, EngineError> {
        validate_text(&input.text)?;
        validate_position(input.x, input.y)?;
        let token = self.require_ready()?;

        let comment = Comment {
            id: self.unused_id(),
            x: input.x,
            y: input.y,
            text: input.text,
            color: input.color,
            resolved: input.resolved,
            created_at: now_ms(),
        };
        self.inner.store.borrow_mut().insert(comment.clone());
        self.render_comment(&comment.id);

        let saved = self.inner.adapter.save(&comment).await;
        if token.is_cancelled() {
            log::warn!("unmounted while saving comment {}; result discarded", comment.id);
            return saved
                .map(|()| comment)
                .map_err(|error| EngineError::persistence("save", error));
        }
        if let Err(error) = saved {
            log::debug!("rolling back comment {} after failed save", comment.id);
            self.inner.store.borrow_mut().remove(&comment.id);
            self.remove_pin(&comment.id);
            self.sync_pins();
            return Err(EngineError::persistence("save", error));
        }
        self.inner
            .bus
            .emit(EngineEvent::CommentCreated(comment.clone()));
        Ok(comment)
    }

    /// Persists `patch` first and only then merges it into the cache, so a failed update
    /// leaves the cache untouched.
    pub async fn update_comment(
        &self,
        id: &str,
        patch: CommentPatch,
    ) -> Result<Comment, EngineError> {
        let token = self.require_ready()?;
        let current = self
            .inner
            .store
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if patch.touches_position() {
            validate_position(current.x, current.y)?;
            validate_position(patch.x.unwrap_or(current.x), patch.y.unwrap_or(current.y))?;
        }
        if let Some(text) = &patch.text {
            validate_text(text)?;
        }

        self.inner
            .adapter
            .update(id, &patch)
            .await
            .map_err(|error| EngineError::persistence("update", error))?;
        if token.is_cancelled() {
            log::warn!("unmounted while updating comment {id}; result discarded");
            let mut merged = current;
            merged.apply(&patch);
            return Ok(merged);
        }

        let applied = self.inner.store.borrow_mut().apply(id, &patch);
        let Some((before, after)) = applied else {
            return Err(EngineError::NotFound(id.to_string()));
        };
        if patch.changes_pin(&before) {
            self.refresh_pin(&after);
        }
        self.refresh_popover(&after);
        self.inner.bus.emit(EngineEvent::CommentUpdated {
            id: id.to_string(),
            updates: patch,
        });
        Ok(after)
    }

    pub async fn delete_comment(&self, id: &str) -> Result<(), EngineError> {
        let token = self.require_ready()?;
        if !self.inner.store.borrow().contains(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }

        self.inner
            .adapter
            .delete(id)
            .await
            .map_err(|error| EngineError::persistence("delete", error))?;
        if token.is_cancelled() {
            log::warn!("unmounted while deleting comment {id}; result discarded");
            return Ok(());
        }

        let removed = self.inner.store.borrow_mut().remove(id);
        if removed.is_none() {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.remove_pin(id);
        self.render_all();
        self.inner
            .bus
            .emit(EngineEvent::CommentDeleted { id: id.to_string() });
        Ok(())
    }

    /// Copies of the cached comments in cache order.
    pub fn comments(&self) -> Vec<Comment> {
        self.inner.store.borrow().snapshot()
    }

    /// Registers `handler` on `name`. An `Err` from the handler is logged and does not reach
    /// the engine or the other handlers.
    pub fn on(
        &self,
        name: EventName,
        handler: impl Fn(&EngineEvent) -> HandlerResult + 'static,
    ) -> Subscription {
        self.inner.bus.on(name, handler)
    }

    /// Current 1-based creation-order rank of a cached comment.
    pub fn pin_rank(&self, id: &str) -> Option<usize> {
        rank_of(self.inner.store.borrow().as_slice(), id)
    }

    pub fn active_pin(&self) -> Option<String> {
        self.inner.pins.borrow().active().map(str::to_string)
    }

    /// Marks `id` as the active pin and opens its popover unless the mount disabled the
    /// built-in dialog. Does not emit `comment:clicked`.
    pub fn select_pin(&self, id: &str) -> Result<(), EngineError> {
        self.require_ready()?;
        let comment = self
            .inner
            .store
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.activate(&comment);
        Ok(())
    }

    pub fn close_popover(&self) {
        if let Some(surface) = self.surface() {
            self.inner.pins.borrow_mut().deactivate(surface.as_ref());
        }
    }

    fn listeners(&self) -> SurfaceListeners {
        let on_click = self.downgrade();
        let on_pin = self.downgrade();
        let on_scroll = self.downgrade();
        let on_resize = self.downgrade();
        SurfaceListeners {
            on_overlay_click: Rc::new(move |click| {
                if let Some(engine) = Self::upgrade(&on_click) {
                    engine.handle_overlay_click(click);
                }
            }),
            on_pin_click: Rc::new(move |id| {
                if let Some(engine) = Self::upgrade(&on_pin) {
                    engine.handle_pin_click(id);
                }
            }),
            on_scroll: Rc::new(move || {
                if let Some(engine) = Self::upgrade(&on_scroll) {
                    engine.handle_scroll();
                }
            }),
            on_resize: Rc::new(move || {
                if let Some(engine) = Self::upgrade(&on_resize) {
                    engine.handle_resize();
                }
            }),
        }
    }

    fn handle_overlay_click(&self, click: Offset) {
        if self.mode() != Mode::Annotate {
            return;
        }
        let Some((surface, known)) = self.surface_and_size() else {
            return;
        };
        let current = surface.content_size();
        let size = if current.is_empty() || current == known {
            known
        } else {
            log::debug!("content resized without notice; rescaling before placing pin");
            self.apply_size(surface.as_ref(), current);
            current
        };
        let (x, y) = click_to_percent(click, surface.overlay_origin(), size);
        self.inner.pins.borrow_mut().deactivate(surface.as_ref());
        self.inner.bus.emit(EngineEvent::PinPlaced { x, y });
    }

    fn handle_pin_click(&self, id: &str) {
        let comment = self.inner.store.borrow().get(id).cloned();
        let Some(comment) = comment else {
            log::warn!("click on unknown pin {id}");
            return;
        };
        self.activate(&comment);
        self.inner
            .bus
            .emit(EngineEvent::CommentClicked { comment });
    }

    fn handle_scroll(&self) {
        let Some(surface) = self.surface() else {
            return;
        };
        let decision = self.inner.throttle.borrow_mut().on_event(now_ms() as f64);
        match decision {
            ThrottleDecision::Run => self.apply_scroll(),
            ThrottleDecision::ScheduleTrailing => {
                let weak = self.downgrade();
                surface.request_frame(Box::new(move || {
                    if let Some(engine) = Self::upgrade(&weak) {
                        engine.inner.throttle.borrow_mut().on_trailing(now_ms() as f64);
                        engine.apply_scroll();
                    }
                }));
            }
            ThrottleDecision::Skip => {}
        }
    }

    fn handle_resize(&self) {
        let Some(surface) = self.surface() else {
            return;
        };
        let size = surface.content_size();
        if !size.is_empty() {
            self.apply_size(surface.as_ref(), size);
        }
    }

    /// Adopts `size` as the content size and redraws pins and the open popover at that scale.
    fn apply_size(&self, surface: &dyn Surface, size: ContentSize) {
        if let Some(session) = self.inner.session.borrow_mut().as_mut() {
            session.size = size;
        }
        surface.resize_overlay(size);
        self.apply_scroll();
        self.render_all();
        let popover = self.inner.pins.borrow().popover().map(str::to_string);
        if let Some(id) = popover {
            let comment = self.inner.store.borrow().get(&id).cloned();
            if let Some(comment) = comment {
                self.refresh_popover(&comment);
            }
        }
    }

    fn apply_scroll(&self) {
        if let Some(surface) = self.surface() {
            let scroll = surface.scroll_offset();
            surface.translate_overlay(Offset::new(-scroll.x, -scroll.y));
        }
    }

    fn activate(&self, comment: &Comment) {
        let Some((surface, size, options)) = self.session_parts() else {
            return;
        };
        let viewport = Viewport {
            size,
            origin: surface.overlay_origin(),
            width: surface.viewport_width(),
        };
        self.inner.pins.borrow_mut().activate(
            surface.as_ref(),
            comment,
            viewport,
            !options.disable_builtin_dialog,
        );
    }

    fn refresh_popover(&self, comment: &Comment) {
        let Some((surface, size)) = self.surface_and_size() else {
            return;
        };
        let viewport = Viewport {
            size,
            origin: surface.overlay_origin(),
            width: surface.viewport_width(),
        };
        self.inner
            .pins
            .borrow_mut()
            .refresh_popover(surface.as_ref(), comment, viewport);
    }

    fn render_all(&self) {
        let Some((surface, size)) = self.surface_and_size() else {
            return;
        };
        let store = self.inner.store.borrow();
        self.inner
            .pins
            .borrow_mut()
            .render_all(surface.as_ref(), store.as_slice(), size);
    }

    fn render_comment(&self, id: &str) {
        let Some((surface, size)) = self.surface_and_size() else {
            return;
        };
        let store = self.inner.store.borrow();
        self.inner
            .pins
            .borrow_mut()
            .render_comment(surface.as_ref(), store.as_slice(), id, size);
    }

    fn refresh_pin(&self, comment: &Comment) {
        let Some((surface, size)) = self.surface_and_size() else {
            return;
        };
        let store = self.inner.store.borrow();
        self.inner
            .pins
            .borrow_mut()
            .refresh_comment(surface.as_ref(), store.as_slice(), comment, size);
    }

    fn sync_pins(&self) {
        let Some((surface, size)) = self.surface_and_size() else {
            return;
        };
        let store = self.inner.store.borrow();
        let mut pins = self.inner.pins.borrow_mut();
        for comment in store.as_slice() {
            pins.refresh_comment(surface.as_ref(), store.as_slice(), comment, size);
        }
    }

    fn remove_pin(&self, id: &str) {
        if let Some(surface) = self.surface() {
            self.inner.pins.borrow_mut().remove(surface.as_ref(), id);
        }
    }

    fn emit_mode_changed(&self, transition: Transition) {
        self.inner.bus.emit(EngineEvent::ModeChanged {
            mode: transition.mode,
            previous_mode: transition.previous_mode,
        });
    }

    fn require_ready(&self) -> Result<CancelToken, EngineError> {
        match self.inner.session.borrow().as_ref() {
            Some(session) if session.ready => Ok(session.token.clone()),
            _ => Err(EngineError::NotMounted),
        }
    }

    fn unused_id(&self) -> String {
        let store = self.inner.store.borrow();
        loop {
            let id = make_id();
            if !store.contains(&id) {
                return id;
            }
        }
    }

    fn surface(&self) -> Option<Rc<dyn Surface>> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| session.surface.clone())
    }

    fn surface_and_size(&self) -> Option<(Rc<dyn Surface>, ContentSize)> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| (session.surface.clone(), session.size))
    }

    fn session_parts(&self) -> Option<(Rc<dyn Surface>, ContentSize, MountOptions)> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| (session.surface.clone(), session.size, session.options))
    }
}
