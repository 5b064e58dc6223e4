use std::rc::Rc;
use std::str::FromStr;

use js_sys::{Function, Promise};
use notepin_shared::{CommentPatch, Mode, NewComment, ValidationError};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlElement;

use crate::adapter::CommentAdapter;
use crate::adapters::js::to_js;
use crate::adapters::{HttpAdapter, JsAdapter, LocalStorageAdapter, MemoryAdapter};
use crate::dom::DomSurface;
use crate::engine::Annotator;
use crate::error::EngineError;
use crate::events::{EventName, HandlerError};
use crate::mount::MountOptions;
use crate::surface::Surface;
use crate::util::js_error_message;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("notepin: logger already initialized"));
    }
}

fn engine_error(error: &EngineError) -> JsValue {
    let js_error = js_sys::Error::new(&error.to_string());
    js_error.set_name(error.kind());
    js_error.into()
}

fn validation_error(message: impl std::fmt::Display) -> JsValue {
    let js_error = js_sys::Error::new(&message.to_string());
    js_error.set_name("ValidationError");
    js_error.into()
}

fn serialize_error(error: serde_wasm_bindgen::Error) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// JavaScript handle to an [`Annotator`] mounted onto a live DOM element.
#[wasm_bindgen]
pub struct Notepin {
    engine: Annotator,
}

#[wasm_bindgen]
impl Notepin {
    /// `adapter` is any object with `save`, `load`, `update` and `delete` methods. Without
    /// one, comments live in memory for the lifetime of the page.
    #[wasm_bindgen(constructor)]
    pub fn new(adapter: JsValue) -> Result<Notepin, JsValue> {
        let adapter: Rc<dyn CommentAdapter> = if adapter.is_undefined() || adapter.is_null() {
            Rc::new(MemoryAdapter::new())
        } else {
            Rc::new(JsAdapter::new(adapter).map_err(validation_error)?)
        };
        Ok(Self::with_adapter(adapter))
    }

    #[wasm_bindgen(js_name = localStorage)]
    pub fn local_storage(key: Option<String>) -> Notepin {
        let adapter = match key {
            Some(key) => LocalStorageAdapter::new(key),
            None => LocalStorageAdapter::default(),
        };
        Self::with_adapter(Rc::new(adapter))
    }

    pub fn http(base_url: String) -> Notepin {
        Self::with_adapter(Rc::new(HttpAdapter::new(base_url)))
    }

    pub fn mount(&self, target: HtmlElement, options: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let options: MountOptions = if options.is_undefined() || options.is_null() {
                MountOptions::default()
            } else {
                serde_wasm_bindgen::from_value(options).map_err(validation_error)?
            };
            let surface: Rc<dyn Surface> = Rc::new(DomSurface::new(target)?);
            engine
                .mount(surface, options)
                .await
                .map_err(|error| engine_error(&error))?;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn unmount(&self) {
        self.engine.unmount();
    }

    #[wasm_bindgen(js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.engine.is_mounted()
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&self, mode: String) -> Result<(), JsValue> {
        let mode = Mode::from_str(&mode)
            .map_err(|error: ValidationError| engine_error(&EngineError::from(error)))?;
        self.engine
            .set_mode(mode)
            .map_err(|error| engine_error(&error))
    }

    #[wasm_bindgen(js_name = getMode)]
    pub fn get_mode(&self) -> String {
        self.engine.mode().as_str().to_string()
    }

    #[wasm_bindgen(js_name = addComment)]
    pub fn add_comment(&self, input: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let input: NewComment =
                serde_wasm_bindgen::from_value(input).map_err(validation_error)?;
            let comment = engine
                .add_comment(input)
                .await
                .map_err(|error| engine_error(&error))?;
            to_js(&comment).map_err(serialize_error)
        })
    }

    #[wasm_bindgen(js_name = updateComment)]
    pub fn update_comment(&self, id: String, updates: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let patch: CommentPatch =
                serde_wasm_bindgen::from_value(updates).map_err(validation_error)?;
            let comment = engine
                .update_comment(&id, patch)
                .await
                .map_err(|error| engine_error(&error))?;
            to_js(&comment).map_err(serialize_error)
        })
    }

    #[wasm_bindgen(js_name = deleteComment)]
    pub fn delete_comment(&self, id: String) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            engine
                .delete_comment(&id)
                .await
                .map_err(|error| engine_error(&error))?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = getComments)]
    pub fn get_comments(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.comments()).map_err(serialize_error)
    }

    /// Subscribes `handler` to `event` and returns a function that unsubscribes it.
    pub fn on(&self, event: String, handler: Function) -> Result<JsValue, JsValue> {
        let name = EventName::from_str(&event).map_err(validation_error)?;
        let subscription = self.engine.on(name, move |payload| {
            let value = to_js(payload)
                .map_err(|error| HandlerError::new(format!("failed to encode payload: {error}")))?;
            handler
                .call1(&JsValue::NULL, &value)
                .map(|_| ())
                .map_err(|error| HandlerError::new(format!("threw: {}", js_error_message(&error))))
        });
        let mut subscription = Some(subscription);
        let unsubscribe = Closure::<dyn FnMut()>::new(move || {
            if let Some(subscription) = subscription.take() {
                subscription.unsubscribe();
            }
        });
        Ok(unsubscribe.into_js_value())
    }

    #[wasm_bindgen(js_name = getPinIndex)]
    pub fn get_pin_index(&self, id: String) -> Option<u32> {
        self.engine
            .pin_rank(&id)
            .and_then(|rank| u32::try_from(rank).ok())
    }

    #[wasm_bindgen(js_name = getActivePin)]
    pub fn get_active_pin(&self) -> Option<String> {
        self.engine.active_pin()
    }

    #[wasm_bindgen(js_name = selectPin)]
    pub fn select_pin(&self, id: String) -> Result<(), JsValue> {
        self.engine
            .select_pin(&id)
            .map_err(|error| engine_error(&error))
    }

    #[wasm_bindgen(js_name = closePopover)]
    pub fn close_popover(&self) {
        self.engine.close_popover();
    }
}

impl Notepin {
    fn with_adapter(adapter: Rc<dyn CommentAdapter>) -> Self {
        Self {
            engine: Annotator::new(adapter),
        }
    }
}
