use std::cell::Cell;
use std::rc::Rc;

use futures::channel::oneshot;
use serde::Deserialize;

use crate::coords::ContentSize;
use crate::surface::Surface;

pub const STABILIZE_MAX_FRAMES: usize = 10;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MountOptions {
    /// Disables annotate mode.
    pub read_only: bool,
    /// Suppresses the built-in popover; the caller renders its own on `comment:clicked`.
    pub disable_builtin_dialog: bool,
}

/// Monotonic counter advanced by every unmount. Continuations compare their captured
/// value with the live one after each suspension point.
#[derive(Clone, Debug, Default)]
pub struct Generation {
    live: Rc<Cell<u64>>,
}

impl Generation {
    pub fn advance(&self) -> u64 {
        let next = self.live.get() + 1;
        self.live.set(next);
        next
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            captured: self.live.get(),
            live: self.live.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    captured: u64,
    live: Rc<Cell<u64>>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.live.get() != self.captured
    }

    pub fn generation(&self) -> u64 {
        self.captured
    }
}

/// Resolves on the surface's next animation frame, or immediately if the surface drops
/// the callback.
pub async fn next_frame(surface: &dyn Surface) {
    let (sender, receiver) = oneshot::channel::<()>();
    surface.request_frame(Box::new(move || {
        let _ = sender.send(());
    }));
    let _ = receiver.await;
}

/// Samples the content size once per frame until two consecutive non-empty samples
/// agree, for at most [`STABILIZE_MAX_FRAMES`] frames. Returns `None` if the token was
/// cancelled while waiting; otherwise the stable size, or the last sample when the
/// content never settled.
pub async fn stabilize_content(
    surface: &Rc<dyn Surface>,
    token: &CancelToken,
) -> Option<ContentSize> {
    let mut last = surface.content_size();
    for _ in 0..STABILIZE_MAX_FRAMES {
        next_frame(surface.as_ref()).await;
        if token.is_cancelled() {
            return None;
        }
        let sample = surface.content_size();
        if !sample.is_empty() && sample == last {
            return Some(sample);
        }
        last = sample;
    }
    log::debug!(
        "content still reflowing after {STABILIZE_MAX_FRAMES} frames, using {}x{}",
        last.width,
        last.height
    );
    Some(last)
}
