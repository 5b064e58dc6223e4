use notepin_shared::{COORDINATE_MAX, COORDINATE_MIN};

pub const SCROLL_INTERVAL_MS: f64 = 16.0;
pub const PIN_SIZE: f64 = 28.0;
pub const POPOVER_WIDTH: f64 = 260.0;
pub const POPOVER_GAP: f64 = 8.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

impl ContentSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return COORDINATE_MIN;
    }
    value.clamp(COORDINATE_MIN, COORDINATE_MAX)
}

pub fn to_percent(client: f64, origin: f64, dimension: f64) -> f64 {
    if !(dimension > 0.0) {
        return COORDINATE_MIN;
    }
    clamp_percent((client - origin) / dimension * 100.0)
}

pub fn to_pixels(percent: f64, dimension: f64) -> f64 {
    percent / 100.0 * dimension
}

/// Maps a click in client coordinates onto the content as percentages.
pub fn click_to_percent(click: Offset, overlay_origin: Offset, size: ContentSize) -> (f64, f64) {
    (
        to_percent(click.x, overlay_origin.x, size.width),
        to_percent(click.y, overlay_origin.y, size.height),
    )
}

pub fn percent_to_pixels(x: f64, y: f64, size: ContentSize) -> Offset {
    Offset::new(to_pixels(x, size.width), to_pixels(y, size.height))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopoverSide {
    Right,
    Left,
}

/// Horizontal placement of the popover next to a pin, in overlay pixels. Flips to the
/// left of the pin when the right-hand placement would cross the viewport edge.
pub fn popover_left(pin_left: f64, overlay_origin_x: f64, viewport_width: f64) -> (f64, PopoverSide) {
    let right = pin_left + PIN_SIZE / 2.0 + POPOVER_GAP;
    if overlay_origin_x + right + POPOVER_WIDTH > viewport_width {
        let left = pin_left - PIN_SIZE / 2.0 - POPOVER_GAP - POPOVER_WIDTH;
        (left, PopoverSide::Left)
    } else {
        (right, PopoverSide::Right)
    }
}

/// Rate limiter for scroll synchronization.
#[derive(Debug, Default)]
pub struct ScrollThrottle {
    last_run: Option<f64>,
    trailing_scheduled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Run,
    ScheduleTrailing,
    Skip,
}

impl ScrollThrottle {
    pub fn on_event(&mut self, now: f64) -> ThrottleDecision {
        let ready = self
            .last_run
            .map_or(true, |last| now - last >= SCROLL_INTERVAL_MS);
        if ready {
            self.last_run = Some(now);
            return ThrottleDecision::Run;
        }
        if self.trailing_scheduled {
            ThrottleDecision::Skip
        } else {
            self.trailing_scheduled = true;
            ThrottleDecision::ScheduleTrailing
        }
    }

    pub fn on_trailing(&mut self, now: f64) {
        self.trailing_scheduled = false;
        self.last_run = Some(now);
    }
}
