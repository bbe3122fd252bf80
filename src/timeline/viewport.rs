//! Wheel-driven zoom and pan on top of the committed time window.
//!
//! The transform is a pure function of the raw wheel input accumulated since
//! the last external window change. It never looks at the clock.

use super::TimeWindow;

/// Smallest zoom factor the transform will reach.
pub const MIN_ZOOM: f64 = 1e-3;
/// Smallest per-event zoom step; keeps a huge wheel delta from flipping the sign.
const MIN_ZOOM_STEP: f64 = 0.05;
/// Shortest window a gesture can commit, in seconds. Epoch seconds carry
/// about a microsecond of precision, so anything near that collapses.
pub const MIN_WINDOW_SECS: f64 = 1e-3;
/// Pan speed multiplier, divided by the zoom so dragging feels the same at
/// every magnification.
const PAN_SPEED: f64 = 4.0;

/// One wheel event in browser-style pixel deltas: positive `delta_y` scrolls
/// down, positive `delta_x` scrolls right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Zoom modifier (ctrl, also set by trackpad pinch).
    pub modifier: bool,
    /// Pointer position relative to the left edge of the event area.
    pub cursor_x: f64,
}

impl WheelInput {
    /// Whether the gesture belongs to the timeline. Mostly vertical scrolling
    /// without the modifier is left for the page.
    pub fn is_captured(&self) -> bool {
        if self.modifier {
            return true;
        }
        let abs_x = self.delta_x.abs();
        let abs_y = self.delta_y.abs();
        !(abs_x < 1.0 || abs_y / abs_x >= 2.0)
    }
}

/// Affine state of the event area: content is scaled by `zoom` after being
/// shifted left by `offset` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub zoom: f64,
    pub offset: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: 0.0,
        }
    }
}

impl ViewportState {
    /// Screen x of an untransformed content x.
    pub fn to_screen(&self, x: f64) -> f64 {
        (x - self.offset) * self.zoom
    }

    /// Untransformed content x under screen x.
    pub fn to_content(&self, screen_x: f64) -> f64 {
        screen_x / self.zoom + self.offset
    }

    /// The logical window this state shows when applied on top of `current`,
    /// whose span fills `available_width` pixels. Never shorter than
    /// [`MIN_WINDOW_SECS`]; a clamped window stays centred on the zoomed one.
    pub fn window_for(&self, current: TimeWindow, available_width: f64) -> TimeWindow {
        if available_width <= 0.0 {
            return current;
        }
        let width = current.duration();
        let start = current.start + self.offset / available_width * width;
        let span = width / self.zoom;
        if span >= MIN_WINDOW_SECS {
            return TimeWindow {
                start,
                stop: start + span,
            };
        }
        let start = start + (span - MIN_WINDOW_SECS) / 2.0;
        TimeWindow {
            start,
            stop: start + MIN_WINDOW_SECS,
        }
    }
}

/// Gesture engine. Reset to the identity whenever the generation it observes
/// changes, i.e. whenever the committed window moved for any reason.
#[derive(Debug, Clone, Default)]
pub struct ViewportTransform {
    state: ViewportState,
    generation: u64,
}

impl ViewportTransform {
    pub fn new(generation: u64) -> Self {
        Self {
            state: ViewportState::default(),
            generation,
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Track the caller's window generation. Returns true if this reset the
    /// transform.
    pub fn observe(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            return false;
        }
        self.generation = generation;
        self.state = ViewportState::default();
        true
    }

    /// Apply one wheel event. `None` means the input was filtered out and
    /// should be left to the platform.
    pub fn apply(&mut self, input: WheelInput) -> Option<ViewportState> {
        if !input.is_captured() {
            return None;
        }

        let ViewportState { zoom, offset } = self.state;
        self.state = if input.modifier {
            let step = (1.0 - input.delta_y / 100.0).max(MIN_ZOOM_STEP);
            let new_zoom = (zoom * step).max(MIN_ZOOM);
            let real_x = input.cursor_x / zoom + offset;
            ViewportState {
                zoom: new_zoom,
                offset: real_x - input.cursor_x / new_zoom,
            }
        } else {
            ViewportState {
                zoom,
                offset: offset + PAN_SPEED * input.delta_x / zoom,
            }
        };

        Some(self.state)
    }

    /// Apply one wheel event, reporting the new state through `on_change`.
    /// Returns whether the input was captured.
    pub fn apply_with(&mut self, input: WheelInput, on_change: impl FnOnce(ViewportState)) -> bool {
        match self.apply(input) {
            Some(state) => {
                on_change(state);
                true
            }
            None => false,
        }
    }
}
