pub mod events;
pub mod groups;
pub mod header;
pub mod lanes;
pub mod scale;
pub mod scene;
pub mod ticks;
pub mod viewport;

use crate::Message;
use crate::error::{Error, Result};
use iced::widget::canvas::Canvas;
use iced::widget::{Space, column, container, row, scrollable, stack, text};
use iced::{Color, Element, Length};

use lanes::LaneLayout;
use viewport::ViewportState;

pub const GROUP_LIST_WIDTH: f32 = 150.0;
pub const AXIS_HEIGHT: f32 = 25.0;
pub const LANE_HEIGHT: f32 = 12.0;
pub const LANE_PADDING: f32 = 1.0;
pub const GROUP_PADDING: f32 = 5.0;

/// Modifier the backend uses for aggregated buckets of events.
const AGGREGATE_MODIFIER: &str = "EVENT_GROUP";

/// Logical time window in epoch seconds. `stop > start` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub stop: f64,
}

impl TimeWindow {
    pub fn new(start: f64, stop: f64) -> Result<Self> {
        if !start.is_finite() || !stop.is_finite() || stop <= start {
            return Err(Error::InvalidWindow { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// The `duration` seconds leading up to `now`.
    pub fn last(duration: f64, now: f64) -> Self {
        Self {
            start: now - duration,
            stop: now,
        }
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            stop: self.stop + offset,
        }
    }

    /// Same duration, moved so it ends at `now`.
    pub fn ending_at(&self, now: f64) -> Self {
        self.shifted(now - self.stop)
    }
}

/// How an event is layered and whether it can be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A single statement or session.
    Single,
    /// A bucket standing in for many events too small to show one by one.
    Aggregate,
}

impl EventKind {
    pub fn from_modifier(modifier: &str) -> Self {
        if modifier == AGGREGATE_MODIFIER {
            EventKind::Aggregate
        } else {
            EventKind::Single
        }
    }

    pub fn is_background(self) -> bool {
        match self {
            EventKind::Aggregate => true,
            EventKind::Single => false,
        }
    }

    pub fn is_clickable(self) -> bool {
        !self.is_background()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub group: String,
    pub kind: EventKind,
    /// Backend category, used for colouring.
    pub modifier: String,
    pub start: f64,
    pub stop: f64,
    pub flagged: bool,
}

pub fn color_from_label(label: &str) -> Color {
    let mut hash = 0u64;
    for c in label.chars() {
        hash = hash.wrapping_add(c as u64);
        hash = hash.wrapping_mul(0x517cc1b727220a95);
    }

    let r = ((hash >> 16) & 0xFF) as f32 / 255.0;
    let g = ((hash >> 8) & 0xFF) as f32 / 255.0;
    let b = (hash & 0xFF) as f32 / 255.0;

    Color::from_rgb(0.35 + r * 0.45, 0.35 + g * 0.45, 0.35 + b * 0.45)
}

/// Everything the timeline needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct TimelineProps<'a> {
    pub events: &'a [Event],
    pub layout: &'a LaneLayout,
    pub window: TimeWindow,
    pub viewport: ViewportState,
    pub selected: Option<&'a str>,
}

pub fn view(props: TimelineProps<'_>) -> Element<'_, Message> {
    let axis = row![
        Space::new().width(GROUP_LIST_WIDTH),
        Canvas::new(header::HeaderProgram { props })
            .width(Length::Fill)
            .height(Length::Fixed(AXIS_HEIGHT)),
    ];

    if props.layout.groups.is_empty() {
        // Keep the event area so gestures still move the window.
        let events = Canvas::new(events::EventsProgram { props })
            .width(Length::Fill)
            .height(Length::Fill);
        let placeholder = container(text("No events in this window")).center(Length::Fill);
        return column![
            axis,
            row![Space::new().width(GROUP_LIST_WIDTH), stack![events, placeholder]]
        ]
        .into();
    }

    let height = props.layout.height.max(1.0);

    let groups = Canvas::new(groups::GroupsProgram {
        layout: props.layout,
    })
    .width(Length::Fixed(GROUP_LIST_WIDTH))
    .height(Length::Fixed(height));

    let events = Canvas::new(events::EventsProgram { props })
        .width(Length::Fill)
        .height(Length::Fixed(height));

    let bands = scrollable(row![groups, events])
        .direction(scrollable::Direction::Vertical(scrollable::Scrollbar::default()))
        .height(Length::Fill);

    column![axis, bands].into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_requires_positive_span() {
        assert!(TimeWindow::new(10.0, 20.0).is_ok());
        assert!(TimeWindow::new(10.0, 10.0).is_err());
        assert!(TimeWindow::new(20.0, 10.0).is_err());
        assert!(TimeWindow::new(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn window_moves_to_now() {
        let window = TimeWindow::new(100.0, 160.0).unwrap();
        let moved = window.ending_at(1000.0);
        assert_eq!(moved, TimeWindow::last(60.0, 1000.0));
        assert_eq!(window.shifted(-100.0).start, 0.0);
    }

    #[test]
    fn aggregate_modifier_is_background() {
        assert_eq!(EventKind::from_modifier("EVENT_GROUP"), EventKind::Aggregate);
        assert_eq!(EventKind::from_modifier("DQL"), EventKind::Single);
        assert!(EventKind::Aggregate.is_background());
        assert!(!EventKind::Aggregate.is_clickable());
        assert!(EventKind::Single.is_clickable());
    }

    #[test]
    fn label_colors_are_stable() {
        assert_eq!(color_from_label("DQL"), color_from_label("DQL"));
    }
}
