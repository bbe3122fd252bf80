//! Screen geometry for one frame of the timeline.

use chrono::TimeZone;
use intervaltree::IntervalTree;

use super::lanes::LaneLayout;
use super::scale::TimeScale;
use super::ticks::{TICK_COUNT, format_tick};
use super::viewport::ViewportState;
use super::{Event, EventKind, LANE_HEIGHT, LANE_PADDING, TimeWindow};

/// Narrowest rectangle drawn for an event, so point events stay visible.
const MIN_SHAPE_WIDTH: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Index into the event slice the scene was built from.
    pub event: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: EventKind,
    pub flagged: bool,
}

impl Shape {
    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Ticks and event rectangles in screen coordinates of the event area.
/// Background shapes come first so they are painted underneath.
pub struct Scene {
    pub ticks: Vec<Tick>,
    pub shapes: Vec<Shape>,
    hits: IntervalTree<i64, usize>,
}

impl Scene {
    pub fn build<Tz: TimeZone>(
        events: &[Event],
        layout: &LaneLayout,
        window: TimeWindow,
        viewport: ViewportState,
        width: f32,
        tz: &Tz,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut scene = Self::shapes(events, layout, window, viewport, width);
        scene.ticks = axis_ticks(window, viewport, width, tz);
        scene
    }

    /// Shapes and hit map only, for pointer handling between frames.
    pub fn shapes(
        events: &[Event],
        layout: &LaneLayout,
        window: TimeWindow,
        viewport: ViewportState,
        width: f32,
    ) -> Self {
        let scale = TimeScale::new(window.start, window.stop, width as f64);

        let mut shapes: Vec<Shape> = events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                let y = layout.event_y(index)?;
                let x0 = viewport.to_screen(scale.map(event.start)) as f32;
                let x1 = viewport.to_screen(scale.map(event.stop.max(event.start))) as f32;
                if x1 < 0.0 || x0 > width {
                    return None;
                }
                Some(Shape {
                    event: index,
                    x: x0,
                    y: y + LANE_PADDING,
                    width: (x1 - x0).max(MIN_SHAPE_WIDTH),
                    height: LANE_HEIGHT - 2.0 * LANE_PADDING,
                    kind: event.kind,
                    flagged: event.flagged,
                })
            })
            .collect();
        shapes.sort_by_key(|shape| !shape.kind.is_background());

        let hits = shapes
            .iter()
            .enumerate()
            .filter(|(_, shape)| shape.kind.is_clickable())
            .map(|(slot, shape)| {
                let lo = shape.x.floor() as i64;
                let hi = ((shape.x + shape.width).ceil() as i64).max(lo + 1);
                (lo..hi + 1, slot)
            })
            .collect();

        Self {
            ticks: Vec::new(),
            shapes,
            hits,
        }
    }

    /// Event index of the clickable shape under `(x, y)`.
    pub fn hit(&self, x: f32, y: f32) -> Option<usize> {
        self.hits
            .query_point(x.floor() as i64)
            .map(|element| &self.shapes[element.value])
            .find(|shape| shape.contains(x, y))
            .map(|shape| shape.event)
    }
}

/// Axis ticks of `window` spread over `width` pixels, moved by `viewport`.
pub fn axis_ticks<Tz: TimeZone>(
    window: TimeWindow,
    viewport: ViewportState,
    width: f32,
    tz: &Tz,
) -> Vec<Tick>
where
    Tz::Offset: std::fmt::Display,
{
    TimeScale::new(window.start, window.stop, width as f64)
        .ticks(TICK_COUNT, tz)
        .into_iter()
        .map(|(x, t)| Tick {
            x: viewport.to_screen(x) as f32,
            label: format_tick(t, tz),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: &str, group: &str, kind: EventKind, start: f64, stop: f64) -> Event {
        Event {
            id: id.to_string(),
            group: group.to_string(),
            kind,
            modifier: "DQL".to_string(),
            start,
            stop,
            flagged: false,
        }
    }

    fn window() -> TimeWindow {
        TimeWindow {
            start: 1000.0,
            stop: 1100.0,
        }
    }

    fn build(events: &[Event], layout: &LaneLayout) -> Scene {
        Scene::build(events, layout, window(), ViewportState::default(), 1000.0, &Utc)
    }

    #[test]
    fn shapes_follow_scale_and_lanes() {
        let events = vec![
            event("a", "A", EventKind::Single, 1000.0, 1010.0),
            event("b", "A", EventKind::Single, 1005.0, 1020.0),
        ];
        let layout = LaneLayout::assign(&events);
        let scene = build(&events, &layout);

        assert_eq!(scene.shapes.len(), 2);
        let b = scene.shapes.iter().find(|s| s.event == 1).unwrap();
        assert_eq!(b.x, 50.0);
        assert_eq!(b.width, 150.0);
        assert_eq!(b.y, layout.event_y(1).unwrap() + LANE_PADDING);
    }

    #[test]
    fn viewport_transform_is_applied() {
        let events = vec![event("a", "A", EventKind::Single, 1050.0, 1060.0)];
        let layout = LaneLayout::assign(&events);
        let viewport = ViewportState {
            zoom: 2.0,
            offset: 250.0,
        };
        let scene = Scene::build(&events, &layout, window(), viewport, 1000.0, &Utc);
        assert_eq!(scene.shapes[0].x, 500.0);
        assert_eq!(scene.shapes[0].width, 200.0);
    }

    #[test]
    fn offscreen_events_are_culled() {
        let events = vec![
            event("early", "A", EventKind::Single, 900.0, 950.0),
            event("late", "A", EventKind::Single, 1200.0, 1300.0),
            event("visible", "A", EventKind::Single, 990.0, 1001.0),
        ];
        let layout = LaneLayout::assign(&events);
        let scene = build(&events, &layout);
        assert_eq!(scene.shapes.len(), 1);
        assert_eq!(scene.shapes[0].event, 2);
    }

    #[test]
    fn background_shapes_paint_first_and_ignore_clicks() {
        let events = vec![
            event("q1", "A", EventKind::Single, 1010.0, 1020.0),
            event("bucket", "A", EventKind::Aggregate, 1000.0, 1100.0),
        ];
        let layout = LaneLayout::assign(&events);
        let scene = build(&events, &layout);
        assert_eq!(scene.shapes[0].kind, EventKind::Aggregate);

        let single = scene.shapes.iter().find(|s| s.event == 0).unwrap();
        let aggregate = scene.shapes.iter().find(|s| s.event == 1).unwrap();
        assert_eq!(scene.hit(150.0, single.y + 1.0), Some(0));
        assert_eq!(scene.hit(500.0, aggregate.y + 1.0), None);
    }

    #[test]
    fn point_events_are_hittable() {
        let events = vec![event("p", "A", EventKind::Single, 1050.0, 1050.0)];
        let layout = LaneLayout::assign(&events);
        let scene = build(&events, &layout);
        let shape = &scene.shapes[0];
        assert_eq!(shape.width, MIN_SHAPE_WIDTH);
        assert_eq!(scene.hit(500.5, shape.y + 2.0), Some(0));
        assert_eq!(scene.hit(520.0, shape.y + 2.0), None);
    }

    #[test]
    fn hidden_groups_produce_no_shapes() {
        let events = vec![event("a", "A", EventKind::Single, 1000.0, 1010.0)];
        let mut layout = LaneLayout::assign(&events);
        layout.stack(&std::collections::HashSet::from(["A".to_string()]));
        let scene = build(&events, &layout);
        assert!(scene.shapes.is_empty());
    }

    #[test]
    fn hit_map_matches_full_scene() {
        let events = vec![
            event("a", "A", EventKind::Single, 1000.0, 1010.0),
            event("b", "B", EventKind::Single, 1040.0, 1060.0),
        ];
        let layout = LaneLayout::assign(&events);
        let full = build(&events, &layout);
        let hits = Scene::shapes(&events, &layout, window(), ViewportState::default(), 1000.0);
        assert!(hits.ticks.is_empty());
        assert_eq!(hits.shapes, full.shapes);
        for shape in &full.shapes {
            let (x, y) = (shape.x + 1.0, shape.y + 1.0);
            assert_eq!(hits.hit(x, y), full.hit(x, y));
            assert_eq!(hits.hit(x, y), Some(shape.event));
        }
    }

    #[test]
    fn ticks_move_with_viewport() {
        let layout = LaneLayout::default();
        let plain = Scene::build(&[], &layout, window(), ViewportState::default(), 1000.0, &Utc);
        let zoomed = Scene::build(
            &[],
            &layout,
            window(),
            ViewportState {
                zoom: 2.0,
                offset: 0.0,
            },
            1000.0,
            &Utc,
        );
        assert_eq!(plain.ticks.len(), zoomed.ticks.len());
        for (a, b) in plain.ticks.iter().zip(&zoomed.ticks) {
            assert_eq!(b.x, a.x * 2.0);
            assert_eq!(a.label, b.label);
        }
    }
}
