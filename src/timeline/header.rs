use crate::Message;
use chrono::Local;
use iced::mouse;
use iced::widget::canvas::{self, Geometry, Program};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use super::TimelineProps;
use super::scene::axis_ticks;

/// Keep drawing ticks whose label still pokes into view at the edges.
const LABEL_PADDING: f32 = 48.0;

pub(crate) struct HeaderProgram<'a> {
    pub(crate) props: TimelineProps<'a>,
}

impl Program<Message> for HeaderProgram<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        frame.fill_rectangle(
            Point::new(0.0, 0.0),
            Size::new(bounds.width, bounds.height),
            Color::from_rgb(0.95, 0.95, 0.95),
        );

        let ticks = axis_ticks(
            self.props.window,
            self.props.viewport,
            bounds.width,
            &Local,
        );

        for tick in ticks {
            if tick.x + LABEL_PADDING < 0.0 || tick.x > bounds.width + LABEL_PADDING {
                continue;
            }

            frame.stroke(
                &canvas::Path::line(
                    Point::new(tick.x, bounds.height * 0.6),
                    Point::new(tick.x, bounds.height),
                ),
                canvas::Stroke::default()
                    .with_color(Color::from_rgb(0.36, 0.36, 0.36))
                    .with_width(1.0),
            );

            frame.fill_text(canvas::Text {
                content: tick.label,
                position: Point::new(tick.x + 2.0, 3.0),
                color: Color::from_rgb(0.2, 0.2, 0.2),
                size: 11.0.into(),
                ..Default::default()
            });
        }

        frame.stroke(
            &canvas::Path::line(
                Point::new(0.0, bounds.height - 0.5),
                Point::new(bounds.width, bounds.height - 0.5),
            ),
            canvas::Stroke::default()
                .with_color(Color::from_rgb(0.85, 0.85, 0.85))
                .with_width(1.0),
        );

        vec![frame.into_geometry()]
    }
}
