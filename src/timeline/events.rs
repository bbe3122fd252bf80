use crate::Message;
use chrono::Local;
use iced::mouse;
use iced::widget::canvas::{self, Geometry, Program};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme, keyboard};

use super::scale::TimeScale;
use super::scene::{Scene, Shape};
use super::ticks::format_tick;
use super::viewport::WheelInput;
use super::{GROUP_PADDING, TimelineProps, color_from_label};

/// Pixels per wheel "line", roughly what browsers report for one notch.
const PIXELS_PER_LINE: f32 = 20.0;

pub struct EventsProgram<'a> {
    pub props: TimelineProps<'a>,
}

#[derive(Default)]
pub struct EventsState {
    pub modifiers: keyboard::Modifiers,
    pub cursor: Option<Point>,
    pub hovered: Option<usize>,
    pub pressed: Option<usize>,
}

impl EventsProgram<'_> {
    fn scene(&self, width: f32) -> Scene {
        Scene::build(
            self.props.events,
            self.props.layout,
            self.props.window,
            self.props.viewport,
            width,
            &Local,
        )
    }

    /// Event under `position`, if any. Skips the axis labels `scene` builds.
    fn hit(&self, position: Point, width: f32) -> Option<usize> {
        let props = &self.props;
        Scene::shapes(props.events, props.layout, props.window, props.viewport, width)
            .hit(position.x, position.y)
    }

    fn draw_shape(&self, frame: &mut canvas::Frame, shape: &Shape, selected: bool, hovered: bool) {
        let event = &self.props.events[shape.event];
        let base = color_from_label(&event.modifier);
        let color = if shape.kind.is_background() {
            Color { a: 0.35, ..base }
        } else {
            base
        };

        let position = Point::new(shape.x, shape.y);
        let size = Size::new(shape.width, shape.height);
        frame.fill_rectangle(position, size, color);

        let border = if selected {
            Some((Color::from_rgb(0.0, 0.4, 0.8), 2.0))
        } else if shape.flagged {
            Some((Color::from_rgb(0.85, 0.1, 0.1), 1.5))
        } else if hovered {
            Some((Color::from_rgba(0.0, 0.0, 0.0, 0.45), 1.0))
        } else if !shape.kind.is_background() {
            Some((Color::from_rgba(0.0, 0.0, 0.0, 0.2), 1.0))
        } else {
            None
        };

        if let Some((color, width)) = border {
            frame.stroke(
                &canvas::Path::rectangle(position, size),
                canvas::Stroke::default().with_color(color).with_width(width),
            );
        }
    }

}

/// Wheel event as pixel deltas in browser convention, where positive deltas
/// scroll down and right. iced reports the opposite signs.
fn wheel_input(modifiers: keyboard::Modifiers, delta: &mouse::ScrollDelta, x: f32) -> WheelInput {
    let (dx, dy) = match *delta {
        mouse::ScrollDelta::Lines { x, y } => (x * PIXELS_PER_LINE, y * PIXELS_PER_LINE),
        mouse::ScrollDelta::Pixels { x, y } => (x, y),
    };
    WheelInput {
        delta_x: -dx as f64,
        delta_y: -dy as f64,
        modifier: modifiers.control(),
        cursor_x: x as f64,
    }
}

impl Program<Message> for EventsProgram<'_> {
    type State = EventsState;

    fn draw(
        &self,
        state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let scene = self.scene(bounds.width);

        for tick in &scene.ticks {
            if tick.x < 0.0 || tick.x > bounds.width {
                continue;
            }
            frame.stroke(
                &canvas::Path::line(Point::new(tick.x, 0.0), Point::new(tick.x, bounds.height)),
                canvas::Stroke::default()
                    .with_color(Color::from_rgba(0.5, 0.5, 0.5, 0.3))
                    .with_width(1.0),
            );
        }

        for group in &self.props.layout.groups {
            let top = group.y - GROUP_PADDING;
            frame.stroke(
                &canvas::Path::line(Point::new(0.0, top), Point::new(bounds.width, top)),
                canvas::Stroke::default()
                    .with_color(Color::from_rgb(0.9, 0.9, 0.9))
                    .with_width(1.0),
            );
        }

        let selected = self.props.selected;
        for shape in &scene.shapes {
            let is_selected = selected == Some(self.props.events[shape.event].id.as_str());
            let is_hovered = state.hovered == Some(shape.event);
            self.draw_shape(&mut frame, shape, is_selected, is_hovered);
        }

        if let Some(cursor) = state.cursor {
            frame.stroke(
                &canvas::Path::line(Point::new(cursor.x, 0.0), Point::new(cursor.x, bounds.height)),
                canvas::Stroke::default()
                    .with_color(Color::from_rgba(0.8, 0.1, 0.1, 0.6))
                    .with_width(1.0),
            );

            let window = self.props.window;
            let scale = TimeScale::new(window.start, window.stop, bounds.width as f64);
            let t = scale.invert(self.props.viewport.to_content(cursor.x as f64));
            frame.fill_text(canvas::Text {
                content: format_tick(t, &Local),
                position: Point::new(cursor.x + 4.0, cursor.y - 14.0),
                color: Color::from_rgb(0.6, 0.1, 0.1),
                size: 11.0.into(),
                ..Default::default()
            });
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: &iced::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        match event {
            iced::Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.modifiers = *modifiers;
            }
            iced::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let position = cursor.position_in(bounds);
                let hovered = position.and_then(|p| self.hit(p, bounds.width));
                if position != state.cursor || hovered != state.hovered {
                    state.cursor = position;
                    state.hovered = hovered;
                    return Some(canvas::Action::request_redraw());
                }
            }
            iced::Event::Mouse(mouse::Event::CursorLeft) => {
                state.cursor = None;
                state.hovered = None;
                return Some(canvas::Action::request_redraw());
            }
            iced::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                state.pressed = cursor
                    .position_in(bounds)
                    .and_then(|p| self.hit(p, bounds.width));
            }
            iced::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                let pressed = state.pressed.take();
                let released = cursor
                    .position_in(bounds)
                    .and_then(|p| self.hit(p, bounds.width));
                if let Some(index) = pressed.filter(|&index| released == Some(index)) {
                    let id = self.props.events[index].id.clone();
                    return Some(canvas::Action::publish(Message::EventClicked(id)).and_capture());
                }
            }
            iced::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if let Some(position) = cursor.position_in(bounds) {
                    let input = wheel_input(state.modifiers, delta, position.x);
                    // Filtered gestures fall through to the surrounding scrollable.
                    if input.is_captured() {
                        return Some(
                            canvas::Action::publish(Message::Wheel {
                                input,
                                width: bounds.width as f64,
                            })
                            .and_capture(),
                        );
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        _bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if state.hovered.is_some() {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::Crosshair
        }
    }
}
