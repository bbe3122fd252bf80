use crate::Message;
use crate::timeline::lanes::{Group, LaneLayout};
use crate::timeline::{GROUP_LIST_WIDTH, GROUP_PADDING};
use crate::ui::truncate;
use iced::mouse;
use iced::widget::canvas::{self, Action, Geometry, Program};
use iced::{Color, Event, Point, Rectangle, Renderer, Size, Theme};

/// Approximate glyph advance at the label font size.
const CHAR_WIDTH: f32 = 7.0;
const LABEL_LEFT: f32 = 22.0;

pub(crate) struct GroupsProgram<'a> {
    pub(crate) layout: &'a LaneLayout,
}

#[derive(Default)]
pub(crate) struct GroupsState {
    hovered_group: Option<usize>,
}

impl GroupsProgram<'_> {
    fn group_at(&self, position: Point) -> Option<usize> {
        self.layout.group_at(position.y).map(|group| group.index)
    }
}

fn draw_group(frame: &mut canvas::Frame, group: &Group, width: f32, hovered: bool) {
    let top = group.y - GROUP_PADDING;
    let band = group.height + 2.0 * GROUP_PADDING;

    if hovered {
        frame.fill_rectangle(
            Point::new(0.0, top),
            Size::new(width, band),
            Color::from_rgb(0.94, 0.94, 0.94),
        );
    }

    frame.stroke(
        &canvas::Path::line(Point::new(0.0, top), Point::new(width, top)),
        canvas::Stroke::default()
            .with_color(Color::from_rgb(0.9, 0.9, 0.9))
            .with_width(1.0),
    );

    let icon = if group.hidden { "▶" } else { "▼" };
    frame.fill_text(canvas::Text {
        content: icon.to_string(),
        position: Point::new(6.0, group.y - 1.0),
        color: Color::from_rgb(0.4, 0.4, 0.4),
        size: 10.0.into(),
        ..Default::default()
    });

    let columns = ((GROUP_LIST_WIDTH - LABEL_LEFT - 4.0) / CHAR_WIDTH) as usize;
    let label = if group.hidden {
        format!("{} ({})", group.name, group.lane_count)
    } else {
        group.name.clone()
    };
    frame.fill_text(canvas::Text {
        content: truncate(&label, columns),
        position: Point::new(LABEL_LEFT, group.y - 1.0),
        color: if hovered {
            Color::from_rgb(0.1, 0.2, 0.35)
        } else if group.hidden {
            Color::from_rgb(0.55, 0.55, 0.55)
        } else {
            Color::from_rgb(0.2, 0.2, 0.2)
        },
        size: 12.0.into(),
        ..Default::default()
    });
}

impl Program<Message> for GroupsProgram<'_> {
    type State = GroupsState;

    fn draw(
        &self,
        state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        frame.fill_rectangle(
            Point::new(0.0, 0.0),
            Size::new(bounds.width, bounds.height),
            Color::from_rgb(0.98, 0.98, 0.98),
        );

        for group in &self.layout.groups {
            let hovered = state.hovered_group == Some(group.index);
            draw_group(&mut frame, group, bounds.width, hovered);
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<Action<Message>> {
        match event {
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let hovered = cursor
                    .position_in(bounds)
                    .and_then(|position| self.group_at(position));

                if hovered != state.hovered_group {
                    state.hovered_group = hovered;
                    return Some(Action::request_redraw());
                }
            }
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let position = cursor.position_in(bounds)?;
                let index = self.group_at(position)?;
                let name = self.layout.groups.get(index)?.name.clone();
                return Some(Action::publish(Message::GroupToggled(name)).and_capture());
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
        if state.hovered_group.is_some() {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }
}
