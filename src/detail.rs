//! Detail panel for the selected event.
//!
//! The backend's detail document is opaque; how it is shown is up to a
//! [`DetailView`]. The default renders it as an indented outline.

use iced::widget::{button, column, container, row, scrollable, text};
use iced::{Alignment, Element, Length};
use serde_json::Value;

use crate::Message;
use crate::ui::{neutral_button_style, panel_style, truncate};

const PANEL_HEIGHT: f32 = 220.0;

/// Detail of the selected event.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    /// Requested, nothing usable has arrived yet.
    Loading { id: String },
    Ready { id: String, detail: Value },
}

impl DetailState {
    pub fn id(&self) -> &str {
        match self {
            DetailState::Loading { id } | DetailState::Ready { id, .. } => id,
        }
    }
}

pub trait DetailView {
    fn view<'a>(&self, id: &'a str, detail: &'a Value) -> Element<'a, Message>;
}

/// One row of the outline rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineLine {
    pub depth: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct JsonDetailView {
    /// Lines longer than this many display columns are cut.
    pub max_columns: usize,
}

impl Default for JsonDetailView {
    fn default() -> Self {
        Self { max_columns: 160 }
    }
}

impl JsonDetailView {
    pub fn outline(&self, detail: &Value) -> Vec<OutlineLine> {
        let mut lines = Vec::new();
        push_outline(detail, 0, None, &mut lines);
        for line in &mut lines {
            let room = self.max_columns.saturating_sub(line.depth * 2);
            line.text = truncate(&line.text, room);
        }
        lines
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn labelled(label: Option<&str>, body: &str) -> String {
    match label {
        Some(label) => format!("{label}: {body}"),
        None => body.to_string(),
    }
}

fn push_outline(value: &Value, depth: usize, label: Option<&str>, out: &mut Vec<OutlineLine>) {
    if let Some(s) = scalar(value) {
        out.push(OutlineLine {
            depth,
            text: labelled(label, &s),
        });
        return;
    }

    // Rows of plain values stay on one line.
    if let Value::Array(items) = value {
        let flat: Option<Vec<String>> = items.iter().map(scalar).collect();
        if let Some(flat) = flat {
            out.push(OutlineLine {
                depth,
                text: labelled(label, &flat.join(", ")),
            });
            return;
        }
    }

    let child_depth = match label {
        Some(label) => {
            out.push(OutlineLine {
                depth,
                text: format!("{label}:"),
            });
            depth + 1
        }
        None => depth,
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                push_outline(child, child_depth, Some(key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                push_outline(child, child_depth, Some(&format!("[{index}]")), out);
            }
        }
        _ => {}
    }
}

impl DetailView for JsonDetailView {
    fn view<'a>(&self, _id: &'a str, detail: &'a Value) -> Element<'a, Message> {
        let lines = self.outline(detail).into_iter().map(|line| {
            Element::from(container(text(line.text).size(12)).padding(iced::Padding {
                left: line.depth as f32 * 14.0,
                ..Default::default()
            }))
        });
        scrollable(column(lines).spacing(2).width(Length::Fill))
            .height(Length::Fill)
            .into()
    }
}

/// The panel around the selected event's detail.
pub fn panel<'a>(state: &'a DetailState, renderer: &dyn DetailView) -> Element<'a, Message> {
    let header = row![
        text(format!("Event {}", state.id())).size(16),
        iced::widget::Space::new().width(Length::Fill),
        button(text("Close").size(12))
            .style(neutral_button_style)
            .on_press(Message::CloseDetail),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let body: Element<'a, Message> = match state {
        DetailState::Loading { .. } => container(text("Loading…"))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into(),
        DetailState::Ready { id, detail } => renderer.view(id, detail),
    };

    container(column![header, body].spacing(6).padding(10))
        .width(Length::Fill)
        .height(Length::Fixed(PANEL_HEIGHT))
        .style(panel_style)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(lines: &[OutlineLine]) -> Vec<(usize, &str)> {
        lines.iter().map(|l| (l.depth, l.text.as_str())).collect()
    }

    #[test]
    fn outlines_query_results() {
        let detail = json!({
            "session": [[42, "SYS", null]],
            "sql": "select 1",
        });
        let lines = JsonDetailView::default().outline(&detail);
        assert_eq!(
            texts(&lines),
            vec![
                (0, "session:"),
                (1, "[0]: 42, SYS, null"),
                (0, "sql: select 1"),
            ]
        );
    }

    #[test]
    fn scalars_render_alone() {
        let lines = JsonDetailView::default().outline(&json!("no detail"));
        assert_eq!(texts(&lines), vec![(0, "no detail")]);
    }

    #[test]
    fn long_lines_are_cut() {
        let view = JsonDetailView { max_columns: 10 };
        let lines = view.outline(&json!({"sql": "select * from a_rather_long_table"}));
        assert_eq!(lines[0].text, "sql: sele…");
    }

    #[test]
    fn state_exposes_selected_id() {
        let state = DetailState::Loading { id: "7".into() };
        assert_eq!(state.id(), "7");
    }
}
