use iced::Theme;
use iced::widget::{button, container};
use unicode_width::UnicodeWidthChar;

pub fn neutral_button_style(theme: &Theme, status: button::Status) -> button::Style {
    let palette = theme.extended_palette();
    let base = button::Style {
        text_color: palette.background.weak.text,
        ..Default::default()
    };
    match status {
        button::Status::Hovered | button::Status::Pressed => button::Style {
            background: Some(palette.background.strong.color.into()),
            ..base
        },
        _ => base,
    }
}

/// Highlighted variant for the active choice in a row of neutral buttons.
pub fn selected_button_style(theme: &Theme, status: button::Status) -> button::Style {
    let palette = theme.extended_palette();
    let base = button::Style {
        background: Some(palette.primary.weak.color.into()),
        text_color: palette.primary.weak.text,
        ..Default::default()
    };
    match status {
        button::Status::Hovered | button::Status::Pressed => button::Style {
            background: Some(palette.primary.base.color.into()),
            text_color: palette.primary.base.text,
            ..base
        },
        _ => base,
    }
}

pub fn panel_style(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();
    container::Style::default()
        .background(palette.background.base.color)
        .border(iced::Border {
            color: palette.background.strong.color,
            width: 1.0,
            ..Default::default()
        })
}

/// Cut `label` to at most `columns` display columns, marking the cut with an
/// ellipsis.
pub fn truncate(label: &str, columns: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in label.chars() {
        let width = c.width().unwrap_or(0);
        if used + width > columns {
            // Make room for the ellipsis.
            while used + 1 > columns {
                match out.pop() {
                    Some(removed) => used -= removed.width().unwrap_or(0),
                    None => return out,
                }
            }
            out.push('…');
            return out;
        }
        used += width;
        out.push(c);
    }
    out
}
