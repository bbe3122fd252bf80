use std::fmt;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone};
use iced::widget::{Space, button, pick_list, row, text, text_input, toggler};
use iced::{Alignment, Element, Length};

use crate::api::Connection;
use crate::error::{Error, Result};
use crate::timeline::TimeWindow;
use crate::ui::{neutral_button_style, selected_button_style, truncate};
use crate::{CONNECTIONS_TAB, Message};

/// Period of the auto-refresh tick.
pub const AUTO_REFRESH_PERIOD: Duration = Duration::from_millis(1100);

/// "Jump to last" shortcuts, in seconds.
pub const QUICK_RANGES: [(&str, f64); 8] = [
    ("5m", 5.0 * 60.0),
    ("15m", 15.0 * 60.0),
    ("30m", 30.0 * 60.0),
    ("1h", 3600.0),
    ("3h", 3.0 * 3600.0),
    ("6h", 6.0 * 3600.0),
    ("12h", 12.0 * 3600.0),
    ("24h", 24.0 * 3600.0),
];

const START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const LOCATION_COLUMNS: usize = 48;

/// Human readable length of a window to the second, e.g. "1h 30m".
pub fn format_range(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds >= 1.0 {
        seconds.floor() as u64
    } else {
        0
    };
    humantime::format_duration(Duration::from_secs(whole)).to_string()
}

/// Text for the start-time field.
pub fn format_start<Tz: TimeZone>(t: f64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    tz.timestamp_millis_opt((t * 1000.0).round() as i64)
        .single()
        .map(|time| time.format(START_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parse the start-time field as a wall-clock time in `tz`.
pub fn parse_start<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<f64> {
    let input = input.trim();
    let naive = NaiveDateTime::parse_from_str(input, START_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .map_err(|_| Error::InvalidStartTime(input.to_string()))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::InvalidStartTime(input.to_string()))?;
    Ok(local.timestamp_millis() as f64 / 1000.0)
}

/// `window` moved to begin at `start`, keeping its duration.
pub fn starting_at(window: TimeWindow, start: f64) -> TimeWindow {
    window.shifted(start - window.start)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChoice {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for ConnectionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub struct ToolbarProps<'a> {
    pub query: &'a str,
    pub start_input: &'a str,
    pub start_invalid: bool,
    pub window: TimeWindow,
    pub auto_refresh: bool,
    pub loading: bool,
    pub location: String,
    pub connections: &'a [Connection],
    pub active_connection: Option<usize>,
}

pub fn view(props: ToolbarProps<'_>) -> Element<'_, Message> {
    let choices: Vec<ConnectionChoice> = props
        .connections
        .iter()
        .enumerate()
        .map(|(index, connection)| ConnectionChoice {
            index,
            name: connection.name.clone(),
        })
        .collect();
    let active = props
        .active_connection
        .and_then(|index| choices.get(index).cloned());

    let connection_picker = row![
        pick_list(choices, active, |choice: ConnectionChoice| {
            Message::ActivateConnection(choice.index)
        })
        .placeholder("No connection")
        .text_size(12),
        button(text("Manage").size(12))
            .style(neutral_button_style)
            .on_press(Message::TabSelected(CONNECTIONS_TAB)),
    ]
    .spacing(4)
    .align_y(Alignment::Center);

    let search = text_input("Search queries...", props.query)
        .on_input(Message::SearchChanged)
        .size(12)
        .width(Length::Fixed(200.0));

    let start = text_input("YYYY-MM-DDTHH:MM:SS", props.start_input)
        .on_input(Message::StartInputChanged)
        .on_submit(Message::StartSubmitted)
        .size(12)
        .width(Length::Fixed(160.0))
        .style(move |theme: &iced::Theme, status| {
            let mut style = text_input::default(theme, status);
            if props.start_invalid {
                style.border.color = theme.extended_palette().danger.base.color;
            }
            style
        });

    let range = text(format!("Range: {}", format_range(props.window.duration()))).size(12);

    let mut quick = row![text("Jump to last:").size(12)]
        .spacing(2)
        .align_y(Alignment::Center);
    for (label, seconds) in QUICK_RANGES {
        let style = if (props.window.duration() - seconds).abs() < 1.0 {
            selected_button_style
        } else {
            neutral_button_style
        };
        quick = quick.push(
            button(text(label).size(12))
                .style(style)
                .on_press(Message::QuickRange(seconds)),
        );
    }

    let refresh = toggler(props.auto_refresh)
        .label("Auto refresh")
        .text_size(12)
        .on_toggle(Message::AutoRefreshToggled);

    let flush = button(text("Flush statistics").size(12)).on_press_maybe(
        (!props.loading).then_some(Message::Flush),
    );

    let status = text(if props.loading { "Loading…" } else { "" }).size(12);

    let location = button(text(truncate(&props.location, LOCATION_COLUMNS)).size(11))
        .style(neutral_button_style)
        .on_press(Message::CopyLocation);

    row![
        connection_picker,
        search,
        range,
        start,
        quick,
        refresh,
        flush,
        status,
        Space::new().width(Length::Fill),
        location,
    ]
    .spacing(10)
    .padding(5)
    .align_y(Alignment::Center)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn ranges_use_compact_units() {
        assert_eq!(format_range(600.0), "10m");
        assert_eq!(format_range(5400.0), "1h 30m");
        assert_eq!(format_range(90_061.5), "1day 1h 1m 1s");
        assert_eq!(format_range(2.0 * 86_400.0), "2days");
        assert_eq!(format_range(0.2), "0s");
        assert_eq!(format_range(f64::NAN), "0s");
    }

    #[test]
    fn start_field_roundtrips() {
        let t = 1_700_000_000.0;
        let shown = format_start(t, &Utc);
        assert_eq!(shown, "2023-11-14T22:13:20");
        assert_eq!(parse_start(&shown, &Utc).unwrap(), t);
    }

    #[test]
    fn start_is_read_in_the_given_zone() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            parse_start("2023-11-14T23:13:20", &tz).unwrap(),
            1_700_000_000.0
        );
        assert_eq!(parse_start("2023-11-14T23:13", &tz).unwrap(), 1_699_999_980.0);
    }

    #[test]
    fn bad_start_is_rejected() {
        assert!(matches!(
            parse_start("yesterday", &Utc),
            Err(Error::InvalidStartTime(_))
        ));
    }

    #[test]
    fn moving_start_keeps_duration() {
        let window = TimeWindow { start: 1000.0, stop: 1600.0 };
        assert_eq!(starting_at(window, 5000.0), TimeWindow { start: 5000.0, stop: 5600.0 });
    }
}
