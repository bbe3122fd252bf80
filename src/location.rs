//! Shareable `<from>/<to>[/<id>]` address of the current view.

use std::fmt;

use crate::error::{Error, Result};
use crate::timeline::TimeWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub window: TimeWindow,
    /// Identifier of the event whose detail is open.
    pub selected: Option<String>,
}

impl Location {
    /// The `default_window` seconds leading up to `now`, nothing selected.
    pub fn recent(now: f64, default_window: f64) -> Self {
        Self {
            window: TimeWindow::last(default_window, now),
            selected: None,
        }
    }

    /// Parse a location string. An empty string yields [`Location::recent`].
    pub fn parse(input: &str, now: f64, default_window: f64) -> Result<Self> {
        let trimmed = input.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::recent(now, default_window));
        }

        let invalid = |reason: &str| Error::InvalidLocation {
            location: input.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = trimmed.split('/').collect();
        let (from, to, selected) = match parts.as_slice() {
            [from, to] => (*from, *to, None),
            [from, to, id] if !id.is_empty() => (*from, *to, Some(id.to_string())),
            _ => return Err(invalid("expected <from>/<to>[/<id>]")),
        };

        let from: f64 = from.parse().map_err(|_| invalid("<from> is not a number"))?;
        let to: f64 = to.parse().map_err(|_| invalid("<to> is not a number"))?;
        let window = TimeWindow::new(from, to).map_err(|_| invalid("<to> must be after <from>"))?;

        Ok(Self { window, selected })
    }

    pub fn with_selected(&self, selected: Option<String>) -> Self {
        Self {
            window: self.window,
            selected,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.window.start, self.window.stop)?;
        if let Some(id) = &self.selected {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}
