//! Round time increments for the axis and their labels.

use chrono::{DateTime, Offset, TimeZone, Timelike};

/// Roughly how many ticks the axis aims for.
pub const TICK_COUNT: usize = 15;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// Candidate tick increments, in seconds.
const STEPS: [f64; 15] = [
    1.0,
    5.0,
    15.0,
    30.0,
    MINUTE,
    5.0 * MINUTE,
    15.0 * MINUTE,
    30.0 * MINUTE,
    HOUR,
    3.0 * HOUR,
    6.0 * HOUR,
    12.0 * HOUR,
    DAY,
    2.0 * DAY,
    7.0 * DAY,
];

/// Choose a "nice" interval (power-of-ten multiplier) for a target interval.
pub fn nice_interval(interval: f64) -> f64 {
    if !interval.is_finite() || interval <= 0.0 {
        return 0.0;
    }

    let log10 = interval.log10().floor();
    let base = 10.0f64.powf(log10);
    let ratio = interval / base;
    if ratio <= 1.0 {
        base
    } else if ratio <= 2.0 {
        base * 2.0
    } else if ratio <= 5.0 {
        base * 5.0
    } else {
        base * 10.0
    }
}

/// Pick the round increment whose tick count over `span` seconds comes
/// closest to `count`.
pub fn tick_step(span: f64, count: usize) -> f64 {
    if !span.is_finite() || span <= 0.0 || count == 0 {
        return 0.0;
    }

    let target = span / count as f64;
    if target < STEPS[0] {
        return nice_interval(target);
    }
    if target > STEPS[STEPS.len() - 1] {
        return nice_interval(target / DAY) * DAY;
    }

    let i = STEPS.partition_point(|&step| step < target);
    if i == 0 {
        return STEPS[0];
    }
    let (lower, upper) = (STEPS[i - 1], STEPS[i]);
    if target / lower < upper / target {
        lower
    } else {
        upper
    }
}

/// Tick timestamps within `[start, stop]`, aligned to round wall-clock
/// values in `tz`.
pub fn time_ticks<Tz: TimeZone>(start: f64, stop: f64, count: usize, tz: &Tz) -> Vec<f64> {
    let (lo, hi) = if start <= stop { (start, stop) } else { (stop, start) };
    let step = tick_step(hi - lo, count);
    if step <= 0.0 {
        return Vec::new();
    }

    let offset = utc_offset(lo, tz);
    let first = ((lo + offset) / step).ceil() * step - offset;

    let mut ticks = Vec::new();
    let mut k = 0.0;
    loop {
        let t = first + k * step;
        if t > hi {
            break;
        }
        ticks.push(t);
        k += 1.0;
    }
    ticks
}

/// Label a tick, dropping trailing zero components.
pub fn format_tick<Tz: TimeZone>(t: f64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(time) = local_time(t, tz) else {
        return String::new();
    };

    if time.second() != 0 {
        time.format("%H:%M:%S").to_string()
    } else if time.minute() != 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:00").to_string()
    }
}

fn local_time<Tz: TimeZone>(t: f64, tz: &Tz) -> Option<DateTime<Tz>> {
    if !t.is_finite() {
        return None;
    }
    tz.timestamp_millis_opt((t * 1000.0).round() as i64).single()
}

fn utc_offset<Tz: TimeZone>(t: f64, tz: &Tz) -> f64 {
    local_time(t, tz)
        .map(|time| time.offset().fix().local_minus_utc() as f64)
        .unwrap_or(0.0)
}
