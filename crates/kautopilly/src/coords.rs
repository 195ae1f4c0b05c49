//! Decimal degrees to degrees/minutes/seconds.

use std::fmt;

/// A coordinate broken into whole degrees, minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dms<'a> {
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub label: &'a str,
}

impl fmt::Display for Dms<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}°{:02}'{:02}\" {}",
            self.degrees, self.minutes, self.seconds, self.label
        )
    }
}

/// Splits `value` into truncated degrees, minutes and seconds.
///
/// Zero and positive values take `positive`, negative values take `negative`.
/// The magnitude is identical for `value` and `-value`. Non-finite input
/// formats as zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_dms<'a>(value: f64, positive: &'a str, negative: &'a str) -> Dms<'a> {
    if !value.is_finite() {
        return Dms {
            degrees: 0,
            minutes: 0,
            seconds: 0,
            label: positive,
        };
    }
    let (multiplier, label) = if value >= 0.0 {
        (3600.0, positive)
    } else {
        (-3600.0, negative)
    };
    let total_seconds = value * multiplier;
    let total_minutes = (total_seconds / 60.0).floor();
    let seconds = total_seconds - total_minutes * 60.0;
    let degrees = (total_minutes / 60.0).floor();
    let minutes = total_minutes - degrees * 60.0;
    Dms {
        degrees: degrees as u32,
        minutes: minutes as u32,
        seconds: seconds as u32,
        label,
    }
}

#[must_use]
pub fn latitude_dms(value: f64) -> Dms<'static> {
    to_dms(value, "N", "S")
}

#[must_use]
pub fn longitude_dms(value: f64) -> Dms<'static> {
    to_dms(value, "E", "W")
}
