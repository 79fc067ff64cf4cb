use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// The session's date or time column does not hold a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session datetime {date:?} {time:?}")]
pub struct InvalidSessionTime {
    pub date: String,
    pub time: String,
}

/// Start instant of a session stored as `YYYY-MM-DD` + `HH:MM[:SS]`, in UTC.
pub fn session_start(date: &str, time: &str) -> Result<DateTime<Utc>, InvalidSessionTime> {
    let invalid = || InvalidSessionTime {
        date: date.to_string(),
        time: time.to_string(),
    };

    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let time = time.trim();
    let clock = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| invalid())?;

    Ok(day.and_time(clock).and_utc())
}
