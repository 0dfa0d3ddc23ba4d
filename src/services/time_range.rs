use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::errors::{PvError, PvResult};

/// Step between consecutive instants of a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    OneMinute,
    TenMinutes,
    TwentyMinutes,
    ThirtyMinutes,
    #[default]
    OneHour,
}

impl Resolution {
    pub fn minutes(self) -> i64 {
        match self {
            Resolution::OneMinute => 1,
            Resolution::TenMinutes => 10,
            Resolution::TwentyMinutes => 20,
            Resolution::ThirtyMinutes => 30,
            Resolution::OneHour => 60,
        }
    }

    pub fn step(self) -> TimeDelta {
        TimeDelta::minutes(self.minutes())
    }

    pub fn token(self) -> &'static str {
        match self {
            Resolution::OneMinute => "1min",
            Resolution::TenMinutes => "10min",
            Resolution::TwentyMinutes => "20min",
            Resolution::ThirtyMinutes => "30min",
            Resolution::OneHour => "1H",
        }
    }
}

impl FromStr for Resolution {
    type Err = PvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Resolution::OneMinute),
            "10min" => Ok(Resolution::TenMinutes),
            "20min" => Ok(Resolution::TwentyMinutes),
            "30min" => Ok(Resolution::ThirtyMinutes),
            "1H" => Ok(Resolution::OneHour),
            other => Err(PvError::InvalidResolution(other.to_string())),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Parses `YYYY-MM-DD:YYYY-MM-DD` into an inclusive date pair.
pub fn parse_timeframe(timeframe: &str) -> PvResult<(NaiveDate, NaiveDate)> {
    let (start, end) = timeframe.split_once(':').ok_or_else(|| {
        PvError::InvalidRange(format!(
            "'{timeframe}' is not in the format YYYY-MM-DD:YYYY-MM-DD"
        ))
    })?;
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if end < start {
        return Err(PvError::InvalidRange(format!(
            "end date {end} is before start date {start}"
        )));
    }
    Ok((start, end))
}

fn parse_date(s: &str) -> PvResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| PvError::InvalidRange(format!("cannot parse date '{s}': {e}")))
}

/// Every instant from 00:00 on `start` up to, but excluding, 00:00 on the day
/// after `end`, `resolution` apart in absolute time.
pub fn build_time_range(
    start: NaiveDate,
    end: NaiveDate,
    resolution: Resolution,
    tz: Tz,
) -> PvResult<Vec<DateTime<Tz>>> {
    if end < start {
        return Err(PvError::InvalidRange(format!(
            "end date {end} is before start date {start}"
        )));
    }
    let after_end = end
        .succ_opt()
        .ok_or_else(|| PvError::InvalidRange(format!("end date {end} is out of range")))?;

    let first = start_of_day(&tz, start)?;
    let stop = start_of_day(&tz, after_end)?;
    let step = resolution.step();

    let capacity = ((stop - first).num_minutes() / resolution.minutes()).max(0) as usize;
    let mut times = Vec::with_capacity(capacity);
    let mut t = first;
    while t < stop {
        times.push(t);
        t += step;
    }

    tracing::debug!(
        %start, %end, %resolution, %tz,
        samples = times.len(),
        "built time range"
    );
    Ok(times)
}

/// First instant of `date` in `tz`; later than 00:00 when midnight falls in
/// a DST gap.
fn start_of_day(tz: &Tz, date: NaiveDate) -> PvResult<DateTime<Tz>> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // Gaps are at most a few hours wide
    for minutes in 0..=24 * 60 {
        match tz.from_local_datetime(&(midnight + TimeDelta::minutes(minutes))) {
            LocalResult::Single(t) => return Ok(t),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => continue,
        }
    }
    Err(PvError::InvalidRange(format!("{date} does not exist in {tz}")))
}

/// Attaches `tz` to a naive local time without converting it.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> PvResult<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Ok(t),
        LocalResult::Ambiguous(earliest, latest) => {
            tracing::warn!(
                "{naive} is ambiguous in {tz}, using {} (not {})",
                earliest.format("%H:%M %Z"),
                latest.format("%H:%M %Z")
            );
            Ok(earliest)
        }
        LocalResult::None => Err(PvError::argument(format!(
            "local time {naive} does not exist in {tz} (DST gap)"
        ))),
    }
}
