//! Recurring weekly check-in window.
//!
//! A [`TimeWindow`] names one weekday plus a half-open minute range
//! `[start, end)`. [`evaluate`] decides whether attendance may be submitted
//! at a given instant and explains why not when it may not.

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::Meeting;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("day of week {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    DayOutOfRange(u8),
    #[error("minute of day {0} is out of range (0..1440)")]
    MinuteOutOfRange(u16),
    #[error("window start {start} must be before end {end}")]
    Empty { start: String, end: String },
    #[error("invalid clock time '{0}', expected HH:MM")]
    InvalidClock(String),
}

/// Weekly slot during which check-ins are accepted.
///
/// Fields are private so every value has passed [`TimeWindow::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    day_of_week: u8,
    start_minutes_of_day: u16,
    end_minutes_of_day: u16,
}

impl TimeWindow {
    pub fn new(
        day_of_week: u8,
        start_minutes_of_day: u16,
        end_minutes_of_day: u16,
    ) -> Result<Self, WindowError> {
        if day_of_week > 6 {
            return Err(WindowError::DayOutOfRange(day_of_week));
        }
        for minutes in [start_minutes_of_day, end_minutes_of_day] {
            if minutes >= MINUTES_PER_DAY {
                return Err(WindowError::MinuteOutOfRange(minutes));
            }
        }
        if start_minutes_of_day >= end_minutes_of_day {
            return Err(WindowError::Empty {
                start: format_clock(start_minutes_of_day),
                end: format_clock(end_minutes_of_day),
            });
        }

        Ok(Self {
            day_of_week,
            start_minutes_of_day,
            end_minutes_of_day,
        })
    }

    pub fn parse(day_of_week: u8, start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(day_of_week, parse_clock(start)?, parse_clock(end)?)
    }

    /// One-off window on the meeting's own weekday and scheduled times.
    pub fn for_meeting(meeting: &Meeting) -> Result<Self, WindowError> {
        let day = meeting.date.weekday().num_days_from_sunday() as u8;
        Self::parse(day, &meeting.start_time, &meeting.end_time)
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn weekday(&self) -> Weekday {
        weekday_from_sunday(self.day_of_week)
    }

    pub fn start_minutes_of_day(&self) -> u16 {
        self.start_minutes_of_day
    }

    pub fn end_minutes_of_day(&self) -> u16 {
        self.end_minutes_of_day
    }
}

impl Default for TimeWindow {
    /// Monday 20:30 to 23:00.
    fn default() -> Self {
        Self {
            day_of_week: 1,
            start_minutes_of_day: 20 * 60 + 30,
            end_minutes_of_day: 23 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub is_open: bool,
    pub reason: String,
}

/// Evaluates `now` against `window`. Start is inclusive, end exclusive.
pub fn evaluate<T>(now: &T, window: &TimeWindow) -> EligibilityResult
where
    T: Datelike + Timelike,
{
    if now.weekday().num_days_from_sunday() as u8 != window.day_of_week {
        return closed(format!("It is not {}.", day_name(window.weekday())));
    }

    let now_minutes = now.hour() * 60 + now.minute();

    if now_minutes < u32::from(window.start_minutes_of_day) {
        return closed(format!(
            "Meeting has not started yet (Start: {}).",
            format_twelve_hour(window.start_minutes_of_day)
        ));
    }

    if now_minutes >= u32::from(window.end_minutes_of_day) {
        return closed(format!(
            "Meeting has ended (End: {}).",
            format_twelve_hour(window.end_minutes_of_day)
        ));
    }

    EligibilityResult {
        is_open: true,
        reason: "Attendance is open.".to_string(),
    }
}

fn closed(reason: String) -> EligibilityResult {
    EligibilityResult {
        is_open: false,
        reason,
    }
}

/// Parses "HH:MM" (24-hour) into minutes since midnight.
pub fn parse_clock(value: &str) -> Result<u16, WindowError> {
    let invalid = || WindowError::InvalidClock(value.to_string());
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;

    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

fn format_clock(minutes_of_day: u16) -> String {
    format!("{:02}:{:02}", minutes_of_day / 60, minutes_of_day % 60)
}

/// "8:30 PM" style rendering used in user-facing reasons.
pub fn format_twelve_hour(minutes_of_day: u16) -> String {
    let hours = minutes_of_day / 60;
    let minutes = minutes_of_day % 60;
    let suffix = if hours >= 12 { "PM" } else { "AM" };
    let display_hour = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{minutes:02} {suffix}")
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

fn weekday_from_sunday(day_of_week: u8) -> Weekday {
    (0..day_of_week).fold(Weekday::Sun, |day, _| day.succ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    // 2026-03-02 is a Monday.
    const MONDAY: &str = "2026-03-02";

    #[test]
    fn start_is_inclusive_and_end_is_exclusive() {
        let window = TimeWindow::default();
        assert!(evaluate(&at(&format!("{MONDAY} 20:30:00")), &window).is_open);
        assert!(evaluate(&at(&format!("{MONDAY} 22:59:59")), &window).is_open);

        let ended = evaluate(&at(&format!("{MONDAY} 23:00:00")), &window);
        assert!(!ended.is_open);
        assert_eq!(ended.reason, "Meeting has ended (End: 11:00 PM).");
    }

    #[test]
    fn before_start_reports_start_time() {
        let window = TimeWindow::default();
        let result = evaluate(&at(&format!("{MONDAY} 20:29:59")), &window);
        assert!(!result.is_open);
        assert_eq!(result.reason, "Meeting has not started yet (Start: 8:30 PM).");
    }

    #[test]
    fn other_days_are_closed_all_day() {
        let window = TimeWindow::default();
        for day in 3..=8 {
            for time in ["00:00:00", "20:45:00", "23:59:00"] {
                let now = at(&format!("2026-03-0{day} {time}"));
                let result = evaluate(&now, &window);
                assert!(!result.is_open);
                assert_eq!(result.reason, "It is not Monday.");
            }
        }
    }

    #[test]
    fn open_window_reason() {
        let result = evaluate(&at(&format!("{MONDAY} 21:00:00")), &TimeWindow::default());
        assert_eq!(
            result,
            EligibilityResult {
                is_open: true,
                reason: "Attendance is open.".to_string(),
            }
        );
    }

    #[test]
    fn evaluation_is_repeatable() {
        let now = at(&format!("{MONDAY} 21:15:00"));
        let window = TimeWindow::parse(1, "21:00", "21:30").unwrap();
        assert_eq!(evaluate(&now, &window), evaluate(&now, &window));
    }

    #[test]
    fn rejects_malformed_windows() {
        assert_eq!(TimeWindow::new(7, 0, 10), Err(WindowError::DayOutOfRange(7)));
        assert_eq!(
            TimeWindow::new(1, 0, 1440),
            Err(WindowError::MinuteOutOfRange(1440))
        );
        assert!(matches!(
            TimeWindow::parse(1, "23:00", "20:30"),
            Err(WindowError::Empty { .. })
        ));
        assert!(matches!(
            TimeWindow::parse(1, "20:30", "20:30"),
            Err(WindowError::Empty { .. })
        ));
    }

    #[test]
    fn parses_clock_strings() {
        assert_eq!(parse_clock("20:30"), Ok(1230));
        assert_eq!(parse_clock("7:05"), Ok(425));
        assert!(parse_clock("24:00").is_err());
        assert!(parse_clock("8pm").is_err());
        assert!(parse_clock("").is_err());
    }

    #[test]
    fn twelve_hour_formatting() {
        assert_eq!(format_twelve_hour(0), "12:00 AM");
        assert_eq!(format_twelve_hour(5), "12:05 AM");
        assert_eq!(format_twelve_hour(12 * 60), "12:00 PM");
        assert_eq!(format_twelve_hour(20 * 60 + 30), "8:30 PM");
    }

    #[test]
    fn weekday_mapping_starts_on_sunday() {
        assert_eq!(TimeWindow::parse(0, "09:00", "10:00").unwrap().weekday(), Weekday::Sun);
        assert_eq!(TimeWindow::default().weekday(), Weekday::Mon);
        assert_eq!(TimeWindow::parse(6, "09:00", "10:00").unwrap().weekday(), Weekday::Sat);
    }

    #[test]
    fn window_follows_meeting_schedule() {
        let meeting = Meeting {
            id: uuid::Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            start_time: "18:00".to_string(),
            end_time: "19:30".to_string(),
            campus: "Main".to_string(),
        };
        let window = TimeWindow::for_meeting(&meeting).unwrap();
        assert_eq!(window.weekday(), Weekday::Wed);
        assert_eq!(window.start_minutes_of_day(), 18 * 60);
        assert_eq!(window.end_minutes_of_day(), 19 * 60 + 30);
    }
}
