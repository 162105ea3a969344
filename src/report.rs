use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::guard::week_bounds;
use crate::models::{AttendanceRecord, MeetingSummary, WeeklyTotal};

pub fn cutoff_date(today: NaiveDate, since_days: i64) -> NaiveDate {
    today - Duration::days(since_days.max(1))
}

/// Headcount per meeting, newest meeting first.
pub fn summarize_by_meeting(records: &[AttendanceRecord]) -> Vec<MeetingSummary> {
    let mut map: HashMap<Uuid, MeetingSummary> = HashMap::new();

    for record in records {
        map.entry(record.meeting_id)
            .or_insert_with(|| MeetingSummary {
                meeting_id: record.meeting_id,
                meeting_date: record.meeting_date,
                campus: record.campus.clone(),
                headcount: 0,
            })
            .headcount += 1;
    }

    let mut summaries: Vec<MeetingSummary> = map.into_values().collect();
    summaries.sort_by(|a, b| {
        b.meeting_date
            .cmp(&a.meeting_date)
            .then_with(|| a.campus.cmp(&b.campus))
    });
    summaries
}

/// Check-ins grouped into Sunday-start weeks of the meeting date, oldest first.
pub fn weekly_totals(records: &[AttendanceRecord]) -> Vec<WeeklyTotal> {
    let mut weeks: BTreeMap<NaiveDate, (usize, HashSet<&str>)> = BTreeMap::new();

    for record in records {
        let week_start = week_bounds(record.meeting_date).0.date();
        let entry = weeks.entry(week_start).or_default();
        entry.0 += 1;
        entry.1.insert(record.registration_number.as_str());
    }

    weeks
        .into_iter()
        .map(|(week_start, (check_ins, members))| WeeklyTotal {
            week_start,
            check_ins,
            unique_members: members.len(),
        })
        .collect()
}

pub fn build_report(campus: Option<&str>, since: NaiveDate, records: &[AttendanceRecord]) -> String {
    let meetings = summarize_by_meeting(records);
    let weeks = weekly_totals(records);

    let mut output = String::new();
    let campus_label = campus.unwrap_or("all campuses");

    let _ = writeln!(output, "# Doulos Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} (meetings since {})",
        campus_label, since
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Meetings");

    if meetings.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        for meeting in meetings.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): {} present",
                meeting.meeting_date, meeting.campus, meeting.headcount
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Totals");

    if weeks.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        for week in weeks.iter() {
            let _ = writeln!(
                output,
                "- Week of {}: {} check-ins from {} members",
                week.week_start, week.check_ins, week.unique_members
            );
        }
    }

    let mut recent = records.to_vec();
    recent.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Check-ins");

    if recent.is_empty() {
        let _ = writeln!(output, "No check-ins recorded for this window.");
    } else {
        for record in recent.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) at {}",
                record.name,
                record.registration_number,
                record.checked_in_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn record(meeting_id: Uuid, date: &str, number: &str, name: &str) -> AttendanceRecord {
        let meeting_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        AttendanceRecord {
            id: Uuid::new_v4(),
            meeting_id,
            meeting_date,
            campus: "Main".to_string(),
            registration_number: number.to_string(),
            name: name.to_string(),
            checked_in_at: NaiveDateTime::new(
                meeting_date,
                chrono::NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            ),
        }
    }

    fn sample() -> Vec<AttendanceRecord> {
        let monday = Uuid::new_v4();
        let thursday = Uuid::new_v4();
        let next_monday = Uuid::new_v4();
        vec![
            record(monday, "2026-03-02", "220001", "Grace Otieno"),
            record(monday, "2026-03-02", "210457", "Samuel Kiprono"),
            record(thursday, "2026-03-05", "220001", "Grace Otieno"),
            record(next_monday, "2026-03-09", "190032", "Ruth Wanjiru"),
        ]
    }

    #[test]
    fn meetings_are_counted_newest_first() {
        let summaries = summarize_by_meeting(&sample());
        let counts: Vec<(String, usize)> = summaries
            .iter()
            .map(|s| (s.meeting_date.to_string(), s.headcount))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("2026-03-09".to_string(), 1),
                ("2026-03-05".to_string(), 1),
                ("2026-03-02".to_string(), 2),
            ]
        );
    }

    #[test]
    fn weeks_start_on_sunday_and_count_unique_members() {
        let weeks = weekly_totals(&sample());
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_start.to_string(), "2026-03-01");
        assert_eq!(weeks[0].check_ins, 3);
        assert_eq!(weeks[0].unique_members, 2);
        assert_eq!(weeks[1].week_start.to_string(), "2026-03-08");
        assert_eq!(weeks[1].unique_members, 1);
    }

    #[test]
    fn report_lists_sections() {
        let since = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let report = build_report(Some("Main"), since, &sample());
        assert!(report.starts_with("# Doulos Attendance Report"));
        assert!(report.contains("Generated for Main (meetings since 2026-03-01)"));
        assert!(report.contains("- 2026-03-02 (Main): 2 present"));
        assert!(report.contains("- Week of 2026-03-01: 3 check-ins from 2 members"));
        assert!(report.contains("- Ruth Wanjiru (190032) at 2026-03-09 21:00"));
    }

    #[test]
    fn cutoff_date_respects_since_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(cutoff_date(today, 14).to_string(), "2026-03-01");
        assert_eq!(cutoff_date(today, 0).to_string(), "2026-03-14");
    }

    #[test]
    fn empty_report_says_so() {
        let since = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let report = build_report(None, since, &[]);
        assert!(report.contains("all campuses"));
        assert_eq!(report.matches("No check-ins recorded").count(), 3);
    }
}
