//! Duplicate and onboarding guard run before an attendance record is written.
//!
//! The guard never writes anything. It turns a raw [`CheckInAttempt`] into a
//! [`GuardDecision`]; prompting the operator and persisting the check-in are
//! the caller's job.

use std::future::Future;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::{CheckInAttempt, Meeting, Member};
use crate::window::day_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Admit {
        resolved_name: String,
    },
    /// Member already checked in during the meeting's week.
    RequiresConfirmation {
        resolved_name: String,
        last_seen_day_name: String,
    },
    /// Unknown member; retry with `name_override` set.
    RequiresName,
    Rejected {
        reason: String,
    },
}

impl GuardDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit { .. })
    }
}

/// Strips every non-digit so "22-0001" and "220001" compare equal.
pub fn normalize_registration_number(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Sunday 00:00:00.000 through Saturday 23:59:59.999 of the week holding `date`.
///
/// Weeks cut off by the calendar's limits are clamped to `NaiveDate::MIN`
/// and `NaiveDateTime::MAX`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let sunday = date
        .checked_sub_signed(Duration::days(i64::from(date.weekday().num_days_from_sunday())))
        .unwrap_or(NaiveDate::MIN);
    let start = sunday.and_time(NaiveTime::MIN);
    let end = start
        .checked_add_signed(Duration::days(7))
        .map(|next_sunday| next_sunday - Duration::milliseconds(1))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

pub fn classify<F>(attempt: &CheckInAttempt, meeting: &Meeting, lookup: F) -> GuardDecision
where
    F: FnOnce(&str) -> Option<Member>,
{
    match admissible_number(attempt) {
        Ok(normalized) => decide(attempt, meeting, lookup(&normalized)),
        Err(rejected) => rejected,
    }
}

/// Same as [`classify`] for registries behind I/O. Lookup failures are
/// returned as errors and never folded into a decision.
pub async fn classify_async<F, Fut, E>(
    attempt: &CheckInAttempt,
    meeting: &Meeting,
    lookup: F,
) -> Result<GuardDecision, E>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Option<Member>, E>>,
{
    let normalized = match admissible_number(attempt) {
        Ok(normalized) => normalized,
        Err(rejected) => return Ok(rejected),
    };
    let member = lookup(normalized).await?;
    Ok(decide(attempt, meeting, member))
}

/// A guard decision plus whether the persistence layer actually wrote a row.
/// `recorded` is `None` for decisions that never reach persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInOutcome {
    #[serde(flatten)]
    pub decision: GuardDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded: Option<bool>,
}

impl CheckInOutcome {
    pub fn new(decision: GuardDecision) -> Self {
        Self {
            decision,
            recorded: None,
        }
    }

    pub fn recorded(mut self, inserted: bool) -> Self {
        self.recorded = Some(inserted);
        self
    }

    /// Operator-facing line for the text CLI.
    pub fn message(&self) -> String {
        match &self.decision {
            GuardDecision::Admit { resolved_name } if self.recorded == Some(false) => {
                format!("{resolved_name} is already checked in to this meeting.")
            }
            GuardDecision::Admit { resolved_name } => format!("Checked in {resolved_name}."),
            GuardDecision::RequiresConfirmation {
                resolved_name,
                last_seen_day_name,
            } => format!(
                "{resolved_name} already checked in this week (last seen {last_seen_day_name}). \
                 Re-run with --confirm to record another check-in."
            ),
            GuardDecision::RequiresName => {
                "No member with that registration number. Re-run with --name to register them."
                    .to_string()
            }
            GuardDecision::Rejected { reason } => format!("Check-in rejected: {reason}."),
        }
    }
}

fn admissible_number(attempt: &CheckInAttempt) -> Result<String, GuardDecision> {
    let normalized = normalize_registration_number(&attempt.registration_number);
    if normalized.is_empty() {
        return Err(GuardDecision::Rejected {
            reason: "empty registration number".to_string(),
        });
    }
    Ok(normalized)
}

fn decide(attempt: &CheckInAttempt, meeting: &Meeting, member: Option<Member>) -> GuardDecision {
    match member {
        Some(member) => {
            let seen_this_week = member.last_seen_at.filter(|seen| {
                let (start, end) = week_bounds(meeting.date);
                *seen >= start && *seen <= end
            });

            match seen_this_week {
                Some(seen) if !attempt.confirmed_duplicate => GuardDecision::RequiresConfirmation {
                    resolved_name: member.name,
                    last_seen_day_name: day_name(seen.weekday()).to_string(),
                },
                _ => GuardDecision::Admit {
                    resolved_name: member.name,
                },
            }
        }
        None => match attempt
            .name_override
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            Some(name) => GuardDecision::Admit {
                resolved_name: name.to_string(),
            },
            None => GuardDecision::RequiresName,
        },
    }
}
