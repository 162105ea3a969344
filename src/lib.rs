//! Check-in eligibility and duplicate guarding for Doulos fellowship meetings.
//!
//! [`window::evaluate`] answers "may attendance be submitted now?" and
//! [`guard::classify`] decides what to do with a single check-in attempt.
//! Both are pure; [`db`] and the CLI binary wire them to Postgres.

pub mod config;
pub mod db;
pub mod guard;
pub mod models;
pub mod registry;
pub mod report;
pub mod window;

pub use guard::{classify, classify_async, GuardDecision};
pub use models::{CheckInAttempt, Meeting, Member};
pub use window::{evaluate, EligibilityResult, TimeWindow};
