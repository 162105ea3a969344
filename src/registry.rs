use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;

use crate::guard::normalize_registration_number;
use crate::models::Member;

pub trait MemberRegistry {
    /// Looks up a member by an already normalized registration number.
    fn lookup(&self, normalized: &str) -> Option<Member>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    members: HashMap<String, Member>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `member` under its normalized number. Returns the member it
    /// displaced, which happens when two raw numbers normalize to the same key.
    pub fn insert(&mut self, mut member: Member) -> Option<Member> {
        member.registration_number = normalize_registration_number(&member.registration_number);
        self.members.insert(member.registration_number.clone(), member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Loads `registration_number,name,member_type,last_seen_at` rows.
    pub fn from_csv_path(path: &Path) -> anyhow::Result<Self> {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_csv_reader(reader)
    }

    pub fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        for (index, result) in reader.deserialize::<MemberRow>().enumerate() {
            let row = result.with_context(|| format!("invalid member row {}", index + 1))?;
            let member = row.into_member()?;
            if normalize_registration_number(&member.registration_number).is_empty() {
                tracing::warn!(row = index + 1, "skipping member without registration number");
                continue;
            }
            if let Some(previous) = registry.insert(member) {
                warn_collision(&previous.registration_number, &previous.name);
            }
        }

        Ok(registry)
    }
}

impl MemberRegistry for InMemoryRegistry {
    fn lookup(&self, normalized: &str) -> Option<Member> {
        self.members.get(normalized).cloned()
    }
}

/// Normalized keys seen during one import, so a later row that lands on an
/// earlier row's key gets reported instead of silently replacing it.
#[derive(Debug, Default)]
pub(crate) struct ImportKeys {
    seen: HashMap<String, String>,
}

impl ImportKeys {
    /// Returns the earlier row's name when `normalized` was already imported.
    pub(crate) fn note(&mut self, normalized: &str, name: &str) -> Option<String> {
        self.seen.insert(normalized.to_string(), name.to_string())
    }
}

pub(crate) fn warn_collision(normalized: &str, replaced: &str) {
    tracing::warn!(
        registration_number = normalized,
        replaced,
        "registration number collision after normalization"
    );
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct MemberRow {
    pub(crate) registration_number: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) member_type: String,
    #[serde(default)]
    pub(crate) last_seen_at: Option<String>,
}

impl MemberRow {
    pub(crate) fn into_member(self) -> anyhow::Result<Member> {
        let last_seen_at = match self.last_seen_at.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(parse_timestamp(value)?),
        };

        Ok(Member {
            registration_number: self.registration_number,
            name: self.name.trim().to_string(),
            last_seen_at,
            member_type: if self.member_type.trim().is_empty() {
                "student".to_string()
            } else {
                self.member_type.trim().to_string()
            },
        })
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM` style local timestamps.
pub fn parse_timestamp(value: &str) -> anyhow::Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .with_context(|| format!("invalid timestamp '{value}'"))
}
