use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::DuplicatePolicy;
use crate::guard::{normalize_registration_number, week_bounds};
use crate::models::{AttendanceRecord, Meeting, Member};
use crate::registry::{parse_timestamp, warn_collision, ImportKeys, MemberRow};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let members = vec![
        ("220001", "Grace Otieno", "student", Some("2026-02-23T21:05:00")),
        ("210457", "Samuel Kiprono", "student", None),
        ("190032", "Ruth Wanjiru", "leader", Some("2026-02-16T20:40:00")),
    ];

    for (number, name, member_type, last_seen) in members {
        let last_seen_at = last_seen.map(parse_timestamp).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO doulos.members (registration_number, full_name, member_type, last_seen_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (registration_number) DO UPDATE
            SET full_name = EXCLUDED.full_name, member_type = EXCLUDED.member_type
            "#,
        )
        .bind(number)
        .bind(name)
        .bind(member_type)
        .bind(last_seen_at)
        .execute(pool)
        .await?;
    }

    let meeting_id = Uuid::parse_str("8f0c3a52-6a7e-4c1b-9d43-0b5e2f7a91c4")?;
    sqlx::query(
        r#"
        INSERT INTO doulos.meetings (id, meeting_date, start_time, end_time, campus)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(meeting_id)
    .bind(NaiveDate::from_ymd_opt(2026, 3, 2).context("invalid date")?)
    .bind("20:30")
    .bind("23:00")
    .bind("Main")
    .execute(pool)
    .await?;

    tracing::info!(%meeting_id, "seed data inserted");
    Ok(meeting_id)
}

/// Upserts members from a `registration_number,name,member_type,last_seen_at` CSV.
pub async fn import_members_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut upserted = 0usize;
    let mut keys = ImportKeys::default();

    for (index, result) in reader.deserialize::<MemberRow>().enumerate() {
        let member = result
            .with_context(|| format!("invalid member row {}", index + 1))?
            .into_member()?;
        let number = normalize_registration_number(&member.registration_number);

        if number.is_empty() {
            tracing::warn!(row = index + 1, "skipping member without registration number");
            continue;
        }

        if let Some(replaced) = keys.note(&number, &member.name) {
            warn_collision(&number, &replaced);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO doulos.members (registration_number, full_name, member_type, last_seen_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (registration_number) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                member_type = EXCLUDED.member_type,
                last_seen_at = COALESCE(EXCLUDED.last_seen_at, doulos.members.last_seen_at)
            "#,
        )
        .bind(&number)
        .bind(&member.name)
        .bind(&member.member_type)
        .bind(member.last_seen_at)
        .execute(pool)
        .await?;

        upserted += result.rows_affected() as usize;
    }

    Ok(upserted)
}

pub async fn find_member(pool: &PgPool, normalized: &str) -> anyhow::Result<Option<Member>> {
    let row = sqlx::query(
        r#"
        SELECT registration_number, full_name, member_type, last_seen_at
        FROM doulos.members
        WHERE registration_number = $1
        "#,
    )
    .bind(normalized)
    .fetch_optional(pool)
    .await
    .context("member lookup failed")?;

    Ok(row.map(|row| Member {
        registration_number: row.get("registration_number"),
        name: row.get("full_name"),
        last_seen_at: row.get("last_seen_at"),
        member_type: row.get("member_type"),
    }))
}

pub async fn latest_attendance_in_week(
    pool: &PgPool,
    normalized: &str,
    meeting_date: NaiveDate,
) -> anyhow::Result<Option<NaiveDateTime>> {
    let (start, end) = week_bounds(meeting_date);
    let row = sqlx::query(
        r#"
        SELECT max(checked_in_at) AS latest
        FROM doulos.attendance
        WHERE registration_number = $1 AND checked_in_at BETWEEN $2 AND $3
        "#,
    )
    .bind(normalized)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(row.get("latest"))
}

/// Member lookup for the guard. Under [`DuplicatePolicy::Ledger`] the
/// member's `last_seen_at` is replaced with their latest attendance in the
/// meeting's week.
pub async fn find_member_for_guard(
    pool: &PgPool,
    normalized: &str,
    meeting_date: NaiveDate,
    policy: DuplicatePolicy,
) -> anyhow::Result<Option<Member>> {
    let Some(member) = find_member(pool, normalized).await? else {
        return Ok(None);
    };

    let ledger_latest = match policy {
        DuplicatePolicy::LastSeen => None,
        DuplicatePolicy::Ledger => latest_attendance_in_week(pool, normalized, meeting_date).await?,
    };

    Ok(Some(apply_duplicate_policy(member, policy, ledger_latest)))
}

/// Picks the "last seen" evidence the guard will check. Under the ledger
/// policy an empty ledger clears `last_seen_at`, since the rolling field may
/// have been moved by something other than attendance.
pub fn apply_duplicate_policy(
    mut member: Member,
    policy: DuplicatePolicy,
    ledger_latest: Option<NaiveDateTime>,
) -> Member {
    if policy == DuplicatePolicy::Ledger {
        member.last_seen_at = ledger_latest;
    }
    member
}

/// `last_seen_at` only moves forward; a back-dated check-in keeps the newer value.
pub fn advance_last_seen(
    current: Option<NaiveDateTime>,
    checked_in_at: NaiveDateTime,
) -> NaiveDateTime {
    current.map_or(checked_in_at, |seen| seen.max(checked_in_at))
}

pub async fn find_meeting(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Meeting>> {
    let row = sqlx::query(
        r#"
        SELECT id, meeting_date, start_time, end_time, campus
        FROM doulos.meetings
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Meeting {
        id: row.get("id"),
        date: row.get("meeting_date"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        campus: row.get("campus"),
    }))
}

/// Writes an admitted check-in and advances the member's `last_seen_at`.
/// Unknown members are created as type `new`. Returns `false` when the member
/// was already recorded for this meeting.
pub async fn record_attendance(
    pool: &PgPool,
    meeting: &Meeting,
    normalized: &str,
    name: &str,
    checked_in_at: NaiveDateTime,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO doulos.members (registration_number, full_name, member_type)
        VALUES ($1, $2, 'new')
        ON CONFLICT (registration_number) DO NOTHING
        "#,
    )
    .bind(normalized)
    .bind(name)
    .execute(&mut *tx)
    .await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO doulos.attendance
        (id, meeting_id, registration_number, full_name, checked_in_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (meeting_id, registration_number) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(meeting.id)
    .bind(normalized)
    .bind(name)
    .bind(checked_in_at)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    if inserted {
        let current: Option<NaiveDateTime> = sqlx::query(
            "SELECT last_seen_at FROM doulos.members WHERE registration_number = $1 FOR UPDATE",
        )
        .bind(normalized)
        .fetch_one(&mut *tx)
        .await?
        .get("last_seen_at");

        let advanced = advance_last_seen(current, checked_in_at);
        if current != Some(advanced) {
            sqlx::query(
                "UPDATE doulos.members SET last_seen_at = $2 WHERE registration_number = $1",
            )
            .bind(normalized)
            .bind(advanced)
            .execute(&mut *tx)
            .await?;
        } else {
            tracing::debug!(
                registration_number = normalized,
                %checked_in_at,
                "back-dated check-in left last_seen_at unchanged"
            );
        }
    }

    tx.commit().await?;
    tracing::debug!(meeting_id = %meeting.id, registration_number = normalized, inserted, "attendance recorded");
    Ok(inserted)
}

pub async fn fetch_attendance(
    pool: &PgPool,
    since_date: NaiveDate,
    campus: Option<&str>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut query = String::from(
        "SELECT a.id, a.meeting_id, m.meeting_date, m.campus, a.registration_number, \
         a.full_name, a.checked_in_at \
         FROM doulos.attendance a \
         JOIN doulos.meetings m ON m.id = a.meeting_id \
         WHERE m.meeting_date >= $1",
    );

    if campus.is_some() {
        query.push_str(" AND m.campus = $2");
    }

    let mut rows = sqlx::query(&query).bind(since_date);

    if let Some(value) = campus {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;

    Ok(records
        .into_iter()
        .map(|row| AttendanceRecord {
            id: row.get("id"),
            meeting_id: row.get("meeting_id"),
            meeting_date: row.get("meeting_date"),
            campus: row.get("campus"),
            registration_number: row.get("registration_number"),
            name: row.get("full_name"),
            checked_in_at: row.get("checked_in_at"),
        })
        .collect())
}
