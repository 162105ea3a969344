use chrono::{NaiveDate, NaiveDateTime};
use doulos_checkin::registry::{InMemoryRegistry, MemberRegistry};
use doulos_checkin::{classify, evaluate, CheckInAttempt, GuardDecision, Meeting, Member, TimeWindow};
use uuid::Uuid;

fn monday_meeting() -> Meeting {
    Meeting {
        id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        start_time: "20:30".to_string(),
        end_time: "23:00".to_string(),
        campus: "Main".to_string(),
    }
}

fn registry() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.insert(Member {
        registration_number: "22-0001".to_string(),
        name: "Grace Otieno".to_string(),
        last_seen_at: NaiveDateTime::parse_from_str("2026-02-23 21:05", "%Y-%m-%d %H:%M").ok(),
        member_type: "student".to_string(),
    });
    registry
}

#[test]
fn new_member_is_onboarded_during_open_window() {
    let window = TimeWindow::parse(1, "20:30", "23:00").unwrap();
    let now = NaiveDateTime::parse_from_str("2026-03-02 21:00", "%Y-%m-%d %H:%M").unwrap();
    assert!(evaluate(&now, &window).is_open);

    let meeting = monday_meeting();
    let registry = registry();
    let attempt = CheckInAttempt::new(meeting.id, "19-1234");

    let first = classify(&attempt, &meeting, |number| registry.lookup(number));
    assert_eq!(first, GuardDecision::RequiresName);

    let retry = attempt.with_name("John Doe");
    let second = classify(&retry, &meeting, |number| registry.lookup(number));
    assert_eq!(
        second,
        GuardDecision::Admit {
            resolved_name: "John Doe".to_string()
        }
    );
}

#[test]
fn repeat_check_in_needs_confirmation_then_admits() {
    let meeting = monday_meeting();
    let mut registry = registry();
    // Grace was recorded on Sunday of the meeting's week.
    registry.insert(Member {
        registration_number: "220001".to_string(),
        name: "Grace Otieno".to_string(),
        last_seen_at: NaiveDateTime::parse_from_str("2026-03-01 10:00", "%Y-%m-%d %H:%M").ok(),
        member_type: "student".to_string(),
    });

    let attempt = CheckInAttempt::new(meeting.id, "22 0001");
    let decision = classify(&attempt, &meeting, |number| registry.lookup(number));
    assert_eq!(
        decision,
        GuardDecision::RequiresConfirmation {
            resolved_name: "Grace Otieno".to_string(),
            last_seen_day_name: "Sunday".to_string(),
        }
    );

    let confirmed = attempt.confirmed();
    let decision = classify(&confirmed, &meeting, |number| registry.lookup(number));
    assert!(decision.is_admit());
}

#[test]
fn decisions_serialize_with_a_tag() {
    let json = serde_json::to_value(GuardDecision::RequiresName).unwrap();
    assert_eq!(json, serde_json::json!({ "decision": "requires_name" }));

    let json = serde_json::to_value(GuardDecision::Admit {
        resolved_name: "Jane Doe".to_string(),
    })
    .unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "decision": "admit", "resolved_name": "Jane Doe" })
    );
}
