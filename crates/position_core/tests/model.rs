use chrono::{TimeZone, Utc};
use position_core::{Item, Position, ValidationError};
use uuid::Uuid;

#[test]
fn item_with_id_validates_name() {
    let id = Uuid::new_v4();
    let created_at = Utc::now();

    assert!(Item::with_id(id, "harper", created_at).is_ok());
    assert_eq!(
        Item::with_id(id, "  ", created_at).unwrap_err(),
        ValidationError::EmptyName
    );
    assert_eq!(
        Item::with_id(Uuid::nil(), "harper", created_at).unwrap_err(),
        ValidationError::NilId
    );
    assert!(matches!(
        Item::with_id(id, "é".repeat(256), created_at),
        Err(ValidationError::NameTooLong { chars: 256 })
    ));
    assert!(Item::with_id(id, "é".repeat(255), created_at).is_ok());
}

#[test]
fn position_serialization_uses_expected_wire_fields() {
    let item_id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut pos = Position::with_recorded_at(
        item_id,
        41.8781,
        -87.6298,
        None,
        Utc.with_ymd_and_hms(2026, 2, 13, 10, 0, 0).unwrap(),
    );
    pos.created_at = pos.recorded_at;

    let json = serde_json::to_value(&pos).unwrap();
    assert_eq!(json["item_id"], "11111111-2222-4333-8444-555555555555");
    assert_eq!(json["latitude"], 41.8781);
    assert_eq!(json["recorded_at"], "2026-02-13T10:00:00Z");
    assert!(json.get("label").is_none());

    pos.label = Some("chicago".to_string());
    let json = serde_json::to_value(&pos).unwrap();
    assert_eq!(json["label"], "chicago");

    let decoded: Position = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, pos);
}
