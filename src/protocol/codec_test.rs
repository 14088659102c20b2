use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use super::*;
use crate::room::UserInfo;

fn data_of(raw: &str) -> Value {
    let value: Value = serde_json::from_str(raw).expect("frame should be valid json");
    value["data"].clone()
}

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn parse_rejects_malformed_json() {
    assert_eq!(parse("{not json").unwrap_err(), ErrorCode::MalformedMessage);
    assert_eq!(parse("").unwrap_err(), ErrorCode::MalformedMessage);
}

#[test]
fn parse_rejects_non_object_frames() {
    assert_eq!(parse("[1, 2, 3]").unwrap_err(), ErrorCode::MalformedMessage);
    assert_eq!(parse("\"hello\"").unwrap_err(), ErrorCode::MalformedMessage);
}

#[test]
fn parse_maps_unknown_or_missing_type_to_unknown() {
    let msg = parse(r#"{"type":"frobnicate","seq":1}"#).unwrap();
    assert_eq!(msg.kind, MessageType::Unknown);

    let msg = parse(r#"{"seq":1}"#).unwrap();
    assert_eq!(msg.kind, MessageType::Unknown);

    // A non-string type tag is equally unknown.
    let msg = parse(r#"{"type":7}"#).unwrap();
    assert_eq!(msg.kind, MessageType::Unknown);
}

#[test]
fn parse_defaults_envelope_fields() {
    let msg = parse(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(msg.kind, MessageType::Ping);
    assert_eq!(msg.seq, 0);
    assert_eq!(msg.timestamp, 0);
    assert!(msg.data.is_empty());
}

#[test]
fn parse_reads_full_envelope() {
    let raw = json!({
        "type": "cursor_move",
        "seq": 9,
        "timestamp": 1700000000000_i64,
        "data": { "x": 1.5, "y": -2.0 },
    })
    .to_string();
    let msg = parse(&raw).unwrap();
    assert_eq!(msg.kind, MessageType::CursorMove);
    assert_eq!(msg.seq, 9);
    assert_eq!(msg.timestamp, 1_700_000_000_000);
    assert_eq!(msg.data.get("x").and_then(Value::as_f64), Some(1.5));
}

#[test]
fn validators_accept_well_formed_payloads() {
    assert!(validate_join_room(&obj(json!({"roomId": "r", "userName": "n"}))));
    assert!(validate_cursor_move(&obj(json!({"x": 1, "y": 2}))));
    assert!(validate_stroke_start(&obj(json!({"strokeId": "s", "color": "#000", "width": 2.0}))));
    assert!(validate_stroke_add(&obj(json!({"strokeId": "s", "points": [[0, 0]]}))));
    assert!(validate_stroke_end(&obj(json!({"strokeId": "s"}))));
    assert!(validate_stroke_move(&obj(json!({"strokeId": "s", "dx": 1, "dy": 1}))));
}

#[test]
fn validators_reject_missing_or_mistyped_fields() {
    assert!(!validate_join_room(&obj(json!({"roomId": "r"}))));
    assert!(!validate_join_room(&obj(json!({"roomId": 3, "userName": "n"}))));
    assert!(!validate_cursor_move(&obj(json!({"x": "left", "y": 2}))));
    assert!(!validate_stroke_start(&obj(json!({"strokeId": "s", "color": "#000"}))));
    assert!(!validate_stroke_add(&obj(json!({"strokeId": "s", "points": "nope"}))));
    assert!(!validate_stroke_end(&obj(json!({}))));
    assert!(!validate_stroke_move(&obj(json!({"strokeId": "s", "dx": 1}))));
}

#[test]
fn extract_points_skips_malformed_entries() {
    let data = obj(json!({
        "points": [[0.0, 1.0], [2.5], "junk", [3.0, 4.0, 9.0], {"x": 1}, [5.0, 6.0]],
    }));
    let points = extract_points(&data);
    assert_eq!(points.len(), 3);
    assert_eq!(points[0], Point { x: 0.0, y: 1.0 });
    // Extra elements beyond the pair are ignored, not rejected.
    assert_eq!(points[1], Point { x: 3.0, y: 4.0 });
    assert_eq!(points[2], Point { x: 5.0, y: 6.0 });
}

#[test]
fn welcome_lists_all_users_including_joiner() {
    let (tx, _rx) = mpsc::channel(1);
    let users = vec![
        UserInfo::new("user-a", "Alice", "#FF5733", tx.clone()),
        UserInfo::new("user-b", "Bob", "#33FF57", tx),
    ];
    let raw = welcome("user-b", "#33FF57", &users, 4);

    let msg = parse(&raw).unwrap();
    assert_eq!(msg.kind, MessageType::Welcome);
    assert_eq!(msg.seq, 4);
    assert!(msg.timestamp > 0);

    let data = data_of(&raw);
    assert_eq!(data["userId"], "user-b");
    assert_eq!(data["color"], "#33FF57");
    let listed = data["users"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["name"], "Alice");
    assert_eq!(listed[1]["userId"], "user-b");
}

#[test]
fn stroke_add_round_trips_points() {
    let points = vec![Point { x: 0.125, y: -7.5 }, Point { x: 3.25, y: 4.75 }];
    let raw = stroke_add("stroke-1", "user-a", &points, 11);

    let msg = parse(&raw).unwrap();
    assert_eq!(msg.kind, MessageType::StrokeAdd);
    assert_eq!(msg.seq, 11);

    let restored = extract_points(&msg.data);
    assert_eq!(restored.len(), points.len());
    for (a, b) in restored.iter().zip(&points) {
        assert!((a.x - b.x).abs() < 1e-6);
        assert!((a.y - b.y).abs() < 1e-6);
    }
}

#[test]
fn room_state_carries_strokes_and_snapshot_seq() {
    let mut stroke = Stroke::new("stroke-1", "user-a", "#000000", 2.0);
    stroke.add_point(1.0, 2.0);
    stroke.add_point(3.0, 4.0);
    stroke.finish();

    let raw = room_state(&[stroke], 17);
    let msg = parse(&raw).unwrap();
    assert_eq!(msg.kind, MessageType::RoomState);
    assert_eq!(msg.seq, 17);

    let data = data_of(&raw);
    assert_eq!(data["snapshotSeq"], 17);
    let strokes = data["strokes"].as_array().unwrap();
    assert_eq!(strokes.len(), 1);
    assert_eq!(strokes[0]["strokeId"], "stroke-1");
    assert_eq!(strokes[0]["userId"], "user-a");
    assert_eq!(strokes[0]["complete"], true);
    assert_eq!(strokes[0]["points"].as_array().unwrap().len(), 2);
}

#[test]
fn error_frames_carry_code_and_canned_message() {
    let raw = error(ErrorCode::RoomFull, 0);
    let msg = parse(&raw).unwrap();
    assert_eq!(msg.kind, MessageType::Error);
    assert_eq!(msg.seq, 0);
    assert_eq!(msg.data["code"], "ROOM_FULL");
    assert_eq!(msg.data["message"], "Room has reached maximum capacity (15 users)");

    let raw = error_with_message(ErrorCode::InvalidField, "width out of range", 0);
    let msg = parse(&raw).unwrap();
    assert_eq!(msg.data["code"], "INVALID_FIELD");
    assert_eq!(msg.data["message"], "width out of range");
}

#[test]
fn pong_echoes_seq() {
    let msg = parse(&pong(42)).unwrap();
    assert_eq!(msg.kind, MessageType::Pong);
    assert_eq!(msg.seq, 42);
    assert!(msg.data.is_empty());
}

#[test]
fn broadcast_builders_carry_user_id() {
    let data = data_of(&user_joined("user-a", "Alice", "#FF5733", 2));
    assert_eq!(data["userId"], "user-a");
    assert_eq!(data["name"], "Alice");

    let data = data_of(&user_left("user-a", 3));
    assert_eq!(data["userId"], "user-a");

    let data = data_of(&cursor_move("user-a", 10.0, 20.0, 4));
    assert_eq!(data["userId"], "user-a");
    assert_eq!(data["x"], 10.0);
    assert_eq!(data["y"], 20.0);

    let data = data_of(&stroke_move("stroke-1", "user-a", 5.0, -5.0, 6));
    assert_eq!(data["dx"], 5.0);
    assert_eq!(data["dy"], -5.0);
}
