use serde_json::Value;
use tokio::sync::mpsc;

use super::*;
use crate::room::{ConnectionTx, UserInfo};

fn conn() -> (ConnectionTx, mpsc::Receiver<String>) {
    mpsc::channel(2048)
}

fn room_with_two_users() -> (Room, mpsc::Receiver<String>, mpsc::Receiver<String>) {
    let room = Room::new("room-1", "");
    let (tx_a, rx_a) = conn();
    let (tx_b, rx_b) = conn();
    room.add_participant("user-a", UserInfo::new("user-a", "Alice", "#FF5733", tx_a));
    room.add_participant("user-b", UserInfo::new("user-b", "Bob", "#33FF57", tx_b));
    (room, rx_a, rx_b)
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(&frame).expect("frame should be valid json"));
    }
    out
}

#[test]
fn stroke_lifecycle_broadcasts_to_peers_only() {
    let (room, mut rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();
    board
        .handle_stroke_add(
            &room,
            "user-a",
            "s1",
            &[Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 1.0 }],
        )
        .unwrap();
    board.handle_stroke_end(&room, "user-a", "s1").unwrap();

    // The author hears nothing back.
    assert!(drain(&mut rx_a).is_empty());

    // The peer sees all three events in order with strictly increasing seq.
    let frames = drain(&mut rx_b);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["type"], "stroke_start");
    assert_eq!(frames[1]["type"], "stroke_add");
    assert_eq!(frames[2]["type"], "stroke_end");
    let seqs: Vec<u64> = frames.iter().map(|f| f["seq"].as_u64().unwrap()).collect();
    assert!(seqs[0] < seqs[1] && seqs[1] < seqs[2], "seqs not increasing: {seqs:?}");
    assert_eq!(frames[1]["data"]["points"].as_array().unwrap().len(), 2);

    // Room state: one complete stroke with two points.
    let stroke = room.stroke("s1").unwrap();
    assert!(stroke.complete);
    assert_eq!(stroke.point_count(), 2);
    assert_eq!(stroke.author_id, "user-a");
}

#[test]
fn stroke_registration_and_broadcast_draw_separate_seqs() {
    let (room, _rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();

    let stroke_seq = room.stroke("s1").unwrap().seq;
    let frames = drain(&mut rx_b);
    let broadcast_seq = frames[0]["seq"].as_u64().unwrap();
    assert!(broadcast_seq > stroke_seq);
}

#[test]
fn add_to_completed_stroke_is_invalid() {
    let (room, _rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();
    board.handle_stroke_end(&room, "user-a", "s1").unwrap();
    drain(&mut rx_b);

    let err = board
        .handle_stroke_add(&room, "user-a", "s1", &[Point { x: 0.0, y: 0.0 }])
        .unwrap_err();
    assert_eq!(err, ErrorCode::InvalidStroke);
    assert!(drain(&mut rx_b).is_empty());
    assert_eq!(room.stroke("s1").unwrap().point_count(), 0);
}

#[test]
fn non_author_cannot_mutate() {
    let (room, _rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();
    drain(&mut rx_b);

    assert_eq!(
        board.handle_stroke_add(&room, "user-b", "s1", &[Point { x: 1.0, y: 1.0 }]),
        Err(ErrorCode::InvalidStroke)
    );
    assert_eq!(board.handle_stroke_end(&room, "user-b", "s1"), Err(ErrorCode::InvalidStroke));
    assert_eq!(
        board.handle_stroke_move(&room, "user-b", "s1", 1.0, 1.0),
        Err(ErrorCode::InvalidStroke)
    );
    assert!(drain(&mut rx_b).is_empty());
    assert!(!room.stroke("s1").unwrap().complete);
}

#[test]
fn unknown_stroke_is_invalid() {
    let (room, _rx_a, _rx_b) = room_with_two_users();
    let board = BoardService::new();

    assert_eq!(
        board.handle_stroke_add(&room, "user-a", "nope", &[]),
        Err(ErrorCode::InvalidStroke)
    );
    assert_eq!(board.handle_stroke_end(&room, "user-a", "nope"), Err(ErrorCode::InvalidStroke));
    assert_eq!(
        board.handle_stroke_move(&room, "user-a", "nope", 1.0, 1.0),
        Err(ErrorCode::InvalidStroke)
    );
}

#[test]
fn point_cap_rejects_oversize_batches_unchanged() {
    let (room, _rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();
    let first = vec![Point { x: 0.0, y: 0.0 }; 9_000];
    board
        .handle_stroke_add(&room, "user-a", "s1", &first)
        .unwrap();
    drain(&mut rx_b);

    // 9000 + 1001 > 10000: rejected and nothing appended.
    let second = vec![Point { x: 1.0, y: 1.0 }; 1_001];
    assert_eq!(
        board.handle_stroke_add(&room, "user-a", "s1", &second),
        Err(ErrorCode::StrokeTooLarge)
    );
    assert_eq!(room.stroke("s1").unwrap().point_count(), 9_000);
    assert!(drain(&mut rx_b).is_empty());

    // An exact fill is still allowed.
    let exact = vec![Point { x: 1.0, y: 1.0 }; 1_000];
    board
        .handle_stroke_add(&room, "user-a", "s1", &exact)
        .unwrap();
    assert_eq!(room.stroke("s1").unwrap().point_count(), 10_000);
}

#[test]
fn move_requires_completion_then_translates() {
    let (room, _rx_a, mut rx_b) = room_with_two_users();
    let board = BoardService::new();

    board
        .handle_stroke_start(&room, "user-a", "s1", "#000", 2.0)
        .unwrap();
    board
        .handle_stroke_add(&room, "user-a", "s1", &[Point { x: 1.0, y: 2.0 }])
        .unwrap();

    assert_eq!(
        board.handle_stroke_move(&room, "user-a", "s1", 5.0, 5.0),
        Err(ErrorCode::InvalidStroke)
    );

    board.handle_stroke_end(&room, "user-a", "s1").unwrap();
    drain(&mut rx_b);

    board
        .handle_stroke_move(&room, "user-a", "s1", 5.0, -1.0)
        .unwrap();
    let stroke = room.stroke("s1").unwrap();
    assert_eq!(stroke.points[0], Point { x: 6.0, y: 1.0 });

    let frames = drain(&mut rx_b);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "stroke_move");
    assert_eq!(frames[0]["data"]["dx"], 5.0);
}

#[test]
fn snapshot_caps_strokes_and_reads_seq_without_advancing() {
    let (room, _rx_a, _rx_b) = room_with_two_users();
    let board = BoardService::new();

    for i in 0..600 {
        board
            .handle_stroke_start(&room, "user-a", &format!("s{i}"), "#000", 1.0)
            .unwrap();
    }

    let seq_before = room.current_sequence();
    let raw = board.snapshot(&room);
    assert_eq!(room.current_sequence(), seq_before);

    let frame: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(frame["type"], "room_state");
    assert_eq!(frame["data"]["snapshotSeq"].as_u64(), Some(seq_before));
    let strokes = frame["data"]["strokes"].as_array().unwrap();
    assert_eq!(strokes.len(), 500);
    // The snapshot holds the most recent strokes.
    assert_eq!(strokes[0]["strokeId"], "s100");
    assert_eq!(strokes[499]["strokeId"], "s599");
}
