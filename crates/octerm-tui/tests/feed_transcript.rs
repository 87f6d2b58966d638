//! Raw feed events reconciled into a transcript.

use octerm_core::feed::RawEvent;
use octerm_core::stream::{Reconciler, StreamDelta};
use octerm_tui::transcript::{RenderFilter, Transcript};
use serde_json::{Value, json};

fn message_updated(id: &str, role: &str, completed: bool) -> Value {
    let time = if completed {
        json!({"created": 1, "completed": 2})
    } else {
        json!({"created": 1})
    };
    json!({
        "type": "message.updated",
        "properties": {"info": {"id": id, "sessionID": "s1", "role": role, "time": time}}
    })
}

fn part_updated(message_id: &str, id: &str, part: Value, delta: Option<&str>) -> Value {
    let mut part_json = json!({"id": id, "messageID": message_id, "type": "text"});
    if let (Some(target), Some(extra)) = (part_json.as_object_mut(), part.as_object()) {
        target.extend(extra.clone());
    }
    let mut props = json!({"part": part_json});
    if let Some(delta) = delta {
        props["delta"] = json!(delta);
    }
    json!({"type": "message.part.updated", "properties": props})
}

fn feed(transcript: &mut Transcript, events: &[Value]) -> Vec<StreamDelta> {
    let mut reconciler = Reconciler::new();
    let mut deltas = Vec::new();
    for event in events {
        let Some(delta) = reconciler.process(&RawEvent::new("message", event.to_string())) else {
            continue;
        };
        match &delta {
            StreamDelta::Content(content) => transcript.apply_delta(content),
            StreamDelta::Meta(meta) => transcript.apply_meta(meta),
        }
        deltas.push(delta);
    }
    deltas
}

fn answer_text(transcript: &Transcript, message_id: &str) -> String {
    let message = transcript.message(message_id).unwrap();
    assert_eq!(message.fragments.len(), 1);
    message.fragments[0].text.clone()
}

#[test]
fn test_appended_deltas_build_one_fragment() {
    let mut transcript = Transcript::new();
    feed(
        &mut transcript,
        &[
            message_updated("m1", "assistant", false),
            part_updated("m1", "p1", json!({"text": ""}), Some("Hel")),
            part_updated("m1", "p1", json!({"text": ""}), Some("lo")),
        ],
    );

    assert_eq!(transcript.messages().len(), 1);
    assert_eq!(answer_text(&transcript, "m1"), "Hello");
    assert!(!transcript.messages()[0].pending);
}

#[test]
fn test_growing_snapshots_land_exactly_once() {
    let mut transcript = Transcript::new();
    feed(
        &mut transcript,
        &[
            message_updated("m1", "assistant", false),
            part_updated("m1", "p1", json!({"text": "Hel"}), None),
            part_updated("m1", "p1", json!({"text": "Hello"}), None),
            part_updated("m1", "p1", json!({"text": "Hello"}), None),
            part_updated("m1", "p1", json!({"text": "Hello world"}), None),
        ],
    );

    assert_eq!(answer_text(&transcript, "m1"), "Hello world");
}

#[test]
fn test_divergent_snapshot_overwrites_fragment() {
    let mut transcript = Transcript::new();
    feed(
        &mut transcript,
        &[
            part_updated("m1", "p1", json!({"text": "Hello world"}), None),
            part_updated("m1", "p1", json!({"text": "Goodbye"}), None),
        ],
    );

    assert_eq!(answer_text(&transcript, "m1"), "Goodbye");
}

#[test]
fn test_completion_without_text_keeps_answer() {
    let mut transcript = Transcript::new();
    let deltas = feed(
        &mut transcript,
        &[
            message_updated("m1", "assistant", false),
            part_updated("m1", "p1", json!({"text": ""}), Some("Hello")),
            part_updated("m1", "p1", json!({"time": {"start": 1, "end": 2}}), None),
            message_updated("m1", "assistant", true),
        ],
    );

    assert_eq!(deltas.len(), 4);
    let message = transcript.message("m1").unwrap();
    assert_eq!(message.fragments[0].text, "Hello");
    assert!(message.fragments[0].complete);
    assert!(message.complete);
    assert_eq!(
        transcript.render(RenderFilter::default()).to_plain_text(),
        "Assistant:\nHello\n"
    );
}

#[test]
fn test_user_echo_stays_out_of_transcript() {
    let mut transcript = Transcript::new();
    transcript.add_user_message("hi");
    let deltas = feed(
        &mut transcript,
        &[
            message_updated("u1", "user", false),
            part_updated("u1", "p0", json!({"text": "hi"}), None),
            message_updated("m1", "assistant", false),
            part_updated("m1", "p1", json!({"text": "hey"}), None),
        ],
    );

    assert_eq!(deltas.len(), 2);
    assert_eq!(transcript.messages().len(), 2);
    assert_eq!(answer_text(&transcript, "m1"), "hey");
}
