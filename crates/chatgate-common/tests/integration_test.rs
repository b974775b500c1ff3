//! Integration tests for chatgate-common crate.

use chatgate_common::{ceil_seconds, InboundEvent, Jid, MessageId};

#[test]
fn test_event_roundtrips_through_json() {
    let chat = Jid::parse("120363@g.us").unwrap();
    let sender = Jid::parse("111@s").unwrap();
    let event = InboundEvent::new("abc", chat, sender.clone(), "!quiz").quoting("m9", Some(sender));

    let json = serde_json::to_string(&event).unwrap();
    let back: InboundEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
    assert_eq!(back.quoted_message_id(), Some(&MessageId::from("m9")));
}

#[test]
fn test_event_rejects_invalid_sender() {
    let json = r#"{
        "id": "x", "chat_id": "1@s", "sender_id": "broken", "is_group_chat": false,
        "text": "hi", "quoted": null, "received_at": "2024-01-01T00:00:00Z"
    }"#;
    assert!(serde_json::from_str::<InboundEvent>(json).is_err());
}

#[test]
fn test_wait_rounding() {
    assert_eq!(ceil_seconds(2_500), 3);
}
