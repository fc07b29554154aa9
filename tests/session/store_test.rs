//! Tests for the conversation store.

use claude_chat_bridge::pipeline::{ConversationLog, SessionTotals, UiEvent};
use claude_chat_bridge::session::{ConversationStore, StoredConversation, MAX_INDEX_ENTRIES};
use tempfile::TempDir;

fn conversation(id: &str, user_text: &str) -> StoredConversation {
    let mut log = ConversationLog::new();
    log.record(&UiEvent::UserInput(user_text.to_string()));
    log.record(&UiEvent::Output(format!("reply to {user_text}")));
    // Transient events are not logged.
    log.record(&UiEvent::ProcessingState(false));

    let totals = SessionTotals {
        total_cost: 0.25,
        total_tokens_input: 300,
        total_tokens_output: 45,
        request_count: 1,
        ..SessionTotals::default()
    };
    StoredConversation::from_log(id, Some("sess-1"), &log, &totals)
}

#[test]
fn save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path().join("history"));

    let saved = conversation("conv-1", "hello");
    let summary = store.save(&saved).unwrap();

    assert_eq!(summary.message_count, 2);
    assert_eq!(summary.total_tokens, 345);
    assert_eq!(summary.first_user_message.as_deref(), Some("hello"));
    assert_eq!(summary.last_message.as_deref(), Some("reply to hello"));

    let loaded = store.load("conv-1").unwrap().expect("saved conversation");
    assert_eq!(loaded, saved);
    assert!(store.index_path().exists());
}

#[test]
fn stored_json_uses_camel_case() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    store.save(&conversation("conv-1", "hello")).unwrap();

    let raw = std::fs::read_to_string(dir.path().join("conv-1.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["sessionId"], "sess-1");
    assert_eq!(value["messages"][0]["messageType"], "userInput");
    assert_eq!(value["messages"][1]["data"], "reply to hello");
}

#[test]
fn list_is_newest_first_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());

    store.save(&conversation("first", "one")).unwrap();
    store.save(&conversation("second", "two")).unwrap();
    store.save(&conversation("first", "one again")).unwrap();

    let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[test]
fn index_is_capped() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());

    for i in 0..MAX_INDEX_ENTRIES + 5 {
        store.save(&conversation(&format!("conv-{i}"), "hi")).unwrap();
    }

    let list = store.list().unwrap();
    assert_eq!(list.len(), MAX_INDEX_ENTRIES);
    assert_eq!(list[0].id, format!("conv-{}", MAX_INDEX_ENTRIES + 4));
    assert!(list.iter().all(|s| s.id != "conv-0"));
    // Files outside the index are kept.
    assert!(store.load("conv-0").unwrap().is_some());
}

#[test]
fn unknown_and_invalid_ids_load_as_none() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    store.save(&conversation("conv-1", "hello")).unwrap();

    assert!(store.load("missing").unwrap().is_none());
    assert!(store.load("../conv-1").unwrap().is_none());
    assert!(store.load("").unwrap().is_none());
}

#[test]
fn empty_store_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path().join("never-created"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn summary_text_is_truncated() {
    let long = "é".repeat(150);
    let summary = conversation("conv-1", &long).summary();
    let first = summary.first_user_message.unwrap();
    assert_eq!(first.chars().count(), 103);
    assert!(first.ends_with("..."));
}
