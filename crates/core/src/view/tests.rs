use std::sync::{Arc, Mutex};
use std::time::Duration;

use ellen_chat_model::{ConversationId, ErrorKind as BackendErrorKind, Turn};
use ellen_chat_test_backend::{
    PresetChunk, PresetResponse, TestBackend, TestHistory, TestIdentity,
};

use super::*;
use crate::assembler::StreamEnd;
use crate::transcript::TranscriptEvent;

type TestView = ChatView<TestIdentity, TestHistory, TestBackend>;

fn build_view(backend: &TestBackend, history: TestHistory) -> TestView {
    ChatViewBuilder::new(
        TestIdentity::signed_in("u-1", "token"),
        history,
        backend.clone(),
    )
    .build()
}

fn greeting() -> Turn {
    Turn::assistant(builder::DEFAULT_GREETING)
}

#[tokio::test]
async fn test_send_message() {
    let mut backend = TestBackend::default();
    backend.add_response(
        PresetResponse::with_tokens(["Hello", ", ", "Ellen!"])
            .with_conversation_id("c-1"),
    );
    let mut view = build_view(&backend, TestHistory::default());

    let outcome = view.send_message("Hi").await.unwrap().unwrap();
    assert_eq!(outcome.tokens, 3);
    assert_eq!(outcome.end, StreamEnd::Exhausted);
    assert_eq!(
        view.transcript().turns(),
        &[greeting(), Turn::user("Hi"), Turn::assistant("Hello, Ellen!")]
    );
    assert_eq!(
        view.transcript().conversation_id(),
        Some(&ConversationId::new("c-1"))
    );
    assert!(!view.transcript().is_streaming());

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Hi");
    assert_eq!(requests[0].conversation_id, None);
}

#[tokio::test]
async fn test_conversation_id_is_echoed() {
    let mut backend = TestBackend::default();
    backend.add_response(
        PresetResponse::with_tokens(["one"]).with_conversation_id("c-1"),
    );
    backend.add_response(
        PresetResponse::with_tokens(["two"]).with_conversation_id("c-2"),
    );
    let mut view = build_view(&backend, TestHistory::default());

    view.send_message("first").await.unwrap();
    view.send_message("second").await.unwrap();

    let requests = backend.requests();
    assert_eq!(
        requests[1].conversation_id,
        Some(ConversationId::new("c-1"))
    );
    assert_eq!(
        view.transcript().conversation_id(),
        Some(&ConversationId::new("c-1"))
    );
    assert_eq!(view.transcript().turns().len(), 5);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let backend = TestBackend::default();
    let mut view = build_view(&backend, TestHistory::default());

    assert_eq!(view.send_message("  \n\t").await.unwrap(), None);
    assert_eq!(view.transcript().turns(), &[greeting()]);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_empty_reply() {
    let mut backend = TestBackend::default();
    backend.add_response(PresetResponse::with_chunks([PresetChunk::End]));
    let mut view = build_view(&backend, TestHistory::default());

    let outcome = view.send_message("Hi").await.unwrap().unwrap();
    assert!(outcome.is_empty());
    assert_eq!(view.transcript().last(), Some(&Turn::assistant("")));
}

#[tokio::test]
async fn test_authentication_missing_keeps_user_turn() {
    let backend = TestBackend::default();
    let mut view = ChatViewBuilder::new(
        TestIdentity::signed_out(),
        TestHistory::default(),
        backend.clone(),
    )
    .without_greeting()
    .build();

    let err = view.send_message("Hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationMissing);
    assert_eq!(view.transcript().turns(), &[Turn::user("Hi")]);
    assert!(backend.requests().is_empty());

    let err = view.current_principal().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationMissing);
}

#[tokio::test]
async fn test_backend_rejection() {
    let mut backend = TestBackend::default();
    backend.add_response(PresetResponse::rejected(
        BackendErrorKind::Unauthorized,
    ));
    let mut view = build_view(&backend, TestHistory::default());

    let err = view.send_message("Hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert_eq!(
        err.backend_error().map(|err| err.kind()),
        Some(BackendErrorKind::Unauthorized)
    );
    assert_eq!(view.transcript().last(), Some(&Turn::user("Hi")));
    assert!(!view.transcript().is_streaming());
}

#[tokio::test]
async fn test_new_conversation() {
    let mut backend = TestBackend::default();
    backend.add_response(
        PresetResponse::with_tokens(["Hey"]).with_conversation_id("c-1"),
    );
    backend.add_response(PresetResponse::with_tokens(["Hey again"]));
    let mut view = build_view(&backend, TestHistory::default());

    view.send_message("Hi").await.unwrap();
    view.new_conversation().unwrap();
    assert_eq!(view.transcript().turns(), &[greeting()]);
    assert_eq!(view.transcript().conversation_id(), None);

    view.send_message("Hi").await.unwrap();
    assert_eq!(backend.requests()[1].conversation_id, None);
}

#[tokio::test]
async fn test_list_conversations() {
    let mut history = TestHistory::default();
    history.add_conversation("c-1", "What is Rust?", vec![]);
    history.add_conversation("c-2", "", vec![]);
    let view = build_view(&TestBackend::default(), history.clone());

    let list = view.list_conversations().await;
    assert!(list.error.is_none());
    let titles = list
        .conversations
        .iter()
        .map(|summary| summary.title())
        .collect::<Vec<_>>();
    assert_eq!(titles, ["What is Rust?", "New Chat"]);

    history.set_failing(true);
    let view = build_view(&TestBackend::default(), history);
    let list = view.list_conversations().await;
    assert!(list.conversations.is_empty());
    assert_eq!(list.error.unwrap().kind(), ErrorKind::HistoryFetch);
}

#[tokio::test]
async fn test_select_conversation() {
    let mut history = TestHistory::default();
    let stored = vec![Turn::user("Hi"), Turn::assistant("Hello!")];
    history.add_conversation("c-1", "Hi", stored.clone());
    let mut backend = TestBackend::default();
    backend.add_response(PresetResponse::with_tokens(["Sure."]));
    let mut view = build_view(&backend, history);

    view.select_conversation(ConversationId::new("c-1"))
        .await
        .unwrap();
    assert_eq!(view.transcript().turns(), stored.as_slice());

    view.send_message("More").await.unwrap();
    assert_eq!(
        backend.requests()[0].conversation_id,
        Some(ConversationId::new("c-1"))
    );
}

#[tokio::test]
async fn test_select_conversation_failure() {
    let mut history = TestHistory::default();
    history.set_failing(true);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut view = ChatViewBuilder::new(
        TestIdentity::signed_in("u-1", "token"),
        history,
        TestBackend::default(),
    )
    .on_event({
        let events = Arc::clone(&events);
        move |_, event| events.lock().unwrap().push(event.clone())
    })
    .build();

    let err = view
        .select_conversation(ConversationId::new("c-9"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HistoryFetch);
    assert!(view.transcript().turns().is_empty());
    assert_eq!(
        view.transcript().conversation_id(),
        Some(&ConversationId::new("c-9"))
    );
    assert_eq!(*events.lock().unwrap(), [TranscriptEvent::Loaded]);
}

#[tokio::test(start_paused = true)]
async fn test_teardown() {
    let mut backend = TestBackend::default();
    backend.set_delay(Duration::from_millis(10));
    backend.add_response(PresetResponse::with_tokens(["one", " two", " three"]));
    let mut view = build_view(&backend, TestHistory::default());
    let teardown = view.teardown_handle();

    let (outcome, _) = tokio::join!(view.send_message("Hi"), async {
        tokio::time::sleep(Duration::from_millis(15)).await;
        teardown.teardown();
    });
    let outcome = outcome.unwrap().unwrap();
    assert_eq!(outcome.end, StreamEnd::Cancelled);
    assert_eq!(view.transcript().last(), Some(&Turn::assistant("one")));

    let err = view.send_message("Again").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ViewClosed);
    let err = view.new_conversation().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ViewClosed);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_history_fetch() {
    let mut history = TestHistory::default();
    history.add_conversation("c-1", "Hi", vec![Turn::user("stored")]);
    history.set_delay(Duration::from_millis(50));
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut view = ChatViewBuilder::new(
        TestIdentity::signed_in("u-1", "token"),
        history,
        TestBackend::default(),
    )
    .on_event({
        let events = Arc::clone(&events);
        move |_, event| events.lock().unwrap().push(event.clone())
    })
    .build();
    let teardown = view.teardown_handle();

    let (result, _) = tokio::join!(
        view.select_conversation(ConversationId::new("c-1")),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            teardown.teardown();
        }
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ViewClosed);
    assert_eq!(view.transcript().turns(), &[greeting()]);
    assert_eq!(view.transcript().conversation_id(), None);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_while_waiting_for_reply() {
    let mut backend = TestBackend::default();
    backend.set_header_delay(Duration::from_millis(50));
    backend.add_response(PresetResponse::with_tokens(["late"]));
    let mut view = build_view(&backend, TestHistory::default());
    let teardown = view.teardown_handle();

    let start = tokio::time::Instant::now();
    let (result, _) = tokio::join!(view.send_message("Hi"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        teardown.teardown();
    });
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ViewClosed);
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(view.transcript().turns(), &[greeting(), Turn::user("Hi")]);
    assert!(!view.transcript().is_streaming());
}
