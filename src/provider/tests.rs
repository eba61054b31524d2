use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::*;
use crate::constants::FUNCTION_TOO_BIG_MSG;
use crate::error::QueryError;
use crate::testing::{FakeFactory, FakeHost, FakeModel};

fn client_for(host: &Arc<FakeHost>, model: Arc<FakeModel>) -> ModelClient {
    ModelClient::new(model, host.clone())
}

#[test]
fn test_query_sync_returns_completion() {
    let host = FakeHost::new();
    let (model, log) = FakeModel::replying("gpt-4o", "a checksum routine");
    let client = client_for(&host, model);

    assert_eq!(
        client.query_sync(&Query::new("explain")).as_deref(),
        Some("a checksum routine")
    );
    assert_eq!(host.messages(), vec!["Request to gpt-4o sent..."]);
    assert_eq!(log.calls()[0].model, "gpt-4o");
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_context_length_reports_function_too_big() {
    let host = FakeHost::new();
    let (model, _) = FakeModel::new(
        "gpt-3.5-turbo-0125",
        |_, _| {
            Err(classify_error(
                400,
                r#"{"error":{"message":"This model's maximum context length is 16385 tokens. However, your messages resulted in 20000 tokens.","type":"invalid_request_error","code":"context_length_exceeded"}}"#,
            ))
        },
    );
    let client = client_for(&host, model);

    assert!(client.query_sync(&Query::new("huge")).is_none());
    assert!(host.has_message(FUNCTION_TOO_BIG_MSG));
}

#[test]
fn test_provider_error_reports_generic_message() {
    let host = FakeHost::new();
    let (model, _) = FakeModel::new(
        "gpt-4o",
        |_, _| {
            Err(QueryError::Provider {
                status: 503,
                message: "overloaded".into(),
            })
        },
    );
    let client = client_for(&host, model);

    assert!(client.query_sync(&Query::new("hi")).is_none());
    assert!(host.has_message("gpt-4o could not complete the request: HTTP 503: overloaded"));
    assert!(!host.has_message(FUNCTION_TOO_BIG_MSG));
}

#[test]
fn test_panicking_model_is_reported() {
    let host = FakeHost::new();
    let (model, _) = FakeModel::new("gpt-4o", |_, _| panic!("socket exploded"));
    let client = client_for(&host, model);

    assert!(client.query_sync(&Query::new("hi")).is_none());
    assert!(host.has_message(
        "General exception encountered while running the query: socket exploded"
    ));
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_async_callback_runs_once_on_ui_queue() {
    let host = FakeHost::new();
    let (model, log) = FakeModel::replying("gpt-4o", "done");
    let client = client_for(&host, model);
    let received = Arc::new(Mutex::new(Vec::new()));
    let ui_thread = thread::current().id();

    let sink = Arc::clone(&received);
    let handle = client
        .query_async(Query::new("hi"), move |text| {
            sink.lock().unwrap().push((text, thread::current().id()));
        })
        .unwrap();
    handle.join().unwrap();

    // Nothing is delivered until the UI queue is pumped.
    assert!(received.lock().unwrap().is_empty());
    assert_eq!(client.pending(), 0);
    assert_eq!(host.run_ui_tasks(), 1);
    assert_eq!(host.run_ui_tasks(), 0);

    let received = received.lock().unwrap();
    assert_eq!(received.as_slice(), &[("done".to_string(), ui_thread)]);
    assert_ne!(log.calls()[0].thread, ui_thread);
}

#[test]
fn test_async_failure_queues_nothing() {
    let host = FakeHost::new();
    let (model, _) = FakeModel::new(
        "gpt-4o",
        |_, _| Err(QueryError::BadRequest("bad".into())),
    );
    let client = client_for(&host, model);
    let called = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&called);
    client
        .query_async(Query::new("hi"), move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(host.run_ui_tasks(), 0);
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(host.has_message("General exception encountered while running the query: bad"));
}

#[test]
fn test_pending_counts_tracked_work() {
    let host = FakeHost::new();
    let (model, _) = FakeModel::replying("gpt-4o", "ok");
    let client = client_for(&host, model);

    let guard = client.track();
    assert_eq!(client.pending(), 1);
    let inner = client.track();
    assert_eq!(client.pending(), 2);
    drop(inner);
    drop(guard);
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_select_changes_next_query_model() {
    let host = FakeHost::new();
    let factory = FakeFactory::replying("ok");
    let active = ActiveModel::new(
        factory.clone(),
        host.clone(),
        &ModelDescriptor::new("gpt-4-turbo"),
    )
    .unwrap();

    active.client().query_sync(&Query::new("first"));
    active.select(&ModelDescriptor::new("gpt-4o")).unwrap();
    active.client().query_sync(&Query::new("second"));

    let models: Vec<_> = factory.log.calls().into_iter().map(|c| c.model).collect();
    assert_eq!(models, vec!["gpt-4-turbo", "gpt-4o"]);
    assert_eq!(active.descriptor().name(), "gpt-4o");
    assert!(host.has_message("Request to gpt-4o sent..."));
}

#[test]
fn test_failed_select_keeps_previous_model() {
    let host = FakeHost::new();
    let factory = FakeFactory::replying("ok");
    factory.reject("broken");
    let active = ActiveModel::new(factory.clone(), host.clone(), &ModelDescriptor::new("gpt-4o"))
        .unwrap();

    assert!(matches!(
        active.select(&ModelDescriptor::new("broken")),
        Err(crate::error::ConfigError::MissingApiKey)
    ));
    assert_eq!(active.descriptor().name(), "gpt-4o");
}

#[test]
fn test_in_flight_survives_model_switch() {
    let host = FakeHost::new();
    let factory = FakeFactory::replying("ok");
    let active = ActiveModel::new(factory, host.clone(), &ModelDescriptor::new("gpt-4o")).unwrap();

    let guard = active.track();
    active.select(&ModelDescriptor::new("gpt-4-turbo")).unwrap();
    assert_eq!(active.pending(), 1);
    assert_eq!(active.client().pending(), 1);
    drop(guard);
    assert_eq!(active.pending(), 0);
}
