mod common;

use common::{capture, install};
use serde_json::json;
use tracing::info;
use tracing_record_formatter::context::spawn;
use tracing_record_formatter::context_provider::{
    inject_log_context_with_override, log_context_scope, LogContextFutureExt,
};
use tracing_record_formatter::error::ContextError;
use tracing_record_formatter::runtime::spawn_named;
use tracing_record_formatter::{
    inject_log_context, FormatterConfig, JsonFormatter, LogContextProvider, RequestInfo,
    RequestProvider, RuntimeProvider,
};

fn context_formatter() -> JsonFormatter {
    JsonFormatter::new(FormatterConfig::new().with_provider(LogContextProvider::log_context()))
}

#[test]
fn test_custom_context() {
    let out = capture(context_formatter(), || {
        let _context = inject_log_context([("a", 1), ("b", 2)]).unwrap();
        info!("hello world!");
    });

    let record = out.single();
    assert_eq!(record["a"], 1);
    assert_eq!(record["b"], 2);
}

#[test]
fn test_custom_context_nested() {
    let out = capture(context_formatter(), || {
        {
            let _outer = inject_log_context([("a", 1)]).unwrap();
            {
                let _inner = inject_log_context([("b", 2)]).unwrap();
                info!("inner");
            }
            info!("outer");
        }
        info!("outside");
    });

    let records = out.records();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["message"], "inner");
    assert_eq!(records[0]["a"], 1);
    assert_eq!(records[0]["b"], 2);

    assert_eq!(records[1]["message"], "outer");
    assert_eq!(records[1]["a"], 1);
    assert!(records[1].get("b").is_none());

    assert_eq!(records[2]["message"], "outside");
    assert!(records[2].get("a").is_none());
    assert!(records[2].get("b").is_none());
}

#[test]
fn test_custom_context_as_closure_scope() {
    let out = capture(context_formatter(), || {
        log_context_scope([("a", 1)], || info!("inner")).unwrap();
        info!("outer");
    });

    let records = out.records();
    assert_eq!(records[0]["a"], 1);
    assert!(records[1].get("a").is_none());
}

#[test]
fn test_custom_context_override() {
    let _outer = inject_log_context([("a", 1)]).unwrap();
    let err = inject_log_context([("a", 2)]).unwrap_err();
    assert_eq!(err, ContextError::KeyConflict { key: "a".to_string() });
    assert!(err.to_string().contains("\"a\""));
}

#[test]
fn test_custom_context_override_enable() {
    let out = capture(context_formatter(), || {
        let _outer = inject_log_context_with_override([("a", 1)]).unwrap();
        let _inner = inject_log_context_with_override([("a", 2)]).unwrap();
        info!("hello world!");
    });

    assert_eq!(out.single()["a"], 2);
}

#[tokio::test]
async fn test_context_follows_future_and_spawned_tasks() {
    let (out, _guard) = install(context_formatter());

    async {
        info!("in request");
        spawn(async {
            tokio::task::yield_now().await;
            info!("in child task");
        })
        .await
        .unwrap();
    }
    .in_log_context([("request_id", json!("r-1"))])
    .unwrap()
    .await;
    info!("after request");

    let records = out.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["request_id"], "r-1");
    assert_eq!(records[1]["message"], "in child task");
    assert_eq!(records[1]["request_id"], "r-1");
    assert!(records[2].get("request_id").is_none());
}

#[tokio::test]
async fn test_runtime_provider_in_task() {
    let formatter = JsonFormatter::new(FormatterConfig::new().with_provider(RuntimeProvider));
    let (out, _guard) = install(formatter);

    spawn_named("MyTask", async { info!("hello world!") })
        .await
        .unwrap();

    assert_eq!(out.single()["task"], "MyTask");
}

#[tokio::test]
async fn test_request_provider() {
    let formatter = JsonFormatter::new(
        FormatterConfig::new()
            .with_provider(RequestProvider::request())
            .with_provider(LogContextProvider::log_context()),
    );
    let (out, _guard) = install(formatter);

    let request = RequestInfo {
        route: Some("/users/{id}".to_string()),
        url: "http://testserver/users/7".to_string(),
        forwarded_for: Some("203.0.113.9".to_string()),
        ..RequestInfo::new("GET", "/users/7")
    };
    request
        .scope(async {
            // A later provider can override request-derived values.
            let _context = inject_log_context([("resource", "custom")]).unwrap();
            info!("handled");
        })
        .await;
    info!("idle");

    let records = out.records();
    assert_eq!(records[0]["resource"], "custom");
    assert_eq!(records[0]["http.method"], "GET");
    assert_eq!(records[0]["http.url"], "http://testserver/users/7");
    assert_eq!(records[0]["http.remote_addr"], "203.0.113.9");
    assert!(records[1].get("http.method").is_none());
}
