//! End-to-end scenarios over the streamable HTTP transport

use std::time::Duration;
use futures_util::StreamExt;
use ladoga::{Client, Server, ServerHandle};
use ladoga::server::options::ServerOptions;
use ladoga::types::{
    CallToolRequestParams, CallToolResponse, SchemaProperty, Tool,
};
use ladoga::types::notification::LoggingLevel;
use serde_json::{json, Value};

const SESSION_HEADER: &str = "Mcp-Session-Id";

fn greet_tool() -> Tool {
    Tool::new("greet")
        .with_descr("Greets a user")
        .with_schema(|schema| schema
            .add_property("name", SchemaProperty::string().required()))
}

fn multi_stage_tool() -> Tool {
    Tool::new("multi-stage-greeting")
        .with_schema(|schema| schema
            .add_property("name", SchemaProperty::string().required())
            .add_property("stages", SchemaProperty::number().with_default(3)))
}

fn arg_str(params: &CallToolRequestParams, key: &str) -> String {
    params.arguments()
        .get(key)
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

fn demo_server() -> Server {
    let mut server = Server::new();
    server.map_tool(greet_tool(), |_ctx, params| async move {
        let name = arg_str(&params, "name");
        Ok(CallToolResponse::text(format!("Hello, {name}!")))
    });
    server.map_tool(multi_stage_tool(), |ctx, params| async move {
        let name = arg_str(&params, "name");
        let stages = params.arguments()
            .get("stages")
            .and_then(Value::as_i64)
            .unwrap_or(3);
        for stage in 1..=stages {
            if ctx.cancellation_token().is_cancelled() {
                return Ok(CallToolResponse::text("cancelled"));
            }
            let progress = (stage as f64 / stages as f64 * 100.0).round() / 100.0;
            let _ = ctx.send_progress(progress, format!("Stage {stage} of {stages}")).await;
            let _ = ctx.send_log(
                LoggingLevel::Info,
                json!(format!("greeting stage {stage} done"))).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(CallToolResponse::text(format!("Completed {stages}-stage greeting to {name}!")))
    });
    server
}

async fn start<F>(config: F) -> (ServerHandle, String)
where
    F: FnOnce(ServerOptions) -> ServerOptions,
{
    let server = demo_server()
        .with_options(|opt| config(opt.with_http("127.0.0.1:0")));
    let handle = server.serve_http().await.unwrap();
    let url = format!("http://{}/mcp", handle.addr());
    (handle, url)
}

/// Raw initialize + initialized handshake, returning the session id
async fn handshake(http: &reqwest::Client, url: &str) -> String {
    let resp = http.post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2025-03-26" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let session_id = resp.headers()
        .get(SESSION_HEADER)
        .expect("stateful initialize must return a session id")
        .to_str()
        .unwrap()
        .to_string();

    let resp = http.post(url)
        .header(SESSION_HEADER, &session_id)
        .json(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    session_id
}

#[tokio::test]
async fn it_greets_over_json_post() {
    let (handle, url) = start(|opt| opt.with_post_sse(false)).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    let resp = http.post(&url)
        .header(SESSION_HEADER, &session_id)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "greet", "arguments": { "name": "MCP User" } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 2);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], "Hello, MCP User!");

    handle.shutdown();
}

#[tokio::test]
async fn it_streams_progress_over_post_sse() {
    let (handle, url) = start(|opt| opt).await;

    let mut client = Client::new()
        .with_options(|opt| opt.with_http(&url).with_get_sse(false));
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    client.on_notification("notifications/progress", move |n| {
        let value = n.params
            .as_ref()
            .and_then(|p| p.get("progress"))
            .and_then(Value::as_f64);
        if let Some(value) = value {
            let _ = progress_tx.send(value);
        }
    });
    let (log_tx, mut log_rx) = tokio::sync::mpsc::unbounded_channel();
    client.on_notification("notifications/message", move |n| {
        let _ = log_tx.send(n);
    });
    client.connect().await.unwrap();

    let result = client
        .call_tool(CallToolRequestParams::new("multi-stage-greeting")
            .with_arg("name", "Alice")
            .with_arg("stages", 3))
        .await
        .unwrap();

    let ladoga::types::Content::Text(text) = &result.content[0] else {
        panic!("expected text content");
    };
    assert_eq!(text.text, "Completed 3-stage greeting to Alice!");

    let mut progresses = Vec::new();
    while let Ok(value) = progress_rx.try_recv() {
        progresses.push(value);
    }
    assert_eq!(progresses.len(), 3);
    for (actual, expected) in progresses.iter().zip([0.33, 0.67, 1.0]) {
        assert!((actual - expected).abs() < 1e-9, "progress {actual} != {expected}");
    }
    assert!(progresses.windows(2).all(|w| w[0] <= w[1]), "progress must be non-decreasing");
    assert!(log_rx.try_recv().is_ok(), "log notifications should interleave");

    client.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn it_emits_strictly_increasing_event_ids() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    let resp = http.post(&url)
        .header(SESSION_HEADER, &session_id)
        .header("Accept", "application/json, text/event-stream")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": "multi-stage-greeting", "arguments": { "name": "Bob" } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .starts_with("text/event-stream"));

    let body = resp.text().await.unwrap();
    let ids: Vec<u64> = body.lines()
        .filter_map(|line| line.strip_prefix("id: "))
        .map(|id| id.parse().unwrap())
        .collect();
    assert!(ids.len() >= 4, "expected progress, log and response events: {body}");
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "event ids must strictly increase");

    let final_event = body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .last()
        .unwrap();
    let final_event: Value = serde_json::from_str(final_event).unwrap();
    assert_eq!(final_event["id"], 7);
    assert_eq!(
        final_event["result"]["content"][0]["text"],
        "Completed 3-stage greeting to Bob!");

    handle.shutdown();
}

#[tokio::test]
async fn it_requires_a_session_for_non_initialize_posts() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();

    let resp = http.post(&url)
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    handle.shutdown();
}

#[tokio::test]
async fn it_auto_detects_stateless_mode() {
    let (handle, url) = start(|opt| opt.with_stateless()).await;

    // Raw check: no session id header comes back
    let http = reqwest::Client::new();
    let resp = http.post(&url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2025-03-26" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get(SESSION_HEADER).is_none());

    let mut client = Client::new()
        .with_options(|opt| opt.with_http(&url));
    client.connect().await.unwrap();

    assert!(client.is_stateless());
    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["greet", "multi-stage-greeting"]);

    // GET server push is refused in stateless mode
    let resp = http.get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);

    // DELETE reports sessions disabled
    let resp = http.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), 501);

    client.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn it_filters_tools_by_role_header() {
    let mut server = Server::new();
    for name in ["calculator", "weather", "admin_panel"] {
        server.map_tool(Tool::new(name), |_ctx, _params| async move {
            Ok(CallToolResponse::text("ok"))
        });
    }
    let server = server.with_options(|opt| opt
        .with_http("127.0.0.1:0")
        .with_http_context(|ctx, headers| {
            if let Some(role) = headers.get("X-User-Role").and_then(|v| v.to_str().ok()) {
                ctx.set_value("user_role", role);
            }
        })
        .with_tool_filter(|ctx, tools| {
            match ctx.value("user_role").and_then(Value::as_str) {
                Some("admin") => tools,
                Some("user") => tools
                    .into_iter()
                    .filter(|t| t.name == "calculator" || t.name == "weather")
                    .collect(),
                _ => tools
                    .into_iter()
                    .filter(|t| t.name == "calculator")
                    .collect(),
            }
        }));
    let handle = server.serve_http().await.unwrap();
    let url = format!("http://{}/mcp", handle.addr());

    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    let list = |role: Option<&'static str>| {
        let http = http.clone();
        let url = url.clone();
        let session_id = session_id.clone();
        async move {
            let mut req = http.post(&url)
                .header(SESSION_HEADER, &session_id)
                .json(&json!({ "jsonrpc": "2.0", "id": 5, "method": "tools/list" }));
            if let Some(role) = role {
                req = req.header("X-User-Role", role);
            }
            let body: Value = req.send().await.unwrap().json().await.unwrap();
            body["result"]["tools"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["name"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(list(Some("user")).await, vec!["calculator", "weather"]);
    assert_eq!(list(Some("admin")).await, vec!["calculator", "weather", "admin_panel"]);
    assert_eq!(list(Some("guest")).await, vec!["calculator"]);
    assert_eq!(list(None).await, vec!["calculator"]);

    handle.shutdown();
}

#[tokio::test]
async fn it_terminates_sessions_on_delete() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    assert!(handle.active_sessions()
        .iter()
        .any(|id| id.to_string() == session_id));

    let resp = http.delete(&url)
        .header(SESSION_HEADER, &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert!(!handle.active_sessions()
        .iter()
        .any(|id| id.to_string() == session_id));

    // The terminated session is unrecoverable
    let resp = http.post(&url)
        .header(SESSION_HEADER, &session_id)
        .json(&json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = http.delete(&url)
        .header(SESSION_HEADER, &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.shutdown();
}

#[tokio::test]
async fn it_rejects_malformed_bodies_and_unknown_paths() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();

    let resp = http.post(&url)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);

    let other = url.replace("/mcp", "/other");
    let resp = http.post(&other)
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.shutdown();
}

#[tokio::test]
async fn it_answers_unknown_methods_with_method_not_found() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    let resp = http.post(&url)
        .header(SESSION_HEADER, &session_id)
        .json(&json!({ "jsonrpc": "2.0", "id": 9, "method": "bogus/method" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], 9);
    assert_eq!(body["error"]["code"], -32601);

    handle.shutdown();
}

/// Reads one SSE event (terminated by a blank line) off a byte stream
async fn read_first_event(resp: reqwest::Response) -> String {
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();
    loop {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for an SSE event")
            .expect("stream ended before an event")
            .expect("stream failed");
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        if let Some(pos) = buffer.find("\n\n") {
            return buffer[..pos].to_string();
        }
    }
}

#[tokio::test]
async fn it_acknowledges_resumption_on_last_event_id() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    let resp = http.get(&url)
        .header(SESSION_HEADER, &session_id)
        .header("Accept", "text/event-stream")
        .header("Last-Event-ID", "5")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let event = read_first_event(resp).await;
    assert!(event.contains("notifications/stream/resumed"), "got: {event}");
    assert!(event.contains(r#""resumedFrom":"5""#), "got: {event}");

    handle.shutdown();
}

#[tokio::test]
async fn it_requires_a_session_for_get_streams() {
    let (handle, url) = start(|opt| opt).await;
    let http = reqwest::Client::new();

    let resp = http.get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = http.get(&url)
        .header(SESSION_HEADER, uuid_like())
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.shutdown();
}

fn uuid_like() -> &'static str {
    "00000000-0000-4000-8000-000000000000"
}

#[tokio::test]
async fn it_delivers_unsolicited_notifications_over_get_sse() {
    let (handle, url) = start(|opt| opt).await;

    let mut client = Client::new()
        .with_options(|opt| opt.with_http(&url));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client.on_notification("notifications/tools/list_changed", move |n| {
        let _ = tx.send(n);
    });
    client.connect().await.unwrap();

    // Give the background GET stream a moment to attach
    tokio::time::sleep(Duration::from_millis(300)).await;

    handle.add_tool(Tool::new("late-arrival"), |_ctx, _params| async move {
        Ok(CallToolResponse::text("late"))
    }).await;

    let notification = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for list_changed")
        .expect("channel closed");
    assert_eq!(notification.method, "notifications/tools/list_changed");

    let tools = client.list_tools().await.unwrap();
    assert!(tools.tools.iter().any(|t| t.name == "late-arrival"));

    client.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn it_round_trips_resources_and_prompts() {
    let mut server = Server::new();
    server.map_resource(
        ladoga::types::Resource::new("res://hello", "hello").with_mime("text/plain"),
        |_ctx, params| async move {
            Ok(ladoga::types::ResourceContents::text(&params.uri, "text/plain", "hi there").into())
        });
    server.map_resource_template(
        ladoga::types::ResourceTemplate::new("res://docs/{name}", "doc"),
        |_ctx, params| async move {
            Ok(ladoga::types::ResourceContents::text(&params.uri, "text/plain", "doc body").into())
        });
    server.map_prompt(
        ladoga::types::Prompt::new("analyze-code")
            .with_arg("lang", "Programming language", true),
        |_ctx, params| async move {
            let lang = params.arguments().get("lang").cloned().unwrap_or_default();
            Ok(ladoga::types::PromptMessage::user(format!("Language: {lang}")).into())
        });
    let server = server.with_options(|opt| opt.with_http("127.0.0.1:0"));
    let handle = server.serve_http().await.unwrap();
    let url = format!("http://{}/mcp", handle.addr());

    let mut client = Client::new()
        .with_options(|opt| opt.with_http(&url).with_get_sse(false));
    client.connect().await.unwrap();

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources.resources[0].uri, "res://hello");

    let templates = client.list_resource_templates().await.unwrap();
    assert_eq!(templates.templates[0].uri_template, "res://docs/{name}");

    let read = client.read_resource("res://docs/guide").await.unwrap();
    assert_eq!(read.contents[0].uri(), "res://docs/guide");

    let prompts = client.list_prompts().await.unwrap();
    assert_eq!(prompts.prompts[0].name, "analyze-code");

    let expanded = client
        .get_prompt(ladoga::types::GetPromptRequestParams::new("analyze-code")
            .with_arg("lang", "rust"))
        .await
        .unwrap();
    let ladoga::types::Content::Text(text) = &expanded.messages[0].content else {
        panic!("expected text content");
    };
    assert_eq!(text.text, "Language: rust");

    // tools are registered, prompts are too; completion falls back to empty
    let completion = client
        .complete(serde_json::from_value(json!({
            "ref": { "type": "ref/prompt", "name": "analyze-code" },
            "argument": { "name": "lang", "value": "r" }
        })).unwrap())
        .await
        .unwrap();
    assert!(completion.completion.values.is_empty());

    client.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn it_expires_idle_sessions() {
    let (handle, url) = start(|opt| opt.with_session_expiry(Duration::from_millis(200))).await;
    let http = reqwest::Client::new();
    let session_id = handshake(&http, &url).await;

    // The sweeper runs at most once a second, wait out one full cycle
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let resp = http.post(&url)
        .header(SESSION_HEADER, &session_id)
        .json(&json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/list" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404, "expired sessions are unrecoverable");

    handle.shutdown();
}
