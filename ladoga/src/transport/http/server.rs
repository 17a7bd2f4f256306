//! HTTP server transport: POST, GET and DELETE on one MCP endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::post;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::error::Error;
use crate::server::ServerCore;
use crate::server::context::Context;
use crate::server::session::Session;
use crate::types::{Message, Request, RequestId, Response};
use crate::types::notification::Notification;
use crate::commands;
use super::responder::{select_mode, JsonResponder, Respond, ResponseMode, SseResponder};
use super::{get_mcp_session_id, has_mcp_session_id, LAST_EVENT_ID, MCP_SESSION_ID};

#[derive(Clone)]
struct HttpState {
    core: Arc<ServerCore>,
}

/// Binds the listener, spawns the accept loop and returns the bound address.
/// The server drains on `token` cancellation.
pub(crate) async fn serve(
    core: Arc<ServerCore>,
    addr: &str,
    token: CancellationToken,
) -> Result<SocketAddr, Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let endpoint = core.options.endpoint.clone();
    let router = Router::new()
        .route(
            &endpoint,
            post(handle_post)
                .get(handle_get)
                .delete(handle_delete))
        .with_state(HttpState { core });

    tokio::spawn(async move {
        let shutdown = {
            let token = token.clone();
            async move { token.cancelled().await }
        };
        if let Err(_err) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(logger = "ladoga", "HTTP server was shutdown: {_err}");
            token.cancel();
        }
    });

    Ok(addr)
}

/// POST: a single JSON-RPC envelope in, a JSON body, an SSE stream or a
/// 202 out, per the responder factory and the message kind.
async fn handle_post(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> AxumResponse {
    let core = &state.core;
    let msg = match Message::from_slice(&body) {
        Ok(msg) => msg,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(Response::error(RequestId::Null, err)),
            ).into_response();
        }
    };

    let session = match resolve_session(core, &headers, &msg) {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    session.touch();

    let mut ctx = Context::new(session.clone())
        .with_token(CancellationToken::new());
    for context_fn in &core.options.context_fns {
        context_fn(&mut ctx, &headers);
    }

    let session_header = session_header_value(core, &session);
    match msg {
        Message::Notification(notification) => {
            core.dispatch_notification(ctx, notification).await;
            let mut response = StatusCode::ACCEPTED.into_response();
            if let Some(session_header) = session_header {
                response.headers_mut().insert(MCP_SESSION_ID, session_header);
            }
            response
        }
        Message::Request(req) => {
            match select_mode(&headers, core.options.enable_post_sse, true) {
                ResponseMode::Sse => {
                    SseResponder { session_header }
                        .respond(core.clone(), ctx, req)
                        .await
                }
                ResponseMode::Json => {
                    JsonResponder { session_header }
                        .respond(core.clone(), ctx, req)
                        .await
                }
            }
        }
        Message::Response(_) => (
            StatusCode::BAD_REQUEST,
            "Clients do not answer server requests",
        ).into_response(),
    }
}

/// GET: the long-lived server-push SSE channel of a session
async fn handle_get(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> AxumResponse {
    let core = &state.core;
    if core.options.stateless || !core.options.enable_get_sse {
        return (StatusCode::METHOD_NOT_ALLOWED, "Server push is not available").into_response();
    }
    if !has_mcp_session_id(&headers) {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    }
    let session = match get_mcp_session_id(&headers).and_then(|id| core.sessions.lookup(&id)) {
        Some(session) => session,
        None => return (StatusCode::NOT_FOUND, "Unknown session").into_response(),
    };

    let (rx, _channel_token) = core.channels.open(session.id());

    // A reconnecting client learns the resumption point; events are not replayed.
    let resumed: Vec<Notification> = headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .map(|last| vec![Notification::stream_resumed(last)])
        .unwrap_or_default();

    let mut event_id = 0u64;
    let stream = tokio_stream::iter(resumed)
        .chain(ReceiverStream::new(rx))
        .map(move |notification| {
            event_id += 1;
            let data = serde_json::to_string(&notification).unwrap_or_default();
            Ok::<_, std::convert::Infallible>(Event::default()
                .id(event_id.to_string())
                .data(data))
        });

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    if let Some(session_header) = session_header_value(core, &session) {
        response.headers_mut().insert(MCP_SESSION_ID, session_header);
    }
    response
}

/// DELETE: session teardown
async fn handle_delete(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> AxumResponse {
    let core = &state.core;
    if core.options.stateless {
        return (StatusCode::NOT_IMPLEMENTED, "Sessions are disabled").into_response();
    }
    if !has_mcp_session_id(&headers) {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    }
    let Some(id) = get_mcp_session_id(&headers) else {
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    };
    if core.sessions.terminate(&id) {
        core.channels.close(&id);
        tracing::debug!(logger = "ladoga", session_id = %id, "Session terminated by client");
        StatusCode::OK.into_response()
    } else {
        (StatusCode::NOT_FOUND, "Unknown session").into_response()
    }
}

/// Resolves the session per the stateful/stateless policy:
/// stateless synthesizes a throwaway; stateful requires the header except
/// on `initialize`, which mints a new session.
fn resolve_session(
    core: &Arc<ServerCore>,
    headers: &HeaderMap,
    msg: &Message,
) -> Result<Arc<Session>, AxumResponse> {
    if core.options.stateless {
        return Ok(core.stateless_session());
    }
    if has_mcp_session_id(headers) {
        return get_mcp_session_id(headers)
            .and_then(|id| core.sessions.lookup(&id))
            .ok_or_else(|| (StatusCode::NOT_FOUND, "Unknown session").into_response());
    }
    let is_initialize = matches!(
        msg,
        Message::Request(Request { method, .. }) if method == commands::INITIALIZE
    );
    if is_initialize {
        Ok(core.sessions.create())
    } else {
        Err((StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response())
    }
}

/// The session id header emitted on 2xx responses in stateful mode
fn session_header_value(core: &Arc<ServerCore>, session: &Arc<Session>) -> Option<HeaderValue> {
    if core.options.stateless {
        return None;
    }
    HeaderValue::from_str(&session.id().to_string()).ok()
}
