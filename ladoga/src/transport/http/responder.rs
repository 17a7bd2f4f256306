//! Per-POST responder selection: JSON body or SSE stream
//!
//! Pure selection logic plus the two writers sharing one behavioural
//! contract. SSE is chosen iff POST-SSE is enabled, the body is a request
//! and the client's `Accept` admits `text/event-stream`; otherwise JSON.

use std::sync::Arc;
use axum::Json;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response as AxumResponse};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use crate::server::ServerCore;
use crate::server::context::Context;
use crate::server::notifications::NotificationSender;
use crate::transport::http::{accepts_sse, MCP_SESSION_ID};
use crate::types::{Message, Request};

/// The response mode selected for one POST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseMode {
    /// Plain JSON body; request-bound notifications are dropped
    Json,
    /// SSE stream interleaving notifications with the final response event
    Sse,
}

/// Selects the response mode for one POST
pub(crate) fn select_mode(
    headers: &HeaderMap,
    enable_post_sse: bool,
    is_request: bool,
) -> ResponseMode {
    if enable_post_sse && is_request && accepts_sse(headers) {
        ResponseMode::Sse
    } else {
        ResponseMode::Json
    }
}

/// The minimal surface both writers share
pub(crate) trait Respond {
    /// Dispatches `req` and writes its response in this writer's format
    fn respond(
        self,
        core: Arc<ServerCore>,
        ctx: Context,
        req: Request,
    ) -> impl Future<Output = AxumResponse> + Send;
}

/// Writes the response as one JSON body. A no-op notification sender is
/// installed, so request-bound notifications are dropped.
pub(crate) struct JsonResponder {
    pub(crate) session_header: Option<HeaderValue>,
}

/// Streams SSE events: zero or more notifications, then the final response
/// event, each with a strictly increasing per-connection event id.
pub(crate) struct SseResponder {
    pub(crate) session_header: Option<HeaderValue>,
}

/// Cancels the request when the response writer is dropped,
/// which is how a closed HTTP connection reaches the handler.
struct DisconnectGuard(CancellationToken);

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl Respond for JsonResponder {
    async fn respond(
        self,
        core: Arc<ServerCore>,
        ctx: Context,
        req: Request,
    ) -> AxumResponse {
        let ctx = ctx.with_sender(NotificationSender::null());
        let resp = core.dispatch_request(ctx, req).await;

        let mut response = Json(resp).into_response();
        if let Some(session_header) = self.session_header {
            response.headers_mut().insert(MCP_SESSION_ID, session_header);
        }
        response
    }
}

impl Respond for SseResponder {
    async fn respond(
        self,
        core: Arc<ServerCore>,
        ctx: Context,
        req: Request,
    ) -> AxumResponse {
        let (tx, rx) = mpsc::channel::<Message>(16);
        let token = ctx.cancellation_token();
        let sender = NotificationSender::bound(tx.clone(), req.progress_token());
        let ctx = ctx.with_sender(sender);

        tokio::spawn(async move {
            let resp = core.dispatch_request(ctx, req).await;
            if tx.send(resp.into()).await.is_err() {
                tracing::debug!(logger = "ladoga", "POST stream closed before the final event");
            }
        });

        let guard = DisconnectGuard(token);
        let mut event_id = 0u64;
        let stream = ReceiverStream::new(rx).map(move |msg| {
            let _bound_to_connection = &guard;
            event_id += 1;
            let data = serde_json::to_string(&msg).unwrap_or_default();
            Ok::<_, std::convert::Infallible>(Event::default()
                .id(event_id.to_string())
                .data(data))
        });

        let mut response = Sse::new(stream).into_response();
        if let Some(session_header) = self.session_header {
            response.headers_mut().insert(MCP_SESSION_ID, session_header);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::ACCEPT;

    fn sse_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, "application/json, text/event-stream".parse().unwrap());
        headers
    }

    #[test]
    fn it_selects_sse_only_when_all_conditions_hold() {
        assert_eq!(select_mode(&sse_headers(), true, true), ResponseMode::Sse);
    }

    #[test]
    fn it_falls_back_to_json() {
        let headers = sse_headers();

        assert_eq!(select_mode(&headers, false, true), ResponseMode::Json, "POST-SSE disabled");
        assert_eq!(select_mode(&headers, true, false), ResponseMode::Json, "body is a notification");
        assert_eq!(select_mode(&HeaderMap::new(), true, true), ResponseMode::Json, "no Accept header");
    }
}
