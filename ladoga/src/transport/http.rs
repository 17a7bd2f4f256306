//! Streamable HTTP transport implementation

use axum::http::HeaderMap;
use uuid::Uuid;

pub(crate) mod server;
pub(crate) mod responder;
pub(crate) mod client;

/// The HTTP header carrying session identity
pub(crate) const MCP_SESSION_ID: &str = "Mcp-Session-Id";

/// The HTTP header enabling SSE resumption
pub(crate) const LAST_EVENT_ID: &str = "Last-Event-ID";

#[inline]
pub(crate) fn get_mcp_session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(MCP_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[inline]
pub(crate) fn has_mcp_session_id(headers: &HeaderMap) -> bool {
    headers.contains_key(MCP_SESSION_ID)
}

/// Whether the `Accept` header admits `text/event-stream`
#[inline]
pub(crate) fn accepts_sse(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}
