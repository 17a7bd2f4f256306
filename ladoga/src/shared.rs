//! Shared internals used by both the server and the client

pub(crate) use requests_queue::RequestQueue;
pub(crate) use sse::{SseDecoder, SseEvent};

pub(crate) mod requests_queue;
pub(crate) mod sse;
