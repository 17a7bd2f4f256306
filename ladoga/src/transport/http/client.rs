//! HTTP client transport implementation

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::commands;
use crate::error::{Error, ErrorCode};
use crate::shared::SseDecoder;
use crate::types::Message;
use super::{LAST_EVENT_ID, MCP_SESSION_ID};

/// Client-side view of the MCP session: id, stateless flag and the last
/// seen event id of the server-push stream.
pub(crate) struct HttpSession {
    id: RwLock<Option<String>>,
    stateless: AtomicBool,
    last_event_id: RwLock<Option<String>>,
    get_spawned: AtomicBool,
}

impl HttpSession {
    fn new() -> Self {
        Self {
            id: RwLock::new(None),
            stateless: AtomicBool::new(false),
            last_event_id: RwLock::new(None),
            get_spawned: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Option<String> {
        self.id
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_id(&self, id: &str) {
        let mut slot = self.id
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(id.into());
    }

    fn clear(&self) {
        let mut slot = self.id
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }

    pub(crate) fn is_stateless(&self) -> bool {
        self.stateless.load(Ordering::Acquire)
    }

    fn set_stateless(&self) {
        self.stateless.store(true, Ordering::Release);
    }

    pub(crate) fn last_event_id(&self) -> Option<String> {
        self.last_event_id
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_last_event_id(&self, id: String) {
        let mut slot = self.last_event_id
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(id);
    }
}

/// HTTP client transport: POST for requests and notifications, an optional
/// background GET SSE reader, DELETE to terminate.
pub(crate) struct HttpClient {
    url: String,
    http: reqwest::Client,
    inbound: mpsc::Sender<Result<Message, Error>>,
    session: Arc<HttpSession>,
    token: CancellationToken,
    sse_enabled: bool,
}

impl HttpClient {
    /// Creates the transport and hands back the inbound message feed
    pub(crate) fn new(
        url: impl Into<String>,
        sse_enabled: bool,
    ) -> (Self, mpsc::Receiver<Result<Message, Error>>) {
        let (inbound, rx) = mpsc::channel(100);
        let client = Self {
            url: url.into(),
            http: reqwest::Client::new(),
            inbound,
            session: Arc::new(HttpSession::new()),
            token: CancellationToken::new(),
            sse_enabled,
        };
        (client, rx)
    }

    /// The session view shared with the background reader
    pub(crate) fn session(&self) -> Arc<HttpSession> {
        self.session.clone()
    }

    /// Sends one outbound message over POST
    pub(crate) async fn send(&self, msg: &Message) -> Result<(), Error> {
        match msg {
            Message::Request(req) => {
                let is_initialize = req.method == commands::INITIALIZE;
                self.send_request(msg, is_initialize).await
            }
            Message::Notification(_) => self.send_notification(msg).await,
            Message::Response(_) => Err(Error::new(
                ErrorCode::State,
                "Clients do not answer server requests")),
        }
    }

    async fn send_request(&self, msg: &Message, is_initialize: bool) -> Result<(), Error> {
        let resp = self.post(msg).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::new(
                ErrorCode::Transport,
                format!("HTTP status {status}")));
        }

        if self.session.id().is_none() {
            let header = resp.headers()
                .get(MCP_SESSION_ID)
                .and_then(|v| v.to_str().ok());
            match header {
                Some(id) => self.session.set_id(id),
                None if is_initialize => {
                    tracing::debug!(logger = "ladoga", "No session id returned, stateless mode");
                    self.session.set_stateless();
                }
                None => (),
            }
        }

        let is_sse = resp.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);
        if is_sse {
            let inbound = self.inbound.clone();
            let token = self.token.clone();
            tokio::spawn(read_post_stream(resp, inbound, token));
        } else {
            let bytes = resp.bytes().await?;
            let msg = Message::from_slice(&bytes);
            if self.inbound.send(msg).await.is_err() {
                return Err(Error::new(ErrorCode::State, "Transport is closed"));
            }
        }

        if is_initialize && self.sse_enabled && !self.session.is_stateless() {
            self.spawn_get_stream();
        }
        Ok(())
    }

    async fn send_notification(&self, msg: &Message) -> Result<(), Error> {
        let resp = self.post(msg).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::new(
                ErrorCode::Transport,
                format!("HTTP status {status}")));
        }
        Ok(())
    }

    fn post(&self, msg: &Message) -> reqwest::RequestBuilder {
        let mut builder = self.http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(msg);
        if !self.session.is_stateless() {
            if let Some(id) = self.session.id() {
                builder = builder.header(MCP_SESSION_ID, id);
            }
        }
        if let Some(last) = self.session.last_event_id() {
            builder = builder.header(LAST_EVENT_ID, last);
        }
        builder
    }

    /// Spawns the background GET SSE reader, at most once
    fn spawn_get_stream(&self) {
        if self.session.get_spawned.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(run_get_stream(
            self.http.clone(),
            self.url.clone(),
            self.session.clone(),
            self.inbound.clone(),
            self.token.clone(),
        ));
    }

    /// DELETE the session, clear local state and stop the GET reader
    pub(crate) async fn terminate(&self) -> Result<(), Error> {
        if let Some(id) = self.session.id() {
            let resp = self.http
                .delete(&self.url)
                .header(MCP_SESSION_ID, id)
                .send()
                .await?;
            if !resp.status().is_success() {
                tracing::debug!(
                    logger = "ladoga",
                    "DELETE returned HTTP status {}", resp.status());
            }
        }
        self.session.clear();
        self.token.cancel();
        Ok(())
    }

    /// Stops background readers without touching the server
    pub(crate) fn close(&self) {
        self.token.cancel();
    }
}

/// Reads the SSE body of one POST response: every event payload is a full
/// envelope routed by shape at the client router (response by id match,
/// notification by method).
async fn read_post_stream(
    resp: reqwest::Response,
    inbound: mpsc::Sender<Result<Message, Error>>,
    token: CancellationToken,
) {
    let mut stream = resp.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for event in decoder.feed(&bytes) {
                        match Message::from_json(&event.data) {
                            Ok(msg) => {
                                if inbound.send(Ok(msg)).await.is_err() {
                                    return;
                                }
                            }
                            Err(_err) => tracing::debug!(
                                logger = "ladoga",
                                "Skipping malformed SSE payload: {_err}"),
                        }
                    }
                }
                Some(Err(err)) => {
                    let _ = inbound.send(Err(err.into())).await;
                    break;
                }
                None => break,
            }
        }
    }
}

/// The background GET SSE reader: dispatches notifications only, tracks the
/// last seen event id, and surfaces the closure instead of reconnecting.
async fn run_get_stream(
    http: reqwest::Client,
    url: String,
    session: Arc<HttpSession>,
    inbound: mpsc::Sender<Result<Message, Error>>,
    token: CancellationToken,
) {
    let mut builder = http
        .get(&url)
        .header(ACCEPT, "text/event-stream");
    if let Some(id) = session.id() {
        builder = builder.header(MCP_SESSION_ID, id);
    }
    if let Some(last) = session.last_event_id() {
        builder = builder.header(LAST_EVENT_ID, last);
    }

    let resp = match builder.send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            tracing::warn!(
                logger = "ladoga",
                "Server push refused with HTTP status {}", resp.status());
            return;
        }
        Err(_err) => {
            tracing::warn!(logger = "ladoga", "Failed to open server push stream: {_err}");
            return;
        }
    };

    let mut stream = resp.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for event in decoder.feed(&bytes) {
                        if let Some(id) = event.id {
                            session.set_last_event_id(id);
                        }
                        match Message::from_json(&event.data) {
                            // Responses on this channel are protocol-illegal
                            Ok(Message::Notification(notification)) => {
                                let _ = inbound.send(Ok(notification.into())).await;
                            }
                            Ok(_) => tracing::trace!(
                                logger = "ladoga",
                                "Ignoring non-notification on the server push stream"),
                            Err(_err) => tracing::debug!(
                                logger = "ladoga",
                                "Skipping malformed SSE payload: {_err}"),
                        }
                    }
                }
                Some(Err(_err)) => {
                    tracing::warn!(logger = "ladoga", "Server push stream failed: {_err}");
                    return;
                }
                None => {
                    tracing::warn!(logger = "ladoga", "Server push stream closed");
                    return;
                }
            }
        }
    }
}
