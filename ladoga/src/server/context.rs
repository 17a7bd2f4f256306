//! Per-request context handed to handlers

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::error::Error;
use crate::server::notifications::NotificationSender;
use crate::server::session::Session;
use crate::types::notification::LoggingLevel;

/// Represents an MCP request context.
///
/// Carries the resolved session, the notification sender bound to the
/// response writer of this invocation, a cancellation token every await in
/// a handler should respect, and the values produced by the transport's
/// context-function chain.
#[derive(Clone)]
pub struct Context {
    session: Arc<Session>,
    notifications: NotificationSender,
    token: CancellationToken,
    values: HashMap<String, Value>,
}

impl Context {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            notifications: NotificationSender::null(),
            token: CancellationToken::new(),
            values: HashMap::new(),
        }
    }

    /// Installs the notification sender bound to this request's responder
    pub(crate) fn with_sender(mut self, sender: NotificationSender) -> Self {
        self.notifications = sender;
        self
    }

    /// Installs the cancellation token of this request
    pub(crate) fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The session this request belongs to
    #[inline]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The id of the session this request belongs to
    #[inline]
    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// The notification sender bound to this invocation
    #[inline]
    pub fn notifications(&self) -> &NotificationSender {
        &self.notifications
    }

    /// Sends a progress notification on the caller's channel
    pub async fn send_progress(
        &self,
        progress: f64,
        message: impl Into<String>
    ) -> Result<(), Error> {
        self.notifications.send_progress(progress, message).await
    }

    /// Sends a log message notification on the caller's channel
    pub async fn send_log(&self, level: LoggingLevel, data: Value) -> Result<(), Error> {
        self.notifications.send_log(level, data).await
    }

    /// Sends a custom notification on the caller's channel
    pub async fn send_custom(&self, method: &str, params: Option<Value>) -> Result<(), Error> {
        self.notifications.send_custom(method, params).await
    }

    /// The cancellation token of this request. Streaming handlers
    /// should check it between chunks.
    #[inline]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Completes when the request has been cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Reads a value produced by the transport's context-function chain
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores a request-scoped value; transport hooks use this to enrich
    /// the context before dispatch
    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Reads a value from the session's key/value bag
    pub fn session_value(&self, key: &str) -> Option<Value> {
        self.session.value(key)
    }

    /// Stores a value in the session's key/value bag
    pub fn set_session_value(&self, key: &str, value: Value) {
        self.session.set_value(key, value);
    }
}
