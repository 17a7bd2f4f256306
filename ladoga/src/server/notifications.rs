//! Notification plumbing: request-bound senders and the server-push fan-out

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::error::{Error, ErrorCode};
use crate::types::{Message, ProgressToken};
use crate::types::notification::{LogMessage, LoggingLevel, Notification, ProgressNotification};

/// The capability handed to a handler letting it emit progress, log and
/// custom notifications on the channel of the caller it serves.
///
/// The sender is bound to the response writer's lifetime: once the writer is
/// gone, sends fail with a non-fatal transport error the handler may ignore.
/// In JSON response mode a no-op sender is installed and sends are dropped.
#[derive(Clone)]
pub struct NotificationSender {
    tx: Option<mpsc::Sender<Message>>,
    progress_token: Option<ProgressToken>,
}

impl NotificationSender {
    /// Creates the no-op sender installed for JSON-mode responses
    pub(crate) fn null() -> Self {
        Self { tx: None, progress_token: None }
    }

    /// Creates a sender bound to a response stream
    pub(crate) fn bound(
        tx: mpsc::Sender<Message>,
        progress_token: Option<ProgressToken>
    ) -> Self {
        Self { tx: Some(tx), progress_token }
    }

    /// Sends a `notifications/progress` update for the in-flight request
    pub async fn send_progress(
        &self,
        progress: f64,
        message: impl Into<String>
    ) -> Result<(), Error> {
        let progress = ProgressNotification {
            progress_token: self.progress_token.clone(),
            progress,
            total: None,
            message: Some(message.into()),
        };
        self.send(progress.into()).await
    }

    /// Sends a `notifications/message` log event
    pub async fn send_log(&self, level: LoggingLevel, data: Value) -> Result<(), Error> {
        let log = LogMessage::new(level, Some("ladoga".into()), Some(data));
        self.send(log.into()).await
    }

    /// Sends an arbitrary notification method
    pub async fn send_custom(&self, method: &str, params: Option<Value>) -> Result<(), Error> {
        self.send(Notification::new(method, params)).await
    }

    async fn send(&self, notification: Notification) -> Result<(), Error> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };
        tx.send(notification.into())
            .await
            .map_err(|_| Error::new(ErrorCode::Transport, "Response stream closed"))
    }
}

/// One bound GET-SSE channel
struct SseChannelHandle {
    tx: mpsc::Sender<Notification>,
    token: CancellationToken,
}

/// The per-session GET-SSE channels: at most one per session, a newer
/// connection implicitly cancels the previous one.
pub(crate) struct SseChannels {
    channels: DashMap<Uuid, SseChannelHandle>,
}

impl SseChannels {
    pub(crate) fn new() -> Self {
        Self { channels: DashMap::new() }
    }

    /// Opens a channel for `session_id`, replacing and cancelling any previous one
    pub(crate) fn open(
        &self,
        session_id: Uuid
    ) -> (mpsc::Receiver<Notification>, CancellationToken) {
        let (tx, rx) = mpsc::channel(64);
        let token = CancellationToken::new();
        let previous = self.channels.insert(session_id, SseChannelHandle {
            tx,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        (rx, token)
    }

    /// Closes the channel bound to `session_id`, if any
    pub(crate) fn close(&self, session_id: &Uuid) {
        if let Some((_, handle)) = self.channels.remove(session_id) {
            handle.token.cancel();
        }
    }

    /// Delivers a notification to one session's channel.
    /// Returns `false` when the session has no open channel; the
    /// notification is dropped in that case.
    pub(crate) async fn notify(&self, session_id: &Uuid, notification: Notification) -> bool {
        let tx = match self.channels.get(session_id) {
            Some(handle) => handle.tx.clone(),
            None => return false,
        };
        tx.send(notification).await.is_ok()
    }

    /// Fans a notification out to every bound channel
    pub(crate) async fn broadcast(&self, notification: Notification) {
        self.broadcast_filtered(|_| true, notification).await
    }

    /// Fans a notification out to the channels whose session id passes `filter`
    pub(crate) async fn broadcast_filtered<F>(&self, filter: F, notification: Notification)
    where
        F: Fn(&Uuid) -> bool,
    {
        let targets: Vec<mpsc::Sender<Notification>> = self.channels
            .iter()
            .filter(|entry| filter(entry.key()))
            .map(|entry| entry.tx.clone())
            .collect();
        for tx in targets {
            let _ = tx.send(notification.clone()).await;
        }
    }
}
