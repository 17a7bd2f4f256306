//! Utilities for tracking requests awaiting responses

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{oneshot, Mutex};
use crate::types::{RequestId, Response};

/// Represents a pending request handle
pub(crate) struct RequestHandle {
    sender: oneshot::Sender<Response>,
}

/// Represents a request tracking "queue" that holds a map of [`oneshot::Sender`]
/// for requests that are awaiting responses.
///
/// The lock is held only for insert/remove.
#[derive(Default, Clone)]
pub(crate) struct RequestQueue {
    pending: Arc<Mutex<HashMap<RequestId, RequestHandle>>>
}

impl RequestHandle {
    fn new(sender: oneshot::Sender<Response>) -> Self {
        Self { sender }
    }

    /// Completes the pending request with `resp`
    pub(crate) fn send(self, resp: Response) {
        if self.sender.send(resp).is_err() {
            tracing::debug!(logger = "ladoga", "Pending request receiver dropped before completion");
        }
    }
}

impl RequestQueue {
    /// Pushes a request with [`RequestId`] to the "queue"
    /// and returns a [`oneshot::Receiver`] for the response.
    #[inline]
    pub(crate) async fn push(&self, id: &RequestId) -> oneshot::Receiver<Response> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        pending.insert(id.clone(), RequestHandle::new(sender));

        receiver
    }

    /// Pops the [`RequestHandle`] by [`RequestId`] and removes it from the queue
    #[inline]
    pub(crate) async fn pop(&self, id: &RequestId) -> Option<RequestHandle> {
        let mut pending = self.pending.lock().await;
        pending.remove(id)
    }

    /// Takes a [`Response`] and completes the request if it's still pending.
    /// Late responses whose slot was already invalidated are dropped.
    #[inline]
    pub(crate) async fn complete(&self, resp: Response) {
        if let Some(handle) = self.pop(&resp.id).await {
            handle.send(resp)
        }
    }

    /// Fails every outstanding request by dropping its sender,
    /// which surfaces as a closed-channel error at the awaiting side.
    pub(crate) async fn fail_all(&self) {
        let mut pending = self.pending.lock().await;
        pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};
    use serde_json::json;

    #[tokio::test]
    async fn it_pushes_and_pops_request() {
        let queue = RequestQueue::default();
        let id = RequestId::Number(1);

        let receiver = queue.push(&id).await;
        let handle = queue.pop(&id).await;

        assert!(handle.is_some(), "Expected handle to exist");
        assert!(queue.pop(&id).await.is_none(), "Handle should be removed after pop");

        drop(receiver);
    }

    #[tokio::test]
    async fn it_sends_and_receives() {
        let queue = RequestQueue::default();
        let id = RequestId::Number(1);

        let receiver = queue.push(&id).await;
        let handle = queue.pop(&id).await.expect("Should have handle");

        let expected = Response::success(id, json!({ "content": "done" }));
        handle.send(expected.clone());

        let actual = timeout(Duration::from_secs(1), receiver)
            .await
            .expect("Receiver should complete")
            .expect("Sender should send");

        assert_eq!(actual.result, expected.result);
        assert_eq!(actual.id, expected.id);
    }

    #[tokio::test]
    async fn it_drops_late_responses() {
        let queue = RequestQueue::default();
        let id = RequestId::Number(1);

        let receiver = queue.push(&id).await;
        queue.pop(&id).await.expect("Should have handle");

        // The slot is gone, completing is a no-op
        queue.complete(Response::empty(id)).await;

        drop(receiver);
    }

    #[tokio::test]
    async fn it_fails_all_outstanding_requests() {
        let queue = RequestQueue::default();

        let receiver = queue.push(&RequestId::Number(1)).await;
        queue.fail_all().await;

        assert!(receiver.await.is_err(), "Receiver should observe closed channel");
    }
}
