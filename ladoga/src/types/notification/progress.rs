//! Progress notification

use serde::{Serialize, Deserialize};
use crate::types::notification::Notification;
use crate::types::ProgressToken;

/// An out-of-band notification used to inform the receiver of a progress update
/// for a long-running request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// The progress token which was given in the initial request,
    /// used to associate this notification with the request that is proceeding.
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,

    /// The progress thus far. This should increase every time progress is made,
    /// even if the total is unknown.
    pub progress: f64,

    /// Total number of items to process (or total progress required), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    /// An optional human-readable progress message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ProgressNotification> for Notification {
    #[inline]
    fn from(progress: ProgressNotification) -> Self {
        Self::new(
            super::commands::PROGRESS,
            serde_json::to_value(progress).ok()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_converts_into_notification() {
        let progress = ProgressNotification {
            progress_token: Some("tok".into()),
            progress: 0.5,
            total: Some(1.0),
            message: Some("halfway".into()),
        };

        let notification: Notification = progress.into();

        assert_eq!(notification.method, "notifications/progress");
        let params = notification.params.unwrap();
        assert_eq!(params.get("progress"), Some(&serde_json::json!(0.5)));
        assert_eq!(params.get("message"), Some(&serde_json::json!("halfway")));
    }
}
