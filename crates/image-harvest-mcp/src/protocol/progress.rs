//! Progress notifications for a running tool call.

use std::path::Path;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use image_harvest::ProgressSink;

use crate::types::{JsonRpcNotification, ProgressParams, ProgressToken, PROGRESS_NOTIFICATION};

/// Turns saved-image events into `notifications/progress` frames.
pub struct ProgressReporter {
    token: ProgressToken,
    outbound: UnboundedSender<Value>,
}

impl ProgressReporter {
    pub fn new(token: ProgressToken, outbound: UnboundedSender<Value>) -> Self {
        Self { token, outbound }
    }

    fn notification(&self, saved: usize, target: usize) -> serde_json::Result<Value> {
        let params = ProgressParams {
            progress_token: self.token.clone(),
            progress: saved as f64,
            total: Some(target as f64),
        };
        let notification =
            JsonRpcNotification::new(PROGRESS_NOTIFICATION.to_string(), Some(serde_json::to_value(params)?));
        serde_json::to_value(notification)
    }
}

impl ProgressSink for ProgressReporter {
    fn image_saved(&self, saved: usize, target: usize, _path: &Path) {
        match self.notification(saved, target) {
            Ok(frame) => {
                if self.outbound.send(frame).is_err() {
                    tracing::debug!("Progress dropped, client connection closed");
                }
            }
            Err(e) => tracing::warn!("Could not encode progress notification: {e}"),
        }
    }
}
