//! # Notification Fanout
//!
//! Best-effort delivery to one or many recipients. Every recipient is attempted
//! independently and concurrently; a failure is logged and recorded in the report but never
//! stops the other deliveries or the operation that triggered them.

use futures::future::join_all;
use std::sync::Arc;

use crate::domain::error::BoardError;
use crate::domain::events::Control;
use crate::domain::traits::Transport;

/// Per-recipient outcome of a fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: Vec<String>,
    /// `(recipient, reason)`
    pub failed: Vec<(String, String)>,
}

impl FanoutReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = BoardError> + '_ {
        self.failed
            .iter()
            .map(|(recipient, reason)| BoardError::DeliveryFailed {
                recipient: recipient.clone(),
                reason: reason.clone(),
            })
    }
}

#[derive(Clone)]
pub struct Fanout {
    transport: Arc<dyn Transport>,
}

impl Fanout {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Delivers `text` to every distinct recipient. Never fails as a whole.
    pub async fn notify(&self, recipients: &[String], text: &str, controls: &[Control]) -> FanoutReport {
        let mut targets: Vec<&str> = Vec::with_capacity(recipients.len());
        for r in recipients {
            if !targets.contains(&r.as_str()) {
                targets.push(r);
            }
        }

        let sends = targets.iter().map(|&recipient| async move {
            (recipient, self.transport.send(recipient, text, controls).await)
        });

        let mut report = FanoutReport::default();
        for (recipient, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(recipient.to_string()),
                Err(reason) => {
                    tracing::warn!(
                        "{}",
                        BoardError::DeliveryFailed {
                            recipient: recipient.to_string(),
                            reason: reason.clone(),
                        }
                    );
                    report.failed.push((recipient.to_string(), reason));
                }
            }
        }
        report
    }

    /// Single-recipient convenience. Returns the delivery error, already logged.
    pub async fn notify_one(&self, recipient: &str, text: &str, controls: &[Control]) -> Result<(), BoardError> {
        let report = self
            .notify(&[recipient.to_string()], text, controls)
            .await;
        match report.failures().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
