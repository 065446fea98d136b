use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{RegistryError, TransportError};
use crate::metrics::BROADCAST_MESSAGES;
use crate::models::ChatId;
use crate::registry::SubscriberRegistry;
use crate::telegram::Transport;

// What to do when one recipient cannot be reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BroadcastPolicy {
    // Stop at the first failed send and surface its error
    #[default]
    FailFast,
    // Keep going and report every failed recipient
    ContinueOnError,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<ChatId>,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("sending to {chat_id} failed after {delivered} deliveries: {source}")]
    Send {
        chat_id: ChatId,
        delivered: usize,
        source: TransportError,
    },
}

/// Send `text` to every subscriber, reading the subscriber list once.
pub async fn broadcast<R, T>(
    registry: &R,
    transport: &T,
    text: &str,
    policy: BroadcastPolicy,
) -> Result<BroadcastReport, BroadcastError>
where
    R: SubscriberRegistry,
    T: Transport,
{
    let recipients = registry.list().await?;
    let mut report = BroadcastReport::default();

    for chat_id in recipients {
        match transport.send(chat_id, text).await {
            Ok(()) => {
                report.delivered += 1;
                BROADCAST_MESSAGES.inc();
            }
            Err(source) if policy == BroadcastPolicy::FailFast => {
                return Err(BroadcastError::Send {
                    chat_id,
                    delivered: report.delivered,
                    source,
                });
            }
            Err(e) => {
                warn!(chat_id, error = %e, "broadcast delivery failed");
                report.failed.push(chat_id);
            }
        }
    }

    info!(delivered = report.delivered, failed = report.failed.len(), "broadcast finished");
    Ok(report)
}
