// Optimistic send pipeline. A submitted draft becomes a locally visible
// `sending` message before any network round trip; the gateway's answer then
// either swaps in the server-confirmed record or marks the same local record
// `failed`. Nothing here retries: resending is an explicit user action.
//
// In-flight sends are tracked in an id-keyed map, so a confirmation is
// matched to its local record by bookkeeping, never by list position or
// content equality. `delivered` and `read` are server-side transitions and
// are never produced locally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use uuid::Uuid;

use crate::gateway::DataGateway;
use crate::models::{Draft, Message, MessageStatus};
use crate::store::CacheStore;

/// Bookkeeping for one in-flight send, keyed by the client-generated id.
#[derive(Debug, Clone)]
struct PendingSend {
    chat_id: String,
    submitted_at: DateTime<Utc>,
}

pub struct Outbox {
    gateway: Arc<dyn DataGateway>,
    store: Arc<CacheStore>,
    pending: Mutex<HashMap<String, PendingSend>>,
}

impl Outbox {
    pub fn new(gateway: Arc<dyn DataGateway>, store: Arc<CacheStore>) -> Self {
        Outbox {
            gateway,
            store,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a draft. Returns the cached record as it stands when the
    /// gateway call resolves: the confirmed message on success, or an error
    /// after the local record has been marked `failed`.
    pub async fn send(&self, chat_id: &str, sender_id: &str, draft: Draft) -> Result<Message> {
        if draft.is_empty() {
            bail!("refusing to send an empty message");
        }

        let local = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: draft.text.clone(),
            image_url: draft.image_url.clone(),
            file_url: draft.file_url.clone(),
            timestamp: Utc::now(),
            is_read: false,
            status: MessageStatus::Sending,
        };
        let local_id = local.id.clone();

        self.track(&local_id, chat_id);
        // The optimistic write: visible before any network round trip.
        self.store.append_message(chat_id, local)?;

        match self.gateway.send_message(chat_id, &draft).await {
            Ok(confirmed) => {
                self.untrack(&local_id);
                if confirmed.id != local_id {
                    debug!("Send {} confirmed under server id {}", local_id, confirmed.id);
                }
                self.store
                    .replace_message(chat_id, &local_id, confirmed.clone())?;
                info!("Message {} delivered to chat {}", confirmed.id, chat_id);
                Ok(confirmed)
            }
            Err(err) => {
                self.untrack(&local_id);
                error!("Send {} to chat {} failed: {}", local_id, chat_id, err);
                self.store
                    .update_message_status(chat_id, &local_id, MessageStatus::Failed)?;
                Err(err).context("could not send message")
            }
        }
    }

    /// Number of sends awaiting a gateway response.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn track(&self, local_id: &str, chat_id: &str) {
        self.lock().insert(
            local_id.to_string(),
            PendingSend {
                chat_id: chat_id.to_string(),
                submitted_at: Utc::now(),
            },
        );
    }

    fn untrack(&self, local_id: &str) {
        if let Some(pending) = self.lock().remove(local_id) {
            debug!(
                "Send {} for chat {} settled after {}ms",
                local_id,
                pending.chat_id,
                (Utc::now() - pending.submitted_at).num_milliseconds()
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingSend>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
