// Orchestrates gateway fetches into the cache store. Load operations degrade
// to whatever is cached when the gateway fails; mutation operations surface
// their failures untouched.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::gateway::DataGateway;
use crate::models::{Chat, User};
use crate::store::CacheStore;

pub struct SyncCoordinator {
    gateway: Arc<dyn DataGateway>,
    store: Arc<CacheStore>,
    page_size: usize,
    /// Chats with a backfill currently in flight. This is a duplicate-call
    /// guard, not a cancellation token: a stale response still merges.
    backfills: Mutex<HashSet<String>>,
}

impl SyncCoordinator {
    pub fn new(gateway: Arc<dyn DataGateway>, store: Arc<CacheStore>, page_size: usize) -> Self {
        SyncCoordinator {
            gateway,
            store,
            page_size,
            backfills: Mutex::new(HashSet::new()),
        }
    }

    /// Fetch the chat list and replace the cached one wholesale. On failure
    /// the previously cached chats stay visible; only the error is surfaced.
    pub async fn load_chats(&self) -> Result<()> {
        let chats = self
            .gateway
            .list_chats()
            .await
            .context("could not load chats")?;
        info!("Loaded {} chats", chats.len());
        self.store.replace_chats(chats)
    }

    /// Create a chat with another user and insert it into the cache, making
    /// it visible without a full reload. No local placeholder on failure.
    pub async fn create_chat(&self, user_id: &str) -> Result<Chat> {
        let chat = self
            .gateway
            .create_chat(user_id)
            .await
            .context("could not create chat")?;
        self.store.add_chat(chat.clone())?;
        Ok(chat)
    }

    /// Authoritative reload of a chat's first page: wholesale replacement,
    /// not a merge. On failure the cached list stays as the fallback.
    pub async fn load_messages(&self, chat_id: &str) -> Result<()> {
        let messages = self
            .gateway
            .list_messages(chat_id, self.page_size, 0)
            .await
            .context("could not load messages")?;
        self.store.replace_messages(chat_id, messages)
    }

    /// Backfill the next page of history, offset by how much is already
    /// cached, and merge it in. At most one backfill per chat is in flight;
    /// a second call while one is pending is a no-op. A failed backfill
    /// leaves the cache unchanged, so the cached count never decreases.
    pub async fn load_more_messages(&self, chat_id: &str) -> Result<()> {
        {
            let mut in_flight = self.lock_backfills();
            if !in_flight.insert(chat_id.to_string()) {
                debug!("Backfill already in flight for chat {}, ignoring", chat_id);
                return Ok(());
            }
        }

        let offset = self.store.message_count(chat_id);
        let fetched = self
            .gateway
            .list_messages(chat_id, self.page_size, offset)
            .await;
        self.lock_backfills().remove(chat_id);

        let batch = fetched.context("could not load more messages")?;
        debug!("Backfilled {} messages for chat {} at offset {}", batch.len(), chat_id, offset);
        let mut merged = self.store.messages(chat_id);
        merged.extend(batch);
        self.store.replace_messages(chat_id, merged)
    }

    /// Cache-first user lookup. A miss fetches from the gateway and records
    /// the observation.
    pub async fn resolve_user(&self, id: &str) -> Result<User> {
        if let Some(user) = self.store.user(id) {
            return Ok(user);
        }
        let user = self
            .gateway
            .get_user(id)
            .await
            .with_context(|| format!("could not resolve user {}", id))?;
        self.store.upsert_user(user.clone())?;
        Ok(user)
    }

    /// Search users on the gateway; every result is a fresh observation and
    /// gets recorded into the user cache.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let users = self
            .gateway
            .search_users(query)
            .await
            .context("user search failed")?;
        for user in &users {
            if let Err(err) = self.store.upsert_user(user.clone()) {
                warn!("Could not cache user {}: {}", user.id, err);
            }
        }
        Ok(users)
    }

    fn lock_backfills(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.backfills.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
