// The single authoritative local mirror of chats, per-chat message lists and
// user records. All mutation funnels through here; the sync layer and the
// outbox only request changes, and every read surface is a snapshot of this
// store. Three records persist independently as JSON files and are loaded
// independently at startup.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::models::{Chat, Message, MessageStatus, User};
use crate::reconcile;

const CHATS_FILE: &str = "chats.json";
const MESSAGES_FILE: &str = "messages.json";
const USERS_FILE: &str = "users.json";

struct CacheInner {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    users: HashMap<String, User>,
    revision: u64,
}

pub struct CacheStore {
    dir: PathBuf,
    inner: Mutex<CacheInner>,
    notify: watch::Sender<u64>,
}

impl CacheStore {
    /// Open the store rooted at `dir`, loading whatever records survive from
    /// a previous run. An unreadable record logs a warning and starts empty;
    /// the process never fails over a cache file.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let inner = CacheInner {
            chats: load_record(&dir.join(CHATS_FILE)),
            messages: load_record(&dir.join(MESSAGES_FILE)),
            users: load_record(&dir.join(USERS_FILE)),
            revision: 0,
        };
        let (notify, _) = watch::channel(0);
        Ok(CacheStore {
            dir: dir.to_path_buf(),
            inner: Mutex::new(inner),
            notify,
        })
    }

    // --- chats ---

    /// Wholesale replacement from an authoritative server fetch.
    /// Last write wins; duplicates collapse to their first occurrence.
    pub fn replace_chats(&self, chats: Vec<Chat>) -> Result<()> {
        let mut inner = self.lock();
        inner.chats = reconcile::dedupe_chats(chats);
        self.persist_chats(&inner)?;
        self.bump(&mut inner);
        Ok(())
    }

    /// Insert a newly created chat. A chat that is already tracked is left
    /// alone; refreshing it is the caller's business via `replace_chats`.
    pub fn add_chat(&self, chat: Chat) -> Result<()> {
        let mut inner = self.lock();
        if inner.chats.iter().any(|existing| existing.id == chat.id) {
            debug!("Chat {} already cached, skipping insert", chat.id);
            return Ok(());
        }
        inner.chats.push(chat);
        self.persist_chats(&inner)?;
        self.bump(&mut inner);
        Ok(())
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.lock().chats.clone()
    }

    // --- messages ---

    /// Wholesale replacement of one chat's message list. The stored list is
    /// always deduplicated by id (first occurrence wins) and sorted
    /// ascending by timestamp, and the owning chat's denormalized summary is
    /// recomputed before returning.
    pub fn replace_messages(&self, chat_id: &str, messages: Vec<Message>) -> Result<()> {
        let mut inner = self.lock();
        let mut list = reconcile::dedupe_messages(messages);
        reconcile::sort_messages(&mut list);
        inner.messages.insert(chat_id.to_string(), list);
        self.finish_message_mutation(&mut inner, chat_id)
    }

    /// Insert one message. A message with the same id replaces the existing
    /// record in place, which is what turns an optimistic `sending` record
    /// into its confirmed form when the server echoes the same id.
    pub fn append_message(&self, chat_id: &str, message: Message) -> Result<()> {
        let mut inner = self.lock();
        let list = inner.messages.entry(chat_id.to_string()).or_default();
        match list.iter_mut().find(|existing| existing.id == message.id) {
            Some(existing) => *existing = message,
            None => list.push(message),
        }
        reconcile::sort_messages(list);
        self.finish_message_mutation(&mut inner, chat_id)
    }

    /// Swap the record stored under `old_id` for `message`, used when the
    /// server confirms a send under a different id than the client chose.
    /// If the old record is gone the confirmed message is inserted anyway.
    pub fn replace_message(&self, chat_id: &str, old_id: &str, message: Message) -> Result<()> {
        let mut inner = self.lock();
        let list = inner.messages.entry(chat_id.to_string()).or_default();
        match list.iter_mut().find(|existing| existing.id == old_id) {
            Some(existing) => *existing = message,
            None => {
                warn!("Message {} not found in chat {}, inserting confirmed record", old_id, chat_id);
                list.push(message);
            }
        }
        let deduped = reconcile::dedupe_messages(std::mem::take(list));
        *list = deduped;
        reconcile::sort_messages(list);
        self.finish_message_mutation(&mut inner, chat_id)
    }

    /// Transition one message's delivery status in place. Returns false when
    /// the message is not cached.
    pub fn update_message_status(
        &self,
        chat_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(list) = inner.messages.get_mut(chat_id) else {
            return Ok(false);
        };
        let Some(message) = list.iter_mut().find(|m| m.id == message_id) else {
            return Ok(false);
        };
        message.status = status;
        self.finish_message_mutation(&mut inner, chat_id)?;
        Ok(true)
    }

    /// Cached messages for a chat, oldest first. Empty when nothing is cached.
    pub fn messages(&self, chat_id: &str) -> Vec<Message> {
        self.lock().messages.get(chat_id).cloned().unwrap_or_default()
    }

    pub fn message_count(&self, chat_id: &str) -> usize {
        self.lock().messages.get(chat_id).map_or(0, |list| list.len())
    }

    // --- users ---

    pub fn upsert_user(&self, user: User) -> Result<()> {
        let mut inner = self.lock();
        inner.users.insert(user.id.clone(), user);
        write_record(&self.dir.join(USERS_FILE), &inner.users)?;
        self.bump(&mut inner);
        Ok(())
    }

    /// `None` means the user has never been observed, which is distinct from
    /// every known-user answer.
    pub fn user(&self, id: &str) -> Option<User> {
        self.lock().users.get(id).cloned()
    }

    // --- lifecycle & subscriptions ---

    /// Full cache eviction: the only way records ever leave this store.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.chats.clear();
        inner.messages.clear();
        inner.users.clear();
        for name in [CHATS_FILE, MESSAGES_FILE, USERS_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        self.bump(&mut inner);
        Ok(())
    }

    /// Current snapshot revision. Bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Subscribe to snapshot-changed notifications. Receivers own their
    /// subscription lifetime; dropping the receiver is the unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    /// The same notifications as an async stream of revisions.
    pub fn updates(&self) -> WatchStream<u64> {
        WatchStream::new(self.notify.subscribe())
    }

    // --- internals ---

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared tail of every message mutation: recompute the owning chat's
    /// denormalized summary, persist both affected records, bump revision.
    fn finish_message_mutation(&self, inner: &mut CacheInner, chat_id: &str) -> Result<()> {
        let messages = inner.messages.get(chat_id).cloned().unwrap_or_default();
        if let Some(chat) = inner.chats.iter_mut().find(|chat| chat.id == chat_id) {
            reconcile::refresh_chat_summary(chat, &messages);
        }
        write_record(&self.dir.join(MESSAGES_FILE), &inner.messages)?;
        self.persist_chats(inner)?;
        self.bump(inner);
        Ok(())
    }

    fn persist_chats(&self, inner: &CacheInner) -> Result<()> {
        write_record(&self.dir.join(CHATS_FILE), &inner.chats)
    }

    fn bump(&self, inner: &mut CacheInner) {
        inner.revision += 1;
        let _ = self.notify.send(inner.revision);
    }
}

/// Write a record atomically: serialize to a sibling temp file, then rename
/// over the target.
fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp)?;
    serde_json::to_writer(file, value)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_record<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|contents| {
        serde_json::from_str(&contents).map_err(anyhow::Error::from)
    }) {
        Ok(value) => value,
        Err(err) => {
            warn!("Could not load cached record {}: {}", path.display(), err);
            T::default()
        }
    }
}
