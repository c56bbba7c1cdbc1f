// Deterministic in-memory implementation of the data gateway. Serves a
// fixed fixture world behind artificial latency so everything above the
// gateway boundary runs unchanged without a backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use once_cell::sync::Lazy;

use super::DataGateway;
use crate::error::GatewayError;
use crate::models::{
    AuthResponse, Chat, Draft, LastMessage, Message, MessageStatus, User, UserStatus,
};
use crate::reconcile;

/// Fixed point in time all fixture timestamps are offsets from, so two
/// instances always produce identical data. 2024-06-01 12:00:00 UTC.
static FIXTURE_EPOCH: Lazy<DateTime<Utc>> =
    Lazy::new(|| Utc.timestamp_millis_opt(1_717_243_200_000).unwrap());

const CURRENT_USER_ID: &str = "current_user";
const FIXTURE_TOKEN: &str = "simulated-token";

struct SimWorld {
    me: User,
    users: Vec<User>,
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    next_id: u64,
}

pub struct SimulatedGateway {
    world: Mutex<SimWorld>,
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        SimulatedGateway {
            world: Mutex::new(fixture_world()),
            latency: Duration::from_millis(300),
        }
    }

    /// Override the artificial per-operation latency. Tests use zero.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimWorld> {
        self.world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DataGateway for SimulatedGateway {
    async fn login(&self, login: &str, _password: &str) -> Result<AuthResponse, GatewayError> {
        self.simulate_latency().await;
        let mut world = self.lock();
        let name = login.split('@').next().unwrap_or("User").to_string();
        world.me = User {
            id: CURRENT_USER_ID.to_string(),
            name,
            username: None,
            email: login.contains('@').then(|| login.to_string()),
            avatar_url: None,
            status: UserStatus::Online,
            last_seen: None,
        };
        Ok(AuthResponse {
            user: world.me.clone(),
            token: FIXTURE_TOKEN.to_string(),
        })
    }

    async fn register(
        &self,
        name: &str,
        username: Option<&str>,
        email: &str,
        _password: &str,
    ) -> Result<AuthResponse, GatewayError> {
        self.simulate_latency().await;
        let mut world = self.lock();
        world.me = User {
            id: CURRENT_USER_ID.to_string(),
            name: name.to_string(),
            username: username.map(|u| u.to_string()),
            email: Some(email.to_string()),
            avatar_url: None,
            status: UserStatus::Online,
            last_seen: None,
        };
        Ok(AuthResponse {
            user: world.me.clone(),
            token: FIXTURE_TOKEN.to_string(),
        })
    }

    async fn get_current_user(&self) -> Result<User, GatewayError> {
        self.simulate_latency().await;
        Ok(self.lock().me.clone())
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, GatewayError> {
        self.simulate_latency().await;
        Ok(self.lock().chats.clone())
    }

    async fn get_chat(&self, id: &str) -> Result<Chat, GatewayError> {
        self.simulate_latency().await;
        self.lock()
            .chats
            .iter()
            .find(|chat| chat.id == id)
            .cloned()
            .ok_or(GatewayError::NoData)
    }

    async fn create_chat(&self, participant_id: &str) -> Result<Chat, GatewayError> {
        self.simulate_latency().await;
        let mut world = self.lock();
        world.next_id += 1;
        let chat = Chat {
            id: format!("chat-{}", world.next_id),
            participants: vec![CURRENT_USER_ID.to_string(), participant_id.to_string()],
            last_message: None,
            last_message_date: Utc::now(),
            unread_count: 0,
            is_pinned: false,
            created_at: Utc::now(),
        };
        debug!("Simulated chat {} created with {}", chat.id, participant_id);
        world.chats.push(chat.clone());
        world.messages.insert(chat.id.clone(), Vec::new());
        Ok(chat)
    }

    async fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        self.simulate_latency().await;
        let world = self.lock();
        let messages = world.messages.get(chat_id).cloned().unwrap_or_default();
        Ok(messages.into_iter().skip(offset).take(limit).collect())
    }

    async fn send_message(&self, chat_id: &str, draft: &Draft) -> Result<Message, GatewayError> {
        self.simulate_latency().await;
        let mut world = self.lock();
        if !world.chats.iter().any(|chat| chat.id == chat_id) {
            return Err(GatewayError::NoData);
        }
        world.next_id += 1;
        // Server-assigned ids intentionally differ from client-local ids so
        // the optimistic swap path is exercised against this gateway too.
        let message = Message {
            id: format!("srv-{}", world.next_id),
            chat_id: chat_id.to_string(),
            sender_id: world.me.id.clone(),
            text: draft.text.clone(),
            image_url: draft.image_url.clone(),
            file_url: draft.file_url.clone(),
            timestamp: Utc::now(),
            is_read: false,
            status: MessageStatus::Sent,
        };
        let list = world.messages.entry(chat_id.to_string()).or_default();
        list.push(message.clone());
        let snapshot = list.clone();
        if let Some(chat) = world.chats.iter_mut().find(|chat| chat.id == chat_id) {
            reconcile::refresh_chat_summary(chat, &snapshot);
        }
        Ok(message)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError> {
        self.simulate_latency().await;
        let needle = query.to_lowercase();
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|user| {
                user.name.to_lowercase().contains(&needle)
                    || user
                        .username
                        .as_deref()
                        .is_some_and(|u| u.to_lowercase().contains(&needle))
                    || user
                        .email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: &str) -> Result<User, GatewayError> {
        self.simulate_latency().await;
        let world = self.lock();
        if world.me.id == id {
            return Ok(world.me.clone());
        }
        world
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(GatewayError::NoData)
    }
}

fn fixture_user(id: &str, name: &str, email: &str, status: UserStatus) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        username: None,
        email: Some(email.to_string()),
        avatar_url: None,
        status,
        last_seen: None,
    }
}

fn fixture_message(
    id: &str,
    chat_id: &str,
    sender_id: &str,
    text: &str,
    seconds_ago: i64,
    status: MessageStatus,
) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender_id.to_string(),
        text: Some(text.to_string()),
        image_url: None,
        file_url: None,
        timestamp: *FIXTURE_EPOCH - chrono::Duration::seconds(seconds_ago),
        is_read: status == MessageStatus::Read,
        status,
    }
}

fn fixture_chat(id: &str, other: &str, messages: &[Message], unread: u32, pinned: bool) -> Chat {
    let newest = reconcile::newest_message(messages);
    Chat {
        id: id.to_string(),
        participants: vec![CURRENT_USER_ID.to_string(), other.to_string()],
        last_message: newest.map(|m| LastMessage {
            id: m.id.clone(),
            text: m.text.clone().unwrap_or_default(),
            timestamp: m.timestamp,
        }),
        last_message_date: newest.map(|m| m.timestamp).unwrap_or(*FIXTURE_EPOCH),
        unread_count: unread,
        is_pinned: pinned,
        created_at: *FIXTURE_EPOCH - chrono::Duration::days(7),
    }
}

fn fixture_world() -> SimWorld {
    let users = vec![
        fixture_user("user1", "Anna Iverson", "anna@example.com", UserStatus::Online),
        fixture_user("user2", "Peter Sidwell", "peter@example.com", UserStatus::Away),
        fixture_user("user3", "Maria Petrova", "maria@example.com", UserStatus::Offline),
        fixture_user("user4", "Ivan Kessler", "ivan@example.com", UserStatus::Online),
        fixture_user("user5", "Elena Smirnova", "elena@example.com", UserStatus::Online),
    ];

    let chat1_messages = vec![
        fixture_message("msg1", "chat1", "user1", "Hey! How are you?", 3600, MessageStatus::Read),
        fixture_message("msg2", "chat1", CURRENT_USER_ID, "Hi! All good, thanks!", 3500, MessageStatus::Read),
        fixture_message("msg3", "chat1", "user1", "Want to meet up tomorrow?", 3400, MessageStatus::Read),
        fixture_message("msg4", "chat1", CURRENT_USER_ID, "Sure! What time?", 3300, MessageStatus::Delivered),
    ];
    let chat2_messages = vec![
        fixture_message("msg5", "chat2", "user2", "Hello!", 7200, MessageStatus::Read),
        fixture_message("msg6", "chat2", CURRENT_USER_ID, "Hi! What's new?", 7100, MessageStatus::Read),
        fixture_message("msg7", "chat2", "user2", "All fine, heads down on the project", 7000, MessageStatus::Read),
    ];
    let chat3_messages = vec![
        fixture_message("msg8", "chat3", "user3", "Good afternoon!", 86_400, MessageStatus::Read),
        fixture_message("msg9", "chat3", CURRENT_USER_ID, "Hi! How is it going?", 86_000, MessageStatus::Read),
    ];

    let chats = vec![
        fixture_chat("chat1", "user1", &chat1_messages, 0, true),
        fixture_chat("chat2", "user2", &chat2_messages, 2, false),
        fixture_chat("chat3", "user3", &chat3_messages, 0, false),
    ];

    let mut messages = HashMap::new();
    messages.insert("chat1".to_string(), chat1_messages);
    messages.insert("chat2".to_string(), chat2_messages);
    messages.insert("chat3".to_string(), chat3_messages);

    SimWorld {
        me: fixture_user(CURRENT_USER_ID, "You", "you@example.com", UserStatus::Online),
        users,
        chats,
        messages,
        next_id: 99,
    }
}
