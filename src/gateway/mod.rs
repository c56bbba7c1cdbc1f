// Data gateway boundary. Everything above this module speaks the trait;
// whether the other side is the real backend or the in-memory simulation is
// a wiring decision made once at startup.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::{AuthResponse, Chat, Draft, Message, User};

pub mod remote;
pub mod simulated;

pub use remote::RemoteGateway;
pub use simulated::SimulatedGateway;

/// Opaque source of the bearer credential. How the token is acquired and
/// stored is someone else's problem; the gateway only reads it per request.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Remote-or-simulated data source. All operations are asynchronous and
/// return either a typed result or a [`GatewayError`]; callers must not
/// assume latency or cross-operation ordering.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// `login` may be an email or a username.
    async fn login(&self, login: &str, password: &str) -> Result<AuthResponse, GatewayError>;

    async fn register(
        &self,
        name: &str,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, GatewayError>;

    async fn get_current_user(&self) -> Result<User, GatewayError>;

    async fn list_chats(&self) -> Result<Vec<Chat>, GatewayError>;

    async fn get_chat(&self, id: &str) -> Result<Chat, GatewayError>;

    async fn create_chat(&self, participant_id: &str) -> Result<Chat, GatewayError>;

    /// One page of a chat's history. Pages are limit/offset windows over the
    /// server's ordering; merging and sorting happen in the sync layer.
    async fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, GatewayError>;

    /// Deliver a draft. The returned message carries the server-assigned id,
    /// timestamp and status.
    async fn send_message(&self, chat_id: &str, draft: &Draft) -> Result<Message, GatewayError>;

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError>;

    async fn get_user(&self, id: &str) -> Result<User, GatewayError>;
}
