// Client-side sync core for the messenger: cache mirror, gateway contract
// with remote and simulated implementations, reconciliation, and the
// optimistic send pipeline.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod models;
pub mod outbox;
pub mod reconcile;
pub mod store;
pub mod sync;

// Re-export the types most callers wire together at startup.
pub use auth::AuthSession;
pub use config::AppConfig;
pub use credentials::CredentialStore;
pub use error::GatewayError;
pub use gateway::{CredentialProvider, DataGateway, RemoteGateway, SimulatedGateway};
pub use models::{Chat, Draft, Message, MessageKind, MessageStatus, User, UserStatus};
pub use outbox::Outbox;
pub use store::CacheStore;
pub use sync::SyncCoordinator;
