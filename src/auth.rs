// Login session lifecycle. Wraps the gateway's auth operations, persists the
// resulting session through the credential store, and records the signed-in
// user into the cache as its first observation.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::credentials::CredentialStore;
use crate::gateway::DataGateway;
use crate::models::{AuthResponse, User};
use crate::store::CacheStore;

pub struct AuthSession {
    gateway: Arc<dyn DataGateway>,
    store: Arc<CacheStore>,
    credentials: Arc<CredentialStore>,
}

impl AuthSession {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        store: Arc<CacheStore>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        AuthSession {
            gateway,
            store,
            credentials,
        }
    }

    /// `login` may be an email or a username.
    pub async fn login(&self, login: &str, password: &str) -> Result<User> {
        let response = self
            .gateway
            .login(login, password)
            .await
            .context("login failed")?;
        self.adopt(response)
    }

    pub async fn register(
        &self,
        name: &str,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let response = self
            .gateway
            .register(name, username, email, password)
            .await
            .context("registration failed")?;
        self.adopt(response)
    }

    /// Refresh the signed-in user from the server. Requires a session.
    pub async fn load_current_user(&self) -> Result<User> {
        let user = self
            .gateway
            .get_current_user()
            .await
            .context("could not load current user")?;
        self.credentials.update_user(user.clone())?;
        self.store.upsert_user(user.clone())?;
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.credentials.clear()
    }

    /// The restored or freshly established session user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.credentials.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.token().is_some()
    }

    fn adopt(&self, response: AuthResponse) -> Result<User> {
        let AuthResponse { user, token } = response;
        self.credentials.store_session(&token, user.clone())?;
        if let Err(err) = self.store.upsert_user(user.clone()) {
            warn!("Could not cache signed-in user: {}", err);
        }
        info!("Signed in as {} ({})", user.name, user.id);
        Ok(user)
    }
}
