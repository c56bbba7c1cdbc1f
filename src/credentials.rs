use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::gateway::CredentialProvider;
use crate::models::User;

/// Persisted login session: the bearer token and the signed-in user.
/// The token is base64-encoded at rest.
#[derive(Serialize, Deserialize, Clone)]
pub struct SessionRecord {
    token: String,
    pub user: User,
}

impl SessionRecord {
    pub fn new(token: &str, user: User) -> Self {
        SessionRecord {
            token: BASE64.encode(token),
            user,
        }
    }

    pub fn token(&self) -> Option<String> {
        BASE64
            .decode(&self.token)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
    }
}

/// File-backed session storage. Holds the current session in memory so the
/// network gateway can read the token on every request without touching disk.
pub struct CredentialStore {
    path: PathBuf,
    session: Mutex<Option<SessionRecord>>,
}

impl CredentialStore {
    /// Open the store rooted at `dir`, restoring a previously saved session
    /// if one exists. An unreadable session file is discarded with a warning.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let path = dir.join("session.json");
        let session = match load_session(&path) {
            Ok(session) => session,
            Err(err) => {
                warn!("Discarding unreadable session file {}: {}", path.display(), err);
                None
            }
        };
        Ok(CredentialStore {
            path,
            session: Mutex::new(session),
        })
    }

    /// Replace the stored session after a successful login or registration.
    pub fn store_session(&self, token: &str, user: User) -> Result<()> {
        let record = SessionRecord::new(token, user);
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &record)?;
        info!("Session saved for {}", record.user.name);
        *self.lock() = Some(record);
        Ok(())
    }

    /// Refresh the persisted user without touching the token.
    pub fn update_user(&self, user: User) -> Result<()> {
        let record = {
            let mut guard = self.lock();
            let record = guard
                .as_mut()
                .ok_or_else(|| anyhow!("no active session to update"))?;
            record.user = user;
            record.clone()
        };
        let file = File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &record)?;
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().as_ref().map(|record| record.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.lock().as_ref().and_then(|record| record.token())
    }

    /// Drop the session from memory and disk.
    pub fn clear(&self) -> Result<()> {
        *self.lock() = None;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        info!("Session cleared");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionRecord>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialProvider for CredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }
}

fn load_session(path: &Path) -> Result<Option<SessionRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let record: SessionRecord = serde_json::from_str(&contents)?;
    info!("Restored session for {} from {}", record.user.name, path.display());
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: "Test User".to_string(),
            username: None,
            email: Some("test@example.com".to_string()),
            avatar_url: None,
            status: UserStatus::Online,
            last_seen: None,
        }
    }

    #[test]
    fn token_is_obfuscated_at_rest_and_round_trips() {
        let record = SessionRecord::new("secret-token", user("u1"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("secret-token"));
        assert_eq!(record.token().as_deref(), Some("secret-token"));
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CredentialStore::open(dir.path()).unwrap();
            store.store_session("tok", user("u1")).unwrap();
        }
        let store = CredentialStore::open(dir.path()).unwrap();
        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.current_user().unwrap().id, "u1");

        store.clear().unwrap();
        assert!(store.token().is_none());
        let store = CredentialStore::open(dir.path()).unwrap();
        assert!(store.current_user().is_none());
    }
}
