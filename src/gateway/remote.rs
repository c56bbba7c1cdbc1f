// HTTP implementation of the data gateway: JSON bodies, bearer auth,
// millisecond timestamps on the wire, and the shared error taxonomy at the
// boundary.

use std::sync::Arc;

use log::debug;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{CredentialProvider, DataGateway};
use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::models::{AuthResponse, Chat, Draft, Message, User};

pub struct RemoteGateway {
    http: Client,
    api_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl RemoteGateway {
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(GatewayError::from_http)?;
        Ok(RemoteGateway {
            http,
            api_url: config.api_url(),
            credentials,
        })
    }

    /// One request/response round trip shared by every operation: attach the
    /// bearer token when present, send JSON, map non-2xx responses, decode.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.api_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(GatewayError::from_http)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(GatewayError::from_http)?;

        if !status.is_success() {
            return Err(error_for_status(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

/// Non-2xx handling: a structured `{"error": ...}` body becomes an API
/// failure carrying the server's message, anything else the bare status.
fn error_for_status(status: StatusCode, body: &[u8]) -> GatewayError {
    #[derive(Deserialize)]
    struct ApiErrorBody {
        error: String,
    }

    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) => GatewayError::Api(parsed.error),
        Err(_) => GatewayError::Http(status.as_u16()),
    }
}

#[async_trait::async_trait]
impl DataGateway for RemoteGateway {
    async fn login(&self, login: &str, password: &str) -> Result<AuthResponse, GatewayError> {
        let body = json!({ "login": login, "password": password });
        self.request(Method::POST, "/auth/login", &[], Some(body)).await
    }

    async fn register(
        &self,
        name: &str,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, GatewayError> {
        let mut body = json!({ "name": name, "email": email, "password": password });
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            body["username"] = Value::String(username.to_string());
        }
        self.request(Method::POST, "/auth/register", &[], Some(body)).await
    }

    async fn get_current_user(&self) -> Result<User, GatewayError> {
        self.request(Method::GET, "/auth/me", &[], None).await
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, GatewayError> {
        self.request(Method::GET, "/chats", &[], None).await
    }

    async fn get_chat(&self, id: &str) -> Result<Chat, GatewayError> {
        self.request(Method::GET, &format!("/chats/{}", id), &[], None).await
    }

    async fn create_chat(&self, participant_id: &str) -> Result<Chat, GatewayError> {
        let body = json!({ "participantID": participant_id });
        self.request(Method::POST, "/chats", &[], Some(body)).await
    }

    async fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        let limit = limit.to_string();
        let offset = offset.to_string();
        self.request(
            Method::GET,
            &format!("/chats/{}/messages", chat_id),
            &[("limit", limit.as_str()), ("offset", offset.as_str())],
            None,
        )
        .await
    }

    async fn send_message(&self, chat_id: &str, draft: &Draft) -> Result<Message, GatewayError> {
        let body = serde_json::to_value(draft)
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        self.request(
            Method::POST,
            &format!("/chats/{}/messages", chat_id),
            &[],
            Some(body),
        )
        .await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError> {
        self.request(Method::GET, "/users/search", &[("q", query)], None).await
    }

    async fn get_user(&self, id: &str) -> Result<User, GatewayError> {
        self.request(Method::GET, &format!("/users/{}", id), &[], None).await
    }
}
