// Common test utilities for the integration tests: logging setup, temp-dir
// stores, gateway doubles, and a minimal in-process HTTP server for driving
// the remote gateway over a real socket.

#![allow(dead_code)] // each test binary uses a different subset

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use log::LevelFilter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use parley::gateway::CredentialProvider;
use parley::{
    CacheStore, Chat, DataGateway, Draft, GatewayError, Message, SimulatedGateway, User,
};
use parley::models::AuthResponse;

static INIT_LOGGER: Once = Once::new();

/// Set up the logger once for a test binary.
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A cache store rooted in a fresh temp dir. Keep the tempdir alive for the
/// duration of the test.
pub fn temp_store() -> (Arc<CacheStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CacheStore::open(dir.path()).expect("open store");
    (Arc::new(store), dir)
}

/// Simulated gateway without artificial latency.
pub fn instant_gateway() -> Arc<SimulatedGateway> {
    Arc::new(SimulatedGateway::new().with_latency(Duration::ZERO))
}

/// Credential provider with a fixed token (or none).
pub struct StaticToken(pub Option<String>);

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Gateway double whose every operation fails with a transport error, for
/// exercising offline behavior.
pub struct UnreachableGateway;

impl UnreachableGateway {
    fn outage<T>(&self) -> Result<T, GatewayError> {
        Err(GatewayError::Transport("connection refused".to_string()))
    }
}

#[async_trait]
impl DataGateway for UnreachableGateway {
    async fn login(&self, _login: &str, _password: &str) -> Result<AuthResponse, GatewayError> {
        self.outage()
    }
    async fn register(
        &self,
        _name: &str,
        _username: Option<&str>,
        _email: &str,
        _password: &str,
    ) -> Result<AuthResponse, GatewayError> {
        self.outage()
    }
    async fn get_current_user(&self) -> Result<User, GatewayError> {
        self.outage()
    }
    async fn list_chats(&self) -> Result<Vec<Chat>, GatewayError> {
        self.outage()
    }
    async fn get_chat(&self, _id: &str) -> Result<Chat, GatewayError> {
        self.outage()
    }
    async fn create_chat(&self, _participant_id: &str) -> Result<Chat, GatewayError> {
        self.outage()
    }
    async fn list_messages(
        &self,
        _chat_id: &str,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        self.outage()
    }
    async fn send_message(&self, _chat_id: &str, _draft: &Draft) -> Result<Message, GatewayError> {
        self.outage()
    }
    async fn search_users(&self, _query: &str) -> Result<Vec<User>, GatewayError> {
        self.outage()
    }
    async fn get_user(&self, _id: &str) -> Result<User, GatewayError> {
        self.outage()
    }
}

/// Delegating gateway that counts calls per operation.
pub struct CountingGateway {
    inner: Arc<dyn DataGateway>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl CountingGateway {
    pub fn new(inner: Arc<dyn DataGateway>) -> Self {
        CountingGateway {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
    }
}

#[async_trait]
impl DataGateway for CountingGateway {
    async fn login(&self, login: &str, password: &str) -> Result<AuthResponse, GatewayError> {
        self.record("login");
        self.inner.login(login, password).await
    }
    async fn register(
        &self,
        name: &str,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, GatewayError> {
        self.record("register");
        self.inner.register(name, username, email, password).await
    }
    async fn get_current_user(&self) -> Result<User, GatewayError> {
        self.record("get_current_user");
        self.inner.get_current_user().await
    }
    async fn list_chats(&self) -> Result<Vec<Chat>, GatewayError> {
        self.record("list_chats");
        self.inner.list_chats().await
    }
    async fn get_chat(&self, id: &str) -> Result<Chat, GatewayError> {
        self.record("get_chat");
        self.inner.get_chat(id).await
    }
    async fn create_chat(&self, participant_id: &str) -> Result<Chat, GatewayError> {
        self.record("create_chat");
        self.inner.create_chat(participant_id).await
    }
    async fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        self.record("list_messages");
        self.inner.list_messages(chat_id, limit, offset).await
    }
    async fn send_message(&self, chat_id: &str, draft: &Draft) -> Result<Message, GatewayError> {
        self.record("send_message");
        self.inner.send_message(chat_id, draft).await
    }
    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError> {
        self.record("search_users");
        self.inner.search_users(query).await
    }
    async fn get_user(&self, id: &str) -> Result<User, GatewayError> {
        self.record("get_user");
        self.inner.get_user(id).await
    }
}

/// One canned HTTP response for the stub server.
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        StubResponse {
            status: 200,
            body: body.into(),
        }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        StubResponse {
            status,
            body: body.into(),
        }
    }
}

/// What the stub server saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Minimal single-purpose HTTP server: serves one canned response per
/// accepted connection, in order, and records what each request looked like.
pub struct StubServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub server");
        let addr = listener.local_addr().expect("local addr");
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let handle = tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut socket).await {
                    recorded.lock().unwrap().push(request);
                }
                let payload = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    response.body.len(),
                    response.body
                );
                let _ = socket.write_all(payload.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        StubServer {
            addr,
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read one HTTP/1.1 request off the socket: head until the blank line, then
/// a Content-Length body if one was declared.
async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = find_blank_line(&buf) {
            break pos;
        }
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut authorization = None;
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name == "authorization" {
            authorization = Some(value.to_string());
        } else if name == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
    }

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 1024];
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        target,
        authorization,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}
