//! In-memory doubles shared by the unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cm_domain::{ACCEPT_LANGUAGE, AUTHORIZATION, ApiRequest, ApiResponse, HttpMethod, Language};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::ports::{FixedLocale, HttpClient, HttpClientError, KeyValueStorage, StorageEntry, StorageError};
use crate::session::Session;

/// A resource that answers 200 to a valid bearer and 401 otherwise.
pub const PROTECTED_PATH: &str = "cm/companies/";

/// Builds a session over the fake server with Polish as the language.
pub fn session_with(server: &Arc<FakeAuthServer>, storage: &Arc<MemoryStorage>) -> Arc<Session> {
    Arc::new(Session::new(
        server.clone(),
        storage.clone(),
        Arc::new(FixedLocale(Language::default())),
    ))
}

// ----- storage ---------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let storage = Self::default();
        storage.values.lock().extend(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        );
        Arc::new(storage)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("unreadable")));
        }
        Ok(self.value(key))
    }

    fn write(&self, entries: &[StorageEntry<'_>]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        let mut values = self.values.lock();
        for (key, value) in entries {
            match value {
                Some(value) => values.insert((*key).to_string(), (*value).to_string()),
                None => values.remove(*key),
            };
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ----- server ----------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub authorization: Option<String>,
    pub language: Option<String>,
    pub body: Option<Value>,
}

struct ServerState {
    accounts: HashMap<String, String>,
    valid_access: HashSet<String>,
    valid_refresh: HashSet<String>,
    issued_access: u32,
    issued_refresh: u32,
    rotate: bool,
    refresh_delay: Duration,
    resource_delay: Duration,
    network_down: bool,
    refresh_transport_down: bool,
    log: Vec<RecordedRequest>,
}

/// Mimics the token, refresh, profile and registration endpoints plus a
/// couple of business resources.
///
/// Tokens are issued as `A1`, `A2`, ... and `R1`, `R2`, ...; the account
/// `alice`/`pw` exists.
pub struct FakeAuthServer {
    state: Mutex<ServerState>,
    refresh_calls: AtomicUsize,
}

impl FakeAuthServer {
    /// Always answers 401, even to a fresh token.
    pub const FORBIDDEN_PATH: &'static str = "cm/restricted/";

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState {
                accounts: HashMap::from([("alice".to_string(), "pw".to_string())]),
                valid_access: HashSet::new(),
                valid_refresh: HashSet::new(),
                issued_access: 0,
                issued_refresh: 0,
                rotate: false,
                refresh_delay: Duration::ZERO,
                resource_delay: Duration::ZERO,
                network_down: false,
                refresh_transport_down: false,
                log: Vec::new(),
            }),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    /// Accepts the given pair as if it had been issued earlier.
    pub fn grant(&self, access: &str, refresh: &str) {
        let mut state = self.state.lock();
        state.valid_access.insert(access.to_string());
        state.valid_refresh.insert(refresh.to_string());
    }

    pub fn grant_refresh(&self, refresh: &str) {
        self.state.lock().valid_refresh.insert(refresh.to_string());
    }

    /// Invalidates every access token issued so far.
    pub fn expire_access(&self) {
        self.state.lock().valid_access.clear();
    }

    pub fn revoke_refresh(&self, refresh: &str) {
        self.state.lock().valid_refresh.remove(refresh);
    }

    pub fn set_rotation(&self, rotate: bool) {
        self.state.lock().rotate = rotate;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().refresh_delay = delay;
    }

    /// Delays answers from the business resources, not the auth endpoints.
    pub fn set_resource_delay(&self, delay: Duration) {
        self.state.lock().resource_delay = delay;
    }

    pub fn set_network_down(&self, down: bool) {
        self.state.lock().network_down = down;
    }

    /// Makes only the refresh endpoint unreachable.
    pub fn fail_refresh_transport(&self, down: bool) {
        self.state.lock().refresh_transport_down = down;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn total_requests(&self) -> usize {
        self.state.lock().log.len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn unreachable() -> HttpClientError {
        HttpClientError::ConnectionRefused {
            host: "localhost".to_string(),
            port: 8000,
        }
    }

    fn token_pair(&self, body: Option<&Value>) -> ApiResponse {
        let field = |name: &str| {
            body.and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (username, password) = (field("username"), field("password"));

        let mut state = self.state.lock();
        if state.accounts.get(&username) != Some(&password) {
            return json_response(
                401,
                &json!({"detail": "No active account found with the given credentials"}),
            );
        }
        state.issued_access += 1;
        state.issued_refresh += 1;
        let access = format!("A{}", state.issued_access);
        let refresh = format!("R{}", state.issued_refresh);
        state.valid_access.insert(access.clone());
        state.valid_refresh.insert(refresh.clone());
        json_response(200, &json!({"access": access, "refresh": refresh}))
    }

    async fn refresh(&self, body: Option<&Value>) -> Result<ApiResponse, HttpClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, down) = {
            let state = self.state.lock();
            (state.refresh_delay, state.refresh_transport_down)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if down {
            return Err(Self::unreachable());
        }

        let presented = body
            .and_then(|b| b.get("refresh"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut state = self.state.lock();
        if !state.valid_refresh.contains(presented) {
            return Ok(json_response(
                401,
                &json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            ));
        }
        state.issued_access += 1;
        let access = format!("A{}", state.issued_access);
        state.valid_access.insert(access.clone());

        if state.rotate {
            state.valid_refresh.remove(presented);
            state.issued_refresh += 1;
            let refresh = format!("R{}", state.issued_refresh);
            state.valid_refresh.insert(refresh.clone());
            Ok(json_response(200, &json!({"access": access, "refresh": refresh})))
        } else {
            Ok(json_response(200, &json!({"access": access})))
        }
    }

    fn register(&self, body: Option<&Value>) -> ApiResponse {
        let username = body
            .and_then(|b| b.get("username"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if self.state.lock().accounts.contains_key(username) {
            return json_response(
                400,
                &json!({"username": ["A user with that username already exists."]}),
            );
        }
        let email = body.and_then(|b| b.get("email")).cloned().unwrap_or(Value::Null);
        json_response(201, &json!({"username": username, "email": email}))
    }

    fn authorized(&self, request: &ApiRequest) -> bool {
        request
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.strip_prefix("Bearer "))
            .is_some_and(|token| self.state.lock().valid_access.contains(token))
    }

    fn resource(&self, request: &ApiRequest) -> ApiResponse {
        let unauthorized = || {
            json_response(
                401,
                &json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"}),
            )
        };
        if request.path == Self::FORBIDDEN_PATH || !self.authorized(request) {
            return unauthorized();
        }
        match request.path.as_str() {
            "auth/users/me/" => json_response(
                200,
                &json!({
                    "id": 1,
                    "username": "alice",
                    "first_name": "Alice",
                    "last_name": "Nowak",
                    "is_active": true,
                    "email": "alice@example.com"
                }),
            ),
            PROTECTED_PATH => json_response(200, &json!({"path": request.path})),
            _ => json_response(404, &json!({"detail": "Not found."})),
        }
    }
}

#[async_trait]
impl HttpClient for FakeAuthServer {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError> {
        {
            let mut state = self.state.lock();
            if state.network_down {
                return Err(Self::unreachable());
            }
            state.log.push(RecordedRequest {
                method: request.method,
                path: request.path.clone(),
                authorization: request.headers.get(AUTHORIZATION).map(str::to_string),
                language: request.headers.get(ACCEPT_LANGUAGE).map(str::to_string),
                body: request.body.clone(),
            });
        }

        let body = request.body.as_ref();
        match (request.method, request.path.as_str()) {
            (HttpMethod::Post, "auth/token/") => Ok(self.token_pair(body)),
            (HttpMethod::Post, "auth/token/refresh/") => self.refresh(body).await,
            (HttpMethod::Post, "auth/register/") => Ok(self.register(body)),
            _ => {
                let delay = self.state.lock().resource_delay;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(self.resource(request))
            }
        }
    }
}

fn json_response(status: u16, body: &Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}
