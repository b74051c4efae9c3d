//! Session coordinator.
//!
//! Owns login, logout, startup bootstrap and refresh orchestration. It is
//! the only writer of the credential store and the user profile; the
//! request pipeline and route guard only read through it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cm_domain::{
    ApiRequest, ApiResponse, CredentialPair, Language, LogoutReason, Registration, SessionEvent,
    SessionState, UserProfile,
};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{OnceCell, broadcast, watch};

use crate::credentials::CredentialStore;
use crate::endpoints::AuthEndpoints;
use crate::error::{SessionError, SessionResult};
use crate::pipeline::pre_send;
use crate::ports::{HttpClient, KeyValueStorage, LocaleSource};
use crate::refresh_gate::{RefreshGate, RefreshOutcome};

const EVENT_CAPACITY: usize = 32;

/// Credential pair returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenPairResponse {
    access: String,
    refresh: String,
}

/// Refresh endpoint response; `refresh` is only present when the server
/// rotates refresh tokens.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// What the pre-send stage needs to know about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Access token to attach, if any
    pub access_token: Option<String>,
    /// Whether a refresh could recover from a 401
    pub can_refresh: bool,
    /// Language to attach
    pub language: Language,
}

impl SessionView {
    /// A view carrying no credentials.
    #[must_use]
    pub const fn anonymous(language: Language) -> Self {
        Self {
            access_token: None,
            can_refresh: false,
            language,
        }
    }
}

/// The single active session of this client process.
pub struct Session {
    http: Arc<dyn HttpClient>,
    locale: Arc<dyn LocaleSource>,
    endpoints: AuthEndpoints,
    credentials: CredentialStore,
    user: RwLock<Option<UserProfile>>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    ready: AtomicBool,
    bootstrap: OnceCell<()>,
    gate: RefreshGate,
}

impl Session {
    /// Creates a session, loading any persisted credentials.
    ///
    /// Nothing is sent until [`Session::initialize`] or [`Session::login`].
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn KeyValueStorage>,
        locale: Arc<dyn LocaleSource>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            locale,
            endpoints: AuthEndpoints::default(),
            credentials: CredentialStore::load(storage),
            user: RwLock::new(None),
            state,
            events,
            ready: AtomicBool::new(false),
            bootstrap: OnceCell::new(),
            gate: RefreshGate::new(),
        }
    }

    /// Overrides the endpoint paths.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    // ----- read side -------------------------------------------------------

    /// Returns true once startup bootstrap has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns true if both an access token and a profile are loaded.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user.read().is_some() && self.credentials.access_token().is_some()
    }

    /// Returns the loaded profile.
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.user.read().clone()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Read-only access to the credential store.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The gate serializing refreshes.
    #[must_use]
    pub const fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    /// The transport used for every call.
    #[must_use]
    pub fn http(&self) -> &dyn HttpClient {
        self.http.as_ref()
    }

    /// Snapshot for the pre-send stage.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let pair = self.credentials.get();
        SessionView {
            can_refresh: pair.can_refresh(),
            access_token: pair.access_token,
            language: self.locale.current(),
        }
    }

    fn anonymous_view(&self) -> SessionView {
        SessionView::anonymous(self.locale.current())
    }

    // ----- operations ------------------------------------------------------

    /// Restores the persisted session once per process.
    ///
    /// Concurrent and repeated calls wait for the same run. Whatever the
    /// outcome, the session is ready afterwards.
    pub async fn initialize(&self) {
        self.bootstrap
            .get_or_init(|| async {
                self.restore().await;
                self.ready.store(true, Ordering::Release);
                tracing::info!(logged_in = self.is_logged_in(), "session ready");
            })
            .await;
    }

    async fn restore(&self) {
        let pair = self.credentials.get();
        if pair.is_empty() {
            tracing::debug!("no stored credentials");
            return;
        }

        self.set_state(SessionState::Authenticating);
        let restored = if pair.has_identity_material() {
            match self.fetch_user().await {
                Ok(user) => Ok(user),
                Err(e) if pair.can_refresh() => {
                    tracing::debug!(error = %e, "stored access token unusable, refreshing");
                    self.refresh_then_fetch().await
                }
                Err(e) => Err(e),
            }
        } else {
            self.refresh_then_fetch().await
        };

        match restored {
            Ok(user) => self.enter_authenticated(&user),
            Err(e) => {
                tracing::warn!(error = %e, "could not restore session");
                self.end_session(LogoutReason::BootstrapFailed);
            }
        }
    }

    async fn refresh_then_fetch(&self) -> SessionResult<UserProfile> {
        self.refresh().await?;
        self.fetch_user().await
    }

    /// Exchanges identifier/secret for credentials and loads the profile.
    ///
    /// # Errors
    ///
    /// A rejected login leaves credentials untouched and returns
    /// `CredentialsInvalid`. If the profile cannot be loaded afterwards the
    /// session is logged out and that error is returned.
    pub async fn login(&self, identifier: &str, secret: &str) -> SessionResult<UserProfile> {
        let previous = self.set_state(SessionState::Authenticating);

        let pair = match self.obtain_token_pair(identifier, secret).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::info!(error = %e, username = identifier, "login rejected");
                self.set_state(previous);
                return Err(e);
            }
        };

        self.store(pair);
        match self.fetch_user().await {
            Ok(user) => {
                self.enter_authenticated(&user);
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile unavailable after login");
                self.end_session(LogoutReason::ProfileUnavailable);
                Err(e)
            }
        }
    }

    async fn obtain_token_pair(&self, identifier: &str, secret: &str) -> SessionResult<CredentialPair> {
        let request = ApiRequest::post(&self.endpoints.token)
            .with_body(json!({ "username": identifier, "password": secret }));
        let response = self.call(request, &self.anonymous_view()).await?;

        match response.status {
            _ if response.is_success() => {
                let tokens: TokenPairResponse = decode(&response)?;
                Ok(CredentialPair::new(tokens.access, tokens.refresh))
            }
            400 | 401 => Err(SessionError::CredentialsInvalid {
                message: response.error_message(),
            }),
            status => Err(SessionError::UnexpectedStatus {
                status,
                message: response.error_message(),
            }),
        }
    }

    /// Loads the profile of the current access token and stores it.
    ///
    /// # Errors
    ///
    /// Returns `SessionExpired` if there is no access token or it is
    /// rejected. Session state is not changed on failure.
    pub async fn fetch_user(&self) -> SessionResult<UserProfile> {
        let view = self.view();
        if view.access_token.is_none() {
            return Err(SessionError::SessionExpired);
        }

        let response = self.call(ApiRequest::get(&self.endpoints.me), &view).await?;
        if response.is_unauthorized() {
            return Err(SessionError::SessionExpired);
        }
        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus {
                status: response.status,
                message: response.error_message(),
            });
        }

        let user: UserProfile = decode(&response)?;
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    /// Creates an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Validation failures come back as `CredentialsInvalid` carrying the
    /// server's field messages.
    pub async fn register(&self, registration: &Registration) -> SessionResult<serde_json::Value> {
        let mut body = json!({
            "username": registration.username,
            "email": registration.email,
            "password": registration.password,
        });
        for (field, value) in [
            ("first_name", &registration.first_name),
            ("last_name", &registration.last_name),
        ] {
            if !value.is_empty() {
                body[field] = json!(value);
            }
        }

        let request = ApiRequest::post(&self.endpoints.register).with_body(body);
        let response = self.call(request, &self.anonymous_view()).await?;
        match response.status {
            _ if response.is_success() => {
                tracing::info!(username = %registration.username, "account registered");
                if response.body.is_empty() {
                    Ok(serde_json::Value::Null)
                } else {
                    decode(&response)
                }
            }
            400 => Err(SessionError::CredentialsInvalid {
                message: response.error_message(),
            }),
            status => Err(SessionError::UnexpectedStatus {
                status,
                message: response.error_message(),
            }),
        }
    }

    /// Clears credentials and profile. Local only: the server is not called.
    pub fn logout(&self) {
        self.end_session(LogoutReason::UserRequested);
    }

    /// Ends the session after a 401 that no refresh can recover.
    pub(crate) fn expire(&self) {
        self.end_session(LogoutReason::SessionExpired);
    }

    /// Obtains a new access token.
    ///
    /// Goes through the refresh gate: concurrent callers share one call to
    /// the refresh endpoint and all receive its outcome.
    ///
    /// # Errors
    ///
    /// Any failure logs the session out. A rejected refresh token returns
    /// `RefreshFailed`, a transport failure `NetworkUnavailable`.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.gate.run(|| self.refresh_once()).await
    }

    async fn refresh_once(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            self.end_session(LogoutReason::SessionExpired);
            return Err(SessionError::SessionExpired);
        };

        let entered = self.transition(SessionState::Authenticated, SessionState::Refreshing);
        let result = self.exchange_refresh_token(&refresh_token).await;

        if self.credentials.refresh_token().as_deref() != Some(refresh_token.as_str()) {
            // Logged out or logged in again while the call was in flight.
            return Err(SessionError::RefreshFailed {
                message: "session changed during refresh".to_string(),
            });
        }

        match result {
            Ok(RefreshResponse { access, refresh }) => {
                let rotated = refresh.as_deref().is_some_and(|r| !r.is_empty());
                let pair = self.credentials.get().refreshed(access.clone(), refresh);
                self.store(pair);
                if entered {
                    self.set_state(SessionState::Authenticated);
                }
                tracing::info!(rotated, "access token refreshed");
                self.emit(SessionEvent::Refreshed { rotated });
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed, logging out");
                self.end_session(LogoutReason::RefreshFailed);
                Err(e)
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> SessionResult<RefreshResponse> {
        let request =
            ApiRequest::post(&self.endpoints.refresh).with_body(json!({ "refresh": refresh_token }));
        let response = self.call(request, &self.anonymous_view()).await?;

        if response.is_success() {
            decode(&response)
        } else {
            Err(SessionError::RefreshFailed {
                message: response.error_message(),
            })
        }
    }

    // ----- internals -------------------------------------------------------

    async fn call(&self, request: ApiRequest, view: &SessionView) -> SessionResult<ApiResponse> {
        let request = pre_send(request, view);
        Ok(self.http.send(&request).await?)
    }

    fn store(&self, pair: CredentialPair) {
        if let Err(e) = self.credentials.set(pair) {
            tracing::warn!(error = %e, "could not persist credentials");
        }
    }

    fn enter_authenticated(&self, user: &UserProfile) {
        self.set_state(SessionState::Authenticated);
        tracing::info!(username = %user.username, "logged in");
        self.emit(SessionEvent::LoggedIn {
            username: user.username.clone(),
        });
    }

    fn end_session(&self, reason: LogoutReason) {
        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "could not clear persisted credentials");
        }
        *self.user.write() = None;

        let previous = self.set_state(SessionState::Unauthenticated);
        if previous != SessionState::Unauthenticated {
            tracing::info!(?reason, "logged out");
            self.emit(SessionEvent::LoggedOut { reason });
        }
    }

    fn set_state(&self, next: SessionState) -> SessionState {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "session state");
        }
        previous
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &ApiResponse) -> SessionResult<T> {
    response
        .json()
        .map_err(|e| SessionError::InvalidResponse(e.to_string()))
}
