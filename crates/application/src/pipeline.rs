//! Request pipeline.
//!
//! Every API call goes through two pure stages around the transport:
//! [`pre_send`] attaches the bearer token and language, [`post_receive`]
//! decides what a response means for the session. [`RequestPipeline`]
//! wires them to the session so that a 401 triggers at most one gated
//! refresh and one replay per request.

use std::sync::Arc;

use cm_domain::{ACCEPT_LANGUAGE, AUTHORIZATION, ApiRequest, ApiResponse, HttpMethod, bearer};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult, SessionError};
use crate::session::{Session, SessionView};

/// Why a 401 cannot be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The request was already replayed once.
    AlreadyRetried,
    /// There is no refresh token to recover with.
    NoRefreshToken,
}

/// What to do with a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Hand the response to the caller.
    Deliver(ApiResponse),
    /// Refresh the access token and replay the request.
    Refresh(ApiResponse),
    /// The 401 is final.
    Reject {
        /// The 401 response
        response: ApiResponse,
        /// Why no refresh is attempted
        reason: RejectReason,
    },
}

/// Attaches the current access token and language to an outbound request.
///
/// Headers already present are overwritten, so a replayed request carries
/// the token current at replay time.
#[must_use]
pub fn pre_send(mut request: ApiRequest, view: &SessionView) -> ApiRequest {
    request.headers.set(ACCEPT_LANGUAGE, view.language.as_str());
    match &view.access_token {
        Some(token) => request.headers.set(AUTHORIZATION, bearer(token)),
        None => {
            request.headers.remove(AUTHORIZATION);
        }
    }
    request
}

/// Classifies a response.
///
/// Only a 401 on a request that has not been replayed, with a refresh token
/// available, asks for a refresh.
#[must_use]
pub fn post_receive(response: ApiResponse, request: &ApiRequest, view: &SessionView) -> Directive {
    if !response.is_unauthorized() {
        Directive::Deliver(response)
    } else if request.is_retried() {
        Directive::Reject {
            response,
            reason: RejectReason::AlreadyRetried,
        }
    } else if !view.can_refresh {
        Directive::Reject {
            response,
            reason: RejectReason::NoRefreshToken,
        }
    } else {
        Directive::Refresh(response)
    }
}

/// Sends authenticated API requests on behalf of the UI.
#[derive(Clone)]
pub struct RequestPipeline {
    session: Arc<Session>,
}

impl RequestPipeline {
    /// Creates a pipeline bound to a session.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The session this pipeline authenticates with.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Sends a request, recovering from one expired access token.
    ///
    /// Non-401 responses are returned as-is whatever their status.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when a 401 cannot be recovered, `Network` when no
    /// response was received, `InvalidRequest` for malformed paths.
    #[tracing::instrument(
        name = "api_request",
        skip_all,
        fields(request_id = %request.id, method = %request.method, path = %request.path)
    )]
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        request.validate()?;

        let view = self.session.view();
        let request = pre_send(request, &view);
        let response = self.session.http().send(&request).await?;
        tracing::debug!(status = response.status, "response received");

        match post_receive(response, &request, &view) {
            Directive::Deliver(response) => Ok(response),
            Directive::Reject { response, reason } => {
                Err(self.reject(response, reason, view.access_token.as_deref()))
            }
            Directive::Refresh(response) => self.refresh_and_replay(request, response).await,
        }
    }

    async fn refresh_and_replay(
        &self,
        mut request: ApiRequest,
        unauthorized: ApiResponse,
    ) -> ApiResult<ApiResponse> {
        request.mark_retried();
        tracing::debug!("access token rejected, refreshing");

        let access = match self.session.refresh().await {
            Ok(access) => access,
            Err(cause) => {
                return Err(ApiError::Unauthorized {
                    response: Box::new(unauthorized),
                    session_ended: !self.session.is_logged_in(),
                    cause: Some(cause),
                });
            }
        };

        request.headers.set(AUTHORIZATION, bearer(&access));
        let response = self.session.http().send(&request).await?;
        tracing::debug!(status = response.status, "replayed after refresh");

        if response.is_unauthorized() {
            Err(self.reject(response, RejectReason::AlreadyRetried, Some(&access)))
        } else {
            Ok(response)
        }
    }

    fn reject(
        &self,
        response: ApiResponse,
        reason: RejectReason,
        sent_with: Option<&str>,
    ) -> ApiError {
        let cause = match reason {
            RejectReason::AlreadyRetried => {
                tracing::debug!("401 after replay, giving up");
                None
            }
            RejectReason::NoRefreshToken
                if self.session.credentials().access_token().as_deref() != sent_with =>
            {
                // A login landed while the request was in flight.
                tracing::debug!("401 for a superseded session, keeping current credentials");
                None
            }
            RejectReason::NoRefreshToken => {
                self.session.expire();
                Some(SessionError::SessionExpired)
            }
        };
        ApiError::Unauthorized {
            response: Box::new(response),
            session_ended: !self.session.is_logged_in(),
            cause,
        }
    }

    /// Sends a request and decodes a successful JSON response.
    ///
    /// # Errors
    ///
    /// As [`RequestPipeline::send`], plus `Status` for non-2xx responses and
    /// `Decode` for bodies that do not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                message: response.error_message(),
            });
        }
        response.json().map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GETs a path and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::send_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_json(ApiRequest::new(HttpMethod::Get, path)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::test_support::{FakeAuthServer, MemoryStorage, PROTECTED_PATH, session_with};
    use cm_domain::{Language, LogoutReason, SessionEvent};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn view(access: Option<&str>, can_refresh: bool) -> SessionView {
        SessionView {
            access_token: access.map(str::to_string),
            can_refresh,
            language: Language::default(),
        }
    }

    async fn logged_in(server: &Arc<FakeAuthServer>) -> (RequestPipeline, Arc<MemoryStorage>) {
        let storage = MemoryStorage::new();
        let session = session_with(server, &storage);
        session.login("alice", "pw").await.unwrap();
        (RequestPipeline::new(session), storage)
    }

    // ----- pure stages -----------------------------------------------------

    #[test]
    fn pre_send_attaches_bearer_and_language() {
        let request = pre_send(ApiRequest::get("cm/companies/"), &view(Some("A1"), true));

        assert_eq!(request.headers.get(AUTHORIZATION), Some("Bearer A1"));
        assert_eq!(request.headers.get(ACCEPT_LANGUAGE), Some("pl"));
    }

    #[test]
    fn pre_send_without_token_sends_no_authorization() {
        let stale = ApiRequest::get("cm/companies/").with_header(AUTHORIZATION, "Bearer old");
        let request = pre_send(stale, &view(None, false));

        assert_eq!(request.headers.get(AUTHORIZATION), None);
        assert_eq!(request.headers.get(ACCEPT_LANGUAGE), Some("pl"));
    }

    #[test]
    fn post_receive_delivers_non_401_untouched() {
        let request = ApiRequest::get("cm/companies/");
        for status in [200, 204, 400, 403, 404, 500] {
            let response = ApiResponse::new(status, "body");
            assert_eq!(
                post_receive(response.clone(), &request, &view(Some("A1"), true)),
                Directive::Deliver(response)
            );
        }
    }

    #[test]
    fn post_receive_classifies_401() {
        let fresh = ApiRequest::get("cm/companies/");
        let mut replayed = fresh.clone();
        replayed.mark_retried();
        let unauthorized = ApiResponse::new(401, "");

        assert_eq!(
            post_receive(unauthorized.clone(), &fresh, &view(Some("A1"), true)),
            Directive::Refresh(unauthorized.clone())
        );
        assert!(matches!(
            post_receive(unauthorized.clone(), &replayed, &view(Some("A1"), true)),
            Directive::Reject {
                reason: RejectReason::AlreadyRetried,
                ..
            }
        ));
        assert!(matches!(
            post_receive(unauthorized, &fresh, &view(Some("A1"), false)),
            Directive::Reject {
                reason: RejectReason::NoRefreshToken,
                ..
            }
        ));
    }

    // ----- pipeline --------------------------------------------------------

    #[tokio::test]
    async fn authorized_request_is_delivered() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;

        let response = pipeline.send(ApiRequest::get(PROTECTED_PATH)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(server.refresh_calls(), 0);
        let sent = server.requests_to(PROTECTED_PATH);
        assert_eq!(sent[0].authorization.as_deref(), Some("Bearer A1"));
    }

    #[tokio::test]
    async fn non_401_errors_are_not_refreshed() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;

        let response = pipeline.send(ApiRequest::get("cm/missing/")).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(server.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_replayed() {
        let server = FakeAuthServer::new();
        let (pipeline, storage) = logged_in(&server).await;
        server.expire_access();

        let response = pipeline.send(ApiRequest::get(PROTECTED_PATH)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(server.refresh_calls(), 1);
        assert_eq!(storage.value(ACCESS_TOKEN_KEY).as_deref(), Some("A2"));
        let sent = server.requests_to(PROTECTED_PATH);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].authorization.as_deref(), Some("Bearer A2"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_401s_share_one_refresh() {
        let server = FakeAuthServer::new();
        server.set_refresh_delay(Duration::from_millis(200));
        let (pipeline, _) = logged_in(&server).await;
        server.expire_access();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.send(ApiRequest::get(PROTECTED_PATH)).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, 200);
        }
        assert_eq!(server.refresh_calls(), 1);
        let replays: Vec<_> = server
            .requests_to(PROTECTED_PATH)
            .into_iter()
            .filter(|r| r.authorization.as_deref() == Some("Bearer A2"))
            .collect();
        assert_eq!(replays.len(), 3);
        assert!(!pipeline.session().gate().is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_401s_all_fail_when_refresh_is_rejected() {
        let server = FakeAuthServer::new();
        server.set_refresh_delay(Duration::from_millis(200));
        let (pipeline, storage) = logged_in(&server).await;
        server.expire_access();
        server.revoke_refresh("R1");
        let mut events = pipeline.session().subscribe();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.send(ApiRequest::get(PROTECTED_PATH)).await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.session_ended(), "{err}");
            assert!(matches!(
                err,
                ApiError::Unauthorized {
                    cause: Some(SessionError::RefreshFailed { .. }),
                    ..
                }
            ));
        }
        assert_eq!(server.refresh_calls(), 1);
        assert_eq!(storage.value(ACCESS_TOKEN_KEY), None);
        assert_eq!(storage.value(REFRESH_TOKEN_KEY), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed
            }
        );
        assert!(events.try_recv().is_err(), "logged out exactly once");
    }

    #[tokio::test]
    async fn second_401_after_replay_does_not_loop() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;
        server.expire_access();

        let err = pipeline
            .send(ApiRequest::get(FakeAuthServer::FORBIDDEN_PATH))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { cause: None, .. }));
        assert!(!err.session_ended());
        assert_eq!(server.refresh_calls(), 1);
        assert_eq!(server.requests_to(FakeAuthServer::FORBIDDEN_PATH).len(), 2);
        assert!(pipeline.session().is_logged_in());
    }

    #[tokio::test]
    async fn unauthorized_without_refresh_token_logs_out() {
        let server = FakeAuthServer::new();
        let storage = MemoryStorage::with(&[(ACCESS_TOKEN_KEY, "stale")]);
        let pipeline = RequestPipeline::new(session_with(&server, &storage));

        let err = pipeline.send(ApiRequest::get(PROTECTED_PATH)).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Unauthorized {
                cause: Some(SessionError::SessionExpired),
                session_ended: true,
                ..
            }
        ));
        assert_eq!(server.refresh_calls(), 0);
        assert_eq!(storage.value(ACCESS_TOKEN_KEY), None);
    }

    #[tokio::test]
    async fn refresh_network_failure_logs_out() {
        let server = FakeAuthServer::new();
        let (pipeline, storage) = logged_in(&server).await;
        server.expire_access();
        server.fail_refresh_transport(true);

        let err = pipeline.send(ApiRequest::get(PROTECTED_PATH)).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Unauthorized {
                cause: Some(SessionError::NetworkUnavailable(_)),
                session_ended: true,
                ..
            }
        ));
        assert!(!pipeline.session().is_logged_in());
        assert_eq!(storage.value(ACCESS_TOKEN_KEY), None);
        assert_eq!(storage.value(REFRESH_TOKEN_KEY), None);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_401_does_not_clear_a_login_made_in_flight() {
        let server = FakeAuthServer::new();
        let storage = MemoryStorage::new();
        let session = session_with(&server, &storage);
        let pipeline = RequestPipeline::new(Arc::clone(&session));
        server.set_resource_delay(Duration::from_millis(100));

        let in_flight = tokio::spawn(async move { pipeline.send(ApiRequest::get(PROTECTED_PATH)).await });
        tokio::task::yield_now().await;
        session.login("alice", "pw").await.unwrap();

        let err = in_flight.await.unwrap().unwrap_err();

        assert!(matches!(
            err,
            ApiError::Unauthorized {
                cause: None,
                session_ended: false,
                ..
            }
        ));
        assert!(session.is_logged_in());
        assert_eq!(storage.value(ACCESS_TOKEN_KEY).as_deref(), Some("A1"));
        assert_eq!(storage.value(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_network() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;
        server.set_network_down(true);

        let err = pipeline.send(ApiRequest::get(PROTECTED_PATH)).await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert!(pipeline.session().is_logged_in());
    }

    #[tokio::test]
    async fn absolute_urls_are_rejected_before_sending() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;
        let before = server.total_requests();

        let err = pipeline
            .send(ApiRequest::get("https://elsewhere.example.com/steal"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(server.total_requests(), before);
    }

    #[tokio::test]
    async fn get_json_decodes_success_and_reports_status() {
        let server = FakeAuthServer::new();
        let (pipeline, _) = logged_in(&server).await;

        let body: serde_json::Value = pipeline.get_json(PROTECTED_PATH).await.unwrap();
        assert_eq!(body["path"], PROTECTED_PATH);

        let err = pipeline
            .get_json::<serde_json::Value>("cm/missing/")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }));
    }
}
