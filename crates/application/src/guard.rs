//! Route guard.
//!
//! Decides, before each navigation, whether the destination may be shown.
//! Reads session state only; never mutates credentials.

use std::sync::Arc;

use cm_domain::{LOGIN_PATH, LogoutReason, Navigation, RouteTarget};

use crate::session::Session;

/// Navigation gatekeeper bound to a session.
#[derive(Clone)]
pub struct RouteGuard {
    session: Arc<Session>,
}

impl RouteGuard {
    /// Creates a guard for a session.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Checks a navigation to `target`.
    ///
    /// The first check waits for session bootstrap so a restored session is
    /// not bounced to the login page.
    pub async fn check(&self, target: &RouteTarget) -> Navigation {
        if !self.session.is_ready() {
            self.session.initialize().await;
        }

        let logged_in = self.session.is_logged_in();
        let decision = if target.is_login() && logged_in {
            Navigation::to_dashboard()
        } else if target.requires_auth && !logged_in {
            Navigation::to_login(target.full_path.clone())
        } else {
            Navigation::Proceed
        };

        tracing::debug!(path = %target.full_path, logged_in, ?decision, "route checked");
        decision
    }

    /// Where to go after the session ended while `current` was shown.
    ///
    /// Public pages stay put. An involuntary logout remembers the page so
    /// the user can return after logging in again.
    #[must_use]
    pub fn after_logout(&self, current: &RouteTarget, reason: LogoutReason) -> Option<Navigation> {
        if !current.requires_auth || self.session.is_logged_in() {
            return None;
        }
        if reason.is_involuntary() {
            Some(Navigation::to_login(current.full_path.clone()))
        } else {
            Some(Navigation::Redirect {
                path: LOGIN_PATH.to_string(),
                next: None,
            })
        }
    }
}
