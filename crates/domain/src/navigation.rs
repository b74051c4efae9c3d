//! Navigation targets and guard decisions.

use url::form_urlencoded;

/// Path of the login entry point.
pub const LOGIN_PATH: &str = "/auth/login";

/// Path of the landing page for logged-in users.
pub const DASHBOARD_PATH: &str = "/";

/// A destination the user is trying to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// Route name, if the route table knows it
    pub name: Option<String>,
    /// Full path including any query string
    pub full_path: String,
    /// Whether the route needs an authenticated session
    pub requires_auth: bool,
    /// Page title
    pub title: Option<String>,
}

impl RouteTarget {
    /// Creates a protected route target.
    #[must_use]
    pub fn protected(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            full_path: full_path.into(),
            requires_auth: true,
            title: None,
        }
    }

    /// Creates a public route target.
    #[must_use]
    pub fn public(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            full_path: full_path.into(),
            requires_auth: false,
            title: None,
        }
    }

    /// Sets the page title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns true if this is the login page.
    #[must_use]
    pub fn is_login(&self) -> bool {
        self.name.as_deref() == Some("login")
            || self.path_only() == LOGIN_PATH
            || self.path_only() == "/login"
    }

    /// Returns the path without its query string.
    #[must_use]
    pub fn path_only(&self) -> &str {
        self.full_path
            .split_once('?')
            .map_or(self.full_path.as_str(), |(path, _)| path)
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Continue to the requested route.
    Proceed,
    /// Go somewhere else instead.
    Redirect {
        /// Destination path
        path: String,
        /// Originally requested path, restored after login
        next: Option<String>,
    },
}

impl Navigation {
    /// Redirect to the login page, remembering where the user was going.
    #[must_use]
    pub fn to_login(next: impl Into<String>) -> Self {
        Self::Redirect {
            path: LOGIN_PATH.to_string(),
            next: Some(next.into()),
        }
    }

    /// Redirect to the dashboard.
    #[must_use]
    pub fn to_dashboard() -> Self {
        Self::Redirect {
            path: DASHBOARD_PATH.to_string(),
            next: None,
        }
    }

    /// Returns the location to navigate to, with `next` query-encoded.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Proceed => None,
            Self::Redirect { path, next: None } => Some(path.clone()),
            Self::Redirect {
                path,
                next: Some(next),
            } => {
                let query: String = form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", next)
                    .finish();
                Some(format!("{path}?{query}"))
            }
        }
    }
}
