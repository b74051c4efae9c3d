//! Construction Manager Domain - Core session types
//!
//! This crate defines the domain model for the authenticated API session.
//! All types here are pure Rust with no I/O dependencies.

pub mod credentials;
pub mod error;
pub mod locale;
pub mod navigation;
pub mod request;
pub mod response;
pub mod session;
pub mod user;

pub use credentials::{CredentialPair, bearer, token_preview};
pub use error::{DomainError, DomainResult};
pub use locale::{DEFAULT_LANGUAGE, Language};
pub use navigation::{DASHBOARD_PATH, LOGIN_PATH, Navigation, RouteTarget};
pub use request::{ACCEPT_LANGUAGE, AUTHORIZATION, ApiRequest, Header, Headers, HttpMethod};
pub use response::{ApiResponse, STATUS_UNAUTHORIZED};
pub use session::{LogoutReason, SessionEvent, SessionState};
pub use user::{Registration, UserProfile};
