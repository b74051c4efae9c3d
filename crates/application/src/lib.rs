//! Construction Manager session core - use cases and ports
//!
//! This crate defines the authenticated API session with:
//! - Port traits (transport, durable storage, locale)
//! - The credential store and refresh gate
//! - The session coordinator, request pipeline and route guard

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod guard;
pub mod language;
pub mod pipeline;
pub mod ports;
pub mod refresh_gate;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use credentials::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY};
pub use endpoints::AuthEndpoints;
pub use error::{ApiError, ApiResult, SessionError, SessionResult};
pub use guard::RouteGuard;
pub use language::{LANGUAGE_KEY, LanguageError, LanguageStore};
pub use pipeline::{Directive, RejectReason, RequestPipeline, post_receive, pre_send};
pub use ports::{
    FixedLocale, HttpClient, HttpClientError, KeyValueStorage, LocaleSource, StorageEntry,
    StorageError,
};
pub use refresh_gate::{GateTicket, LeaderGuard, RefreshGate, RefreshOutcome, Waiter};
pub use session::{Session, SessionView};
