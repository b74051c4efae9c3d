//! HTTP Request domain types

mod header;
mod method;
mod spec;

pub use header::{ACCEPT_LANGUAGE, AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use spec::ApiRequest;
