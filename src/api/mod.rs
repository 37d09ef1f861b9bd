//! PowerShades cloud API integration
//!
//! Split into the session/backoff manager, the HTTP transport, the record
//! types and the typed client on top of them.

pub mod auth;
pub mod client;
pub mod transport;
pub mod types;

pub use auth::{AuthManager, BackoffPolicy, BackoffState, Credentials, Session, base_url_candidates};
pub use client::ApiClient;
pub use transport::{HttpResponse, HttpTransport};
pub use types::{EntityId, Group, Scene, Schedule, Shade};
