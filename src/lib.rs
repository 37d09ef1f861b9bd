//! # PowerShades - cloud bridge for PowerShades motorized shades
//!
//! Talks to the PowerShades cloud API on behalf of a home-automation
//! consumer: it keeps an authenticated session alive, exposes shades and
//! shade groups with their positions, and polls for position changes at a
//! cadence that speeds up right after a user moves something.
//!
//! ## Features
//!
//! - **Session handling**: static API token or email/password JWT login with
//!   refresh, retry-once on `401`, and exponential backoff on repeated
//!   authentication failures
//! - **Base URL fallback**: the configured base and its `/api` variant
//! - **Caching**: TTL-bound shade and group lists
//! - **Adaptive polling**: fast cadence after writes, idle cadence otherwise
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `api`: HTTP transport, session/backoff manager and typed API client
//! - `platform`: Caches, accessory registry and the poll scheduler

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used types
pub use api::ApiClient;
pub use config::Config;
pub use error::{Result, ShadesError};
pub use platform::ShadesPlatform;
