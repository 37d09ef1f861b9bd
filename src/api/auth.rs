//! Session and authentication-failure management
//!
//! [`AuthManager`] owns the session tokens and the failure streak for one
//! client instance. Every authenticated exchange is gated by its backoff
//! window: once `max_auth_failures` consecutive failures have been counted,
//! login attempts are refused locally until the window closes.

use crate::api::transport::HttpTransport;
use crate::error::{Result, ShadesError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LOGIN_PATH: &str = "/auth/jwt/";
pub const REFRESH_PATH: &str = "/auth/jwt/refresh/";

/// Operator-supplied credentials
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Long-lived static token, used as the bearer directly
    ApiToken(String),
    /// Account credentials exchanged for a JWT pair
    Password { email: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(***)"),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Failure threshold and window sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_auth_failures: u32,
    pub auth_failure_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_auth_failures: 3,
            auth_failure_backoff_ms: 60_000,
            max_backoff_ms: 3_600_000,
        }
    }
}

impl BackoffPolicy {
    /// Window opened after `failures` consecutive failures, if any
    pub fn window_ms(&self, failures: u32) -> Option<u64> {
        if failures < self.max_auth_failures {
            return None;
        }
        let exponent = failures - self.max_auth_failures;
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        Some(
            self.auth_failure_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Failure streak and the end of the current window (epoch ms, 0 = none)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    pub consecutive_failures: u32,
    pub next_retry_at_ms: i64,
}

impl BackoffState {
    /// Count one failure; returns the window opened, if the threshold is reached
    pub fn record_failure(&mut self, policy: &BackoffPolicy, now_ms: i64) -> Option<u64> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let window = policy.window_ms(self.consecutive_failures)?;
        self.next_retry_at_ms = now_ms.saturating_add(i64::try_from(window).unwrap_or(i64::MAX));
        Some(window)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Milliseconds left in the window, `None` when attempts are allowed
    pub fn remaining_ms(&self, now_ms: i64) -> Option<u64> {
        (now_ms < self.next_retry_at_ms)
            .then(|| u64::try_from(self.next_retry_at_ms - now_ms).unwrap_or(u64::MAX))
    }
}

/// Tokens and the sticky base URL
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub active_base: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |t: &Option<String>| t.as_ref().map(|_| "***");
        f.debug_struct("Session")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("active_base", &self.active_base)
            .finish()
    }
}

/// Base URL as given plus its `/api`-toggled variant, deduplicated
pub fn base_url_candidates(base_url: &str) -> Vec<String> {
    let base = base_url.trim().trim_end_matches('/').to_string();
    let alternate = match base.strip_suffix("/api") {
        Some(stripped) => stripped.to_string(),
        None => format!("{base}/api"),
    };

    let mut candidates = vec![base];
    if !alternate.is_empty() && !candidates.contains(&alternate) {
        candidates.push(alternate);
    }
    candidates
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Default)]
struct AuthState {
    session: Session,
    backoff: BackoffState,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: Option<String>,
    refresh: Option<String>,
}

fn parse_tokens(body: &str) -> Option<(String, Option<String>)> {
    let parsed: TokenResponse = serde_json::from_str(body).ok()?;
    let access = parsed.access.filter(|t| !t.is_empty())?;
    Some((access, parsed.refresh.filter(|t| !t.is_empty())))
}

/// Session holder and failure gate for one client instance
#[derive(Debug)]
pub struct AuthManager {
    credentials: Credentials,
    candidates: Vec<String>,
    policy: BackoffPolicy,
    transport: Arc<HttpTransport>,
    state: Mutex<AuthState>,
    logger: StructuredLogger,
}

impl AuthManager {
    pub fn new(
        credentials: Credentials,
        base_url: &str,
        policy: BackoffPolicy,
        transport: Arc<HttpTransport>,
    ) -> Self {
        let mut state = AuthState::default();
        if let Credentials::ApiToken(token) = &credentials {
            state.session.access_token = Some(token.clone());
        }
        Self {
            credentials,
            candidates: base_url_candidates(base_url),
            policy,
            transport,
            state: Mutex::new(state),
            logger: get_logger("auth"),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn uses_static_token(&self) -> bool {
        matches!(self.credentials, Credentials::ApiToken(_))
    }

    fn static_token(&self) -> Option<String> {
        match &self.credentials {
            Credentials::ApiToken(token) => Some(token.clone()),
            Credentials::Password { .. } => None,
        }
    }

    fn primary_base(&self) -> String {
        self.candidates.first().cloned().unwrap_or_default()
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.state.lock().await.session.clone()
    }

    /// Snapshot of the failure streak
    pub async fn backoff(&self) -> BackoffState {
        self.state.lock().await.backoff
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.session.access_token.clone()
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.state.lock().await.session.refresh_token.is_some()
    }

    pub async fn clear_access_token(&self) {
        self.state.lock().await.session.access_token = None;
    }

    /// Base URL for the next call: the last one that worked, else the primary
    pub async fn base_url(&self) -> String {
        let state = self.state.lock().await;
        state
            .session
            .active_base
            .clone()
            .unwrap_or_else(|| self.primary_base())
    }

    /// Establish a session.
    ///
    /// Refused without any network traffic while a backoff window is open.
    /// With a static token this only pins the primary base URL; otherwise each
    /// candidate is tried in order and the first response carrying an access
    /// token wins. A missing refresh token leaves re-login as the 401 path.
    pub async fn login(&self) -> Result<()> {
        if let Some(remaining) = self.state.lock().await.backoff.remaining_ms(now_ms()) {
            self.logger.warn(&format!(
                "Login suppressed, auth backoff active for another {} ms",
                remaining
            ));
            return Err(ShadesError::AuthBackoffActive {
                retry_in_ms: remaining,
            });
        }

        let (email, password) = match &self.credentials {
            Credentials::ApiToken(token) => {
                let mut state = self.state.lock().await;
                state.session.access_token = Some(token.clone());
                state.session.refresh_token = None;
                state.session.active_base = Some(self.primary_base());
                state.backoff.reset();
                self.logger.debug("Using static API token");
                return Ok(());
            }
            Credentials::Password { email, password } => (email, password),
        };

        let body = json!({ "email": email, "password": password });
        let mut last_error = "no base URL candidates".to_string();

        for base in &self.candidates {
            let url = format!("{base}{LOGIN_PATH}");
            match self.transport.send(Method::POST, &url, None, Some(&body)).await {
                Ok(resp) if resp.status.is_success() => match parse_tokens(&resp.body) {
                    Some((access, refresh)) => {
                        let mut state = self.state.lock().await;
                        state.session.access_token = Some(access);
                        state.session.refresh_token = refresh;
                        state.session.active_base = Some(base.clone());
                        state.backoff.reset();
                        self.logger.info(&format!("Logged in via {}", base));
                        return Ok(());
                    }
                    None => last_error = format!("{url}: malformed token response"),
                },
                Ok(resp) => last_error = format!("{url}: HTTP {}", resp.status.as_u16()),
                Err(e) => last_error = format!("{url}: {e}"),
            }
            self.logger.debug(&format!("Login candidate failed: {}", last_error));
        }

        self.handle_auth_failure().await;
        self.logger.error(&format!("Login failed: {}", last_error));
        Err(ShadesError::login_failed(last_error))
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On failure the refresh token is dropped, the access token falls back to
    /// the static token (if any) and the failure is counted.
    pub async fn refresh_tokens(&self) -> Result<()> {
        let (refresh, base) = {
            let state = self.state.lock().await;
            let refresh = state
                .session
                .refresh_token
                .clone()
                .ok_or(ShadesError::MissingRefreshToken)?;
            let base = state
                .session
                .active_base
                .clone()
                .unwrap_or_else(|| self.primary_base());
            (refresh, base)
        };

        let url = format!("{base}{REFRESH_PATH}");
        let body = json!({ "refresh": refresh });
        let outcome = match self.transport.send(Method::POST, &url, None, Some(&body)).await {
            Ok(resp) if resp.status.is_success() => {
                parse_tokens(&resp.body).ok_or_else(|| "malformed refresh response".to_string())
            }
            Ok(resp) => Err(format!("HTTP {}: {}", resp.status.as_u16(), resp.body)),
            Err(e) => Err(e.to_string()),
        };

        let mut state = self.state.lock().await;
        match outcome {
            Ok((access, rotated)) => {
                state.session.access_token = Some(access);
                if let Some(refresh) = rotated {
                    state.session.refresh_token = Some(refresh);
                }
                state.backoff.reset();
                self.logger.debug("Access token refreshed");
                Ok(())
            }
            Err(message) => {
                state.session.refresh_token = None;
                state.session.access_token = self.static_token();
                let window = state.backoff.record_failure(&self.policy, now_ms());
                self.log_failure(state.backoff.consecutive_failures, window);
                Err(ShadesError::token_refresh_failed(message))
            }
        }
    }

    /// Count an authentication failure and open a window past the threshold
    pub async fn handle_auth_failure(&self) -> Option<u64> {
        let mut state = self.state.lock().await;
        let window = state.backoff.record_failure(&self.policy, now_ms());
        self.log_failure(state.backoff.consecutive_failures, window);
        window
    }

    fn log_failure(&self, failures: u32, window: Option<u64>) {
        match window {
            Some(ms) => self.logger.warn(&format!(
                "Authentication failure #{}; refusing new attempts for {} ms",
                failures, ms
            )),
            None => self.logger.warn(&format!(
                "Authentication failure #{} (backoff starts at {})",
                failures, self.policy.max_auth_failures
            )),
        }
    }
}
