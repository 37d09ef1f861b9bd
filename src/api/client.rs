//! Authenticated client for the PowerShades cloud API

use crate::api::auth::{AuthManager, BackoffPolicy, Credentials};
use crate::api::transport::HttpTransport;
use crate::api::types::{
    EntityId, Group, Scene, Schedule, Shade, clamp_percentage, list_items, normalize_list,
};
use crate::config::{Config, HttpConfig};
use crate::error::{Result, ShadesError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Issues requests against the active base URL with session handling.
///
/// A `401` is retried exactly once per call, after refreshing the access
/// token or logging in again, depending on the credentials in use.
#[derive(Debug)]
pub struct ApiClient {
    auth: AuthManager,
    transport: Arc<HttpTransport>,
    logger: StructuredLogger,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_parts(
            config.credentials()?,
            &config.api.base_url,
            config.auth.policy(),
            &config.http,
        )
    }

    pub fn with_parts(
        credentials: Credentials,
        base_url: &str,
        policy: BackoffPolicy,
        http: &HttpConfig,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(http)?);
        let auth = AuthManager::new(credentials, base_url, policy, Arc::clone(&transport));
        Ok(Self {
            auth,
            transport,
            logger: get_logger("client"),
        })
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Perform one API call and decode the body.
    ///
    /// `None` for `204` or an empty body; a body that is not JSON comes back
    /// as a JSON string.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>> {
        let mut may_retry = true;

        loop {
            if self.auth.access_token().await.is_none() {
                self.auth.login().await?;
            }
            let token = self.auth.access_token().await;
            let url = format!("{}{}", self.auth.base_url().await, path);

            let resp = self
                .transport
                .send(method.clone(), &url, token.as_deref(), body.as_ref())
                .await?;

            if resp.status == StatusCode::UNAUTHORIZED {
                if may_retry {
                    may_retry = false;
                    self.recover_session(path, resp.body).await?;
                    continue;
                }
                self.logger.warn(&format!("{} {} still unauthorized after retry", method, path));
                return Err(ShadesError::api(401, path, resp.body));
            }

            if !resp.status.is_success() {
                self.logger.debug(&format!(
                    "{} {} returned HTTP {}",
                    method,
                    path,
                    resp.status.as_u16()
                ));
                return Err(ShadesError::api(resp.status.as_u16(), path, resp.body));
            }

            if resp.status == StatusCode::NO_CONTENT || resp.body.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(
                serde_json::from_str(&resp.body).unwrap_or(Value::String(resp.body)),
            ));
        }
    }

    /// Recovery after a first `401` on `path`
    async fn recover_session(&self, path: &str, body: String) -> Result<()> {
        if self.auth.has_refresh_token().await {
            self.logger.debug(&format!("401 on {}, refreshing access token", path));
            return self.auth.refresh_tokens().await.map_err(|e| match e {
                ShadesError::TokenRefreshFailed { .. } => e,
                other => ShadesError::token_refresh_failed(other.to_string()),
            });
        }

        if !self.auth.uses_static_token() {
            self.logger.debug(&format!("401 on {}, logging in again", path));
            self.auth.clear_access_token().await;
            return self
                .auth
                .login()
                .await
                .map_err(|e| ShadesError::relogin_failed(e.to_string()));
        }

        self.logger.error(&format!("Static API token rejected on {}", path));
        self.auth.handle_auth_failure().await;
        Err(ShadesError::api(401, path, body))
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let body = self.request(Method::GET, path, None).await?;
        let (items, skipped) = normalize_list(body);
        if skipped > 0 {
            self.logger.warn(&format!(
                "Skipped {} malformed record(s) from {}",
                skipped, path
            ));
        }
        Ok(items)
    }

    pub async fn get_shades(&self) -> Result<Vec<Shade>> {
        self.get_list("/shades/").await
    }

    /// Raw attribute records, one per shade
    pub async fn get_shade_attributes(&self) -> Result<Vec<Value>> {
        let body = self.request(Method::GET, "/shadeattributes/", None).await?;
        Ok(list_items(body))
    }

    /// Move a shade, addressed by name, to `percentage` (clamped to 0..=100)
    pub async fn move_shade(&self, shade_name: &str, percentage: i64) -> Result<Option<Value>> {
        let percentage = clamp_percentage(percentage);
        self.logger.info(&format!("Moving shade '{}' to {}%", shade_name, percentage));
        self.request(
            Method::POST,
            "/shades/move/",
            Some(json!({ "shade_name": shade_name, "percentage": percentage })),
        )
        .await
    }

    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        self.get_list("/groups/").await
    }

    /// Move every shade of a group to `percentage` (clamped to 0..=100)
    pub async fn move_group(&self, group_id: &EntityId, percentage: i64) -> Result<Option<Value>> {
        let percentage = clamp_percentage(percentage);
        self.logger.info(&format!("Moving group {} to {}%", group_id, percentage));
        self.request(
            Method::POST,
            &format!("/groups/{}/move/", urlencoding::encode(group_id.as_str())),
            Some(json!({ "percentage": percentage })),
        )
        .await
    }

    pub async fn get_scenes(&self) -> Result<Vec<Scene>> {
        self.get_list("/scenes/").await
    }

    pub async fn get_schedules(&self) -> Result<Vec<Schedule>> {
        self.get_list("/schedules/").await
    }
}
