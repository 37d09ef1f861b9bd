//! Thin HTTP executor over a pooled `reqwest::Client`
//!
//! Connections are kept alive and reused; a semaphore bounds the number of
//! requests in flight at once.

use crate::config::HttpConfig;
use crate::error::{Result, ShadesError};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const USER_AGENT: &str = concat!("powershades/", env!("CARGO_PKG_VERSION"));

/// Status and raw body of a completed exchange
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Shared request executor
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    permits: Arc<Semaphore>,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(config.max_free_sockets)
            .tcp_keepalive(Duration::from_secs(config.keep_alive_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_sockets.max(1))),
        })
    }

    /// Execute one request; non-success statuses are returned, not raised
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<HttpResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ShadesError::network("HTTP transport closed"))?;

        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
