use super::*;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            email: None,
            password: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_auth_failures: 3,
            auth_failure_backoff_ms: 60_000,
            max_backoff_ms: 3_600_000,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: 10,
            fast_poll_interval: 1,
            fast_poll_duration: 30,
            shade_list_cache_ttl: 300,
            group_list_cache_ttl: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_sockets: 10,
            max_free_sockets: 5,
            keep_alive_secs: 30,
            request_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/powershades.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            auth: AuthConfig::default(),
            polling: PollingConfig::default(),
            expose_groups: Vec::new(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
