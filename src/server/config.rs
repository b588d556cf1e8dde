//! Typed, construct-in-code configuration for the runtime's recognized
//! options. No file format is parsed here — the host builds this struct
//! however it likes (env vars, a config file of its own choosing, literals)
//! and hands it to [`super::Server`].

use std::time::Duration;

use crate::protocol::{ProtocolVersion, ServerInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultTransport {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub enabled: bool,
    pub default: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default: "in-process".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["content-type".to_string(), "x-mcp-api-key".to_string()],
            max_age: Duration::from_secs(3600),
        }
    }
}

/// Defaults applied to a notification when its own `options` don't override
/// them: priority, retry count, backoff multiplier, queue name, result TTL.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub priority: String,
    pub tries: u32,
    pub backoff_multiplier: u32,
    pub queue: String,
    pub result_ttl: Duration,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            priority: "normal".to_string(),
            tries: 3,
            backoff_multiplier: 3,
            queue: "in-process".to_string(),
            result_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_info: ServerInfo,
    pub protocol_version: ProtocolVersion,
    pub default_transport: DefaultTransport,
    pub events_enabled: bool,
    pub queue: QueueConfig,
    pub notifications_enabled: bool,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub notification_defaults: NotificationDefaults,
    /// Page size used by `tools/list`, `resources/list`, `prompts/list`.
    pub page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_info: ServerInfo {
                name: "mcp-runtime".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocol_version: ProtocolVersion::current(),
            default_transport: DefaultTransport::Stdio,
            events_enabled: true,
            queue: QueueConfig::default(),
            notifications_enabled: true,
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            notification_defaults: NotificationDefaults::default(),
            page_size: 50,
        }
    }
}

pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.server_info = ServerInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn default_transport(mut self, transport: DefaultTransport) -> Self {
        self.config.default_transport = transport;
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = cors;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
