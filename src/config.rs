//! # Configuration
//!
//! Crate configuration with environment overrides. Defaults are safe for
//! local development and tests; deployments override through `FLEETCAST_*`
//! environment variables via [`FleetcastConfig::from_env`].

use crate::error::{FleetcastError, Result};

/// Top-level configuration for the orchestration and delivery subsystem.
#[derive(Debug, Clone)]
pub struct FleetcastConfig {
    /// Worker pool and queue sizing.
    pub orchestrator: OrchestratorConfig,
    /// Token lifecycle settings shared by all authenticators.
    pub auth: AuthSettings,
    /// Outbound HTTP transport settings.
    pub http: HttpSettings,
    /// Base URL that device-facing config URLs are derived from when a job
    /// request omits an explicit one.
    pub config_base_url: String,
    /// Per-platform endpoints and credentials.
    pub platforms: PlatformSettings,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent job workers.
    pub worker_count: usize,
    /// Bounded FIFO capacity; enqueue beyond this fails with `QueueFull`.
    pub queue_capacity: usize,
    /// How long a worker blocks on an empty queue before re-checking shutdown.
    pub pull_timeout_ms: u64,
    /// Upper bound on waiting for in-flight jobs during shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1024,
            pull_timeout_ms: 250,
            shutdown_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Tokens are refreshed proactively this many seconds before expiry.
    pub token_refresh_buffer_seconds: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_refresh_buffer_seconds: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Endpoints and credentials for each supported push platform. Empty
/// credential fields are legal at construction time; providers report
/// configuration errors when initialized against them.
#[derive(Debug, Clone, Default)]
pub struct PlatformSettings {
    pub fcm: FcmSettings,
    pub apns: ApnsSettings,
    pub wns: WnsSettings,
    pub web_push: WebPushSettings,
    pub topic_broker: TopicBrokerSettings,
}

#[derive(Debug, Clone)]
pub struct FcmSettings {
    /// Path to the service-account credential JSON file.
    pub credentials_path: String,
    /// API host; the send endpoint is derived per project.
    pub endpoint_base: String,
}

impl Default for FcmSettings {
    fn default() -> Self {
        Self {
            credentials_path: String::new(),
            endpoint_base: "https://fcm.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApnsSettings {
    pub endpoint_base: String,
    pub team_id: String,
    pub key_id: String,
    /// PEM-encoded EC private key used to sign provider tokens.
    pub private_key_pem: String,
    /// Bundle topic sent as `apns-topic`.
    pub bundle_topic: String,
}

impl Default for ApnsSettings {
    fn default() -> Self {
        Self {
            endpoint_base: "https://api.push.apple.com".to_string(),
            team_id: String::new(),
            key_id: String::new(),
            private_key_pem: String::new(),
            bundle_topic: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WnsSettings {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
    /// Channel URIs must be https and end with this host suffix.
    pub channel_host_suffix: String,
}

impl Default for WnsSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_endpoint: "https://login.live.com/accesstoken.srf".to_string(),
            channel_host_suffix: ".notify.windows.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebPushSettings {
    /// Contact URI embedded in the signed assertion (`mailto:` or https).
    pub subject: String,
    /// Signing secret for the VAPID-style assertion.
    pub signing_secret: String,
}

impl Default for WebPushSettings {
    fn default() -> Self {
        Self {
            subject: String::new(),
            signing_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicBrokerSettings {
    /// Host that device endpoint URIs and topic publishes must target.
    pub broker_host: String,
    /// HTTPS publish endpoint of the broker bridge.
    pub publish_endpoint: String,
    pub api_key: String,
}

impl Default for TopicBrokerSettings {
    fn default() -> Self {
        Self {
            broker_host: String::new(),
            publish_endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

impl Default for FleetcastConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            auth: AuthSettings::default(),
            http: HttpSettings::default(),
            config_base_url: "https://config.fleetcast.local".to_string(),
            platforms: PlatformSettings::default(),
        }
    }
}

impl FleetcastConfig {
    /// Build a configuration from defaults plus `FLEETCAST_*` environment
    /// overrides. Unparseable numeric values fail with a configuration error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(workers) = std::env::var("FLEETCAST_WORKER_COUNT") {
            config.orchestrator.worker_count = workers.parse().map_err(|e| {
                FleetcastError::configuration("orchestrator", format!("invalid worker_count: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("FLEETCAST_QUEUE_CAPACITY") {
            config.orchestrator.queue_capacity = capacity.parse().map_err(|e| {
                FleetcastError::configuration("orchestrator", format!("invalid queue_capacity: {e}"))
            })?;
        }

        if let Ok(buffer) = std::env::var("FLEETCAST_TOKEN_REFRESH_BUFFER_SECONDS") {
            config.auth.token_refresh_buffer_seconds = buffer.parse().map_err(|e| {
                FleetcastError::configuration("auth", format!("invalid refresh buffer: {e}"))
            })?;
        }

        if let Ok(base_url) = std::env::var("FLEETCAST_CONFIG_BASE_URL") {
            config.config_base_url = base_url;
        }

        if let Ok(path) = std::env::var("FLEETCAST_FCM_CREDENTIALS_PATH") {
            config.platforms.fcm.credentials_path = path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Structural sanity checks shared by `from_env` and manual construction.
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.worker_count == 0 {
            return Err(FleetcastError::configuration(
                "orchestrator",
                "worker_count must be at least 1",
            ));
        }
        if self.orchestrator.queue_capacity == 0 {
            return Err(FleetcastError::configuration(
                "orchestrator",
                "queue_capacity must be at least 1",
            ));
        }
        if self.auth.token_refresh_buffer_seconds < 0 {
            return Err(FleetcastError::configuration(
                "auth",
                "token_refresh_buffer_seconds must not be negative",
            ));
        }
        Ok(())
    }
}
