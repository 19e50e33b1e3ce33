//! Shared fixtures for the integration suites: scripted providers,
//! transports, and token exchangers, plus a fully wired orchestrator harness.

#![allow(dead_code)] // Each suite uses a subset of the harness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use fleetcast_core::auth::{AuthError, AuthResult, TokenExchanger, TokenGrant, TokenRequest};
use fleetcast_core::config::FleetcastConfig;
use fleetcast_core::delivery::{
    DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, ProviderRegistry, PushProvider,
    PushRequest, PushTransport, TransportError, TransportReply,
};
use fleetcast_core::events::EventPublisher;
use fleetcast_core::models::device::DeviceRef;
use fleetcast_core::models::job::JobId;
use fleetcast_core::models::notification::PushNotification;
use fleetcast_core::orchestration::{JobOrchestrator, JobStatusView};
use fleetcast_core::store::{InMemoryDeviceDirectory, InMemoryJobStore, InMemoryPushLogStore};

/// Push provider with per-token scripted outcomes. Accepts everything unless
/// a token is listed as rejected or network-failing.
pub struct ScriptedProvider {
    platform: Platform,
    reject_tokens: Vec<String>,
    network_fail_tokens: Vec<String>,
    send_delay: Option<Duration>,
    sent: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn accepting_all() -> Self {
        Self {
            platform: Platform::Fcm,
            reject_tokens: Vec::new(),
            network_fail_tokens: Vec::new(),
            send_delay: None,
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sends to this token come back as a platform rejection.
    pub fn rejecting(mut self, token: impl Into<String>) -> Self {
        self.reject_tokens.push(token.into());
        self
    }

    /// Sends to this token come back as a network fault.
    pub fn network_failing(mut self, token: impl Into<String>) -> Self {
        self.network_fail_tokens.push(token.into());
        self
    }

    /// Every send sleeps this long first; lets shutdown tests catch a worker
    /// mid-job.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Tokens sent so far, in send order.
    pub fn sent_tokens(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushProvider for ScriptedProvider {
    async fn initialize(&self) -> fleetcast_core::error::Result<()> {
        Ok(())
    }

    fn validate_device_token(&self, _token: &str) -> bool {
        true
    }

    async fn send_notification(
        &self,
        device_token: &str,
        _notification: &PushNotification,
    ) -> DeliveryResponse {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(device_token.to_string());

        if self.network_fail_tokens.iter().any(|t| t == device_token) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::NetworkError,
                "scripted connection failure",
            );
        }
        if self.reject_tokens.iter().any(|t| t == device_token) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::InvalidSubscription,
                "scripted platform rejection",
            );
        }
        DeliveryResponse::success("accepted", format!("scripted-{n}"))
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: self.platform,
            display_name: "Scripted".to_string(),
            supports_topics: false,
            max_payload_bytes: 4096,
            initialized: true,
        }
    }
}

/// Token exchanger that counts grants and records every request it sees.
pub struct CountingExchanger {
    expires_in: Option<u64>,
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<TokenRequest>>,
}

impl CountingExchanger {
    /// Every exchange succeeds with a fresh token of the given lifetime.
    pub fn granting(expires_in: u64) -> Self {
        Self {
            expires_in: Some(expires_in),
            fail: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every exchange fails.
    pub fn failing() -> Self {
        Self {
            expires_in: None,
            fail: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Form fields of the most recent exchange request.
    pub fn last_form(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .last()
            .map(|r| r.form.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenExchanger for CountingExchanger {
    async fn exchange(&self, request: TokenRequest) -> AuthResult<TokenGrant> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        if self.fail {
            return Err(AuthError::Exchange("scripted exchange failure".to_string()));
        }
        Ok(TokenGrant {
            access_token: format!("grant-{n}"),
            expires_in: self.expires_in,
        })
    }
}

/// Transport that records every request and replies with a fixed status.
pub struct RecordingTransport {
    reply_status: u16,
    reply_body: String,
    timeout: bool,
    requests: Mutex<Vec<PushRequest>>,
}

impl RecordingTransport {
    pub fn replying(status: u16, body: impl Into<String>) -> Self {
        Self {
            reply_status: status,
            reply_body: body.into(),
            timeout: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Accept everything with an empty 200 body.
    pub fn accepting() -> Self {
        Self::replying(200, "{}")
    }

    /// Every delivery times out instead of replying.
    pub fn timing_out() -> Self {
        Self {
            reply_status: 0,
            reply_body: String::new(),
            timeout: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PushRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn deliver(
        &self,
        request: PushRequest,
    ) -> std::result::Result<TransportReply, TransportError> {
        self.requests.lock().push(request);
        if self.timeout {
            return Err(TransportError::Timeout("scripted timeout".to_string()));
        }
        Ok(TransportReply {
            status: self.reply_status,
            body: self.reply_body.clone(),
        })
    }
}

/// A fully wired orchestrator over in-memory stores and one scripted
/// provider, the way the production composition root assembles it.
pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub job_store: Arc<InMemoryJobStore>,
    pub push_log_store: Arc<InMemoryPushLogStore>,
    pub directory: Arc<InMemoryDeviceDirectory>,
    pub provider: Arc<ScriptedProvider>,
    pub publisher: EventPublisher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::accepting_all())
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        Self::build(FleetcastConfig::default(), provider)
    }

    pub fn build(config: FleetcastConfig, provider: ScriptedProvider) -> Self {
        let job_store = Arc::new(InMemoryJobStore::new());
        let push_log_store = Arc::new(InMemoryPushLogStore::new());
        let directory = Arc::new(InMemoryDeviceDirectory::new());
        let provider = Arc::new(provider);
        let publisher = EventPublisher::new(256);

        let mut registry = ProviderRegistry::new();
        registry.register(provider.platform_info().platform, provider.clone());

        let orchestrator = JobOrchestrator::new(
            &config,
            job_store.clone(),
            push_log_store.clone(),
            directory.clone(),
            Arc::new(registry),
            publisher.clone(),
        );

        Self {
            orchestrator,
            job_store,
            push_log_store,
            directory,
            provider,
            publisher,
        }
    }

    /// Register a POS terminal at site-001 in the `pos-terminals` segment.
    pub fn register_pos_terminal(&self, device_id: &str, token: &str) {
        self.directory.register_device(
            DeviceRef::new(device_id, "site-001", Platform::Fcm)
                .with_segment("pos-terminals")
                .with_push_token(token),
        );
    }

    /// Poll job status until it reaches a terminal state.
    pub async fn wait_terminal(&self, job_id: &JobId) -> JobStatusView {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let status = self
                .orchestrator
                .get_job_status(job_id)
                .await
                .expect("status query failed")
                .expect("job disappeared");
            if status.status.is_terminal() {
                return status;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {job_id} did not reach a terminal state in time"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
