//! Cross-platform provider contract: structural validation happens before any
//! network traffic, upstream statuses map into the shared failure categories,
//! and only the broker platform supports topic delivery.

mod common;

use std::sync::Arc;

use common::{CountingExchanger, RecordingTransport};
use fleetcast_core::auth::{
    ApiKeyAuthenticator, OAuth2ClientCredentialsAuthenticator, ServiceAccountAuthenticator,
    ServiceAccountCredentials, SignedJwtAuthenticator,
};
use fleetcast_core::config::{
    ApnsSettings, AuthSettings, FcmSettings, TopicBrokerSettings, WnsSettings,
};
use fleetcast_core::delivery::{
    ApnsProvider, DeliveryErrorCode, FcmProvider, Platform, ProviderRegistry, PushProvider,
    TopicBrokerProvider, WebPushProvider, WnsProvider,
};
use fleetcast_core::models::job::{Job, JobTarget};
use fleetcast_core::models::notification::PushNotification;

fn notification() -> PushNotification {
    let job = Job::new(
        "update_payment_config".to_string(),
        JobTarget::Segment {
            site_id: "site-001".to_string(),
            segment: Some("pos-terminals".to_string()),
        },
        "https://config.example.com/sites/site-001/configs/20250828.120000".to_string(),
        "20250828.120000".to_string(),
        "cfg-site-001".to_string(),
    );
    PushNotification::for_job(&job)
}

fn fcm_provider(transport: Arc<RecordingTransport>) -> FcmProvider {
    let credentials = ServiceAccountCredentials {
        project_id: "fleet-project".to_string(),
        client_email: "pusher@fleet-project.iam.example.com".to_string(),
        private_key: "fcm-signing-secret".to_string(),
        token_uri: "https://oauth2.example.com/token".to_string(),
    };
    let authenticator = Arc::new(
        ServiceAccountAuthenticator::from_credentials(
            "fcm",
            credentials,
            "https://push.scope.example.com",
            Arc::new(CountingExchanger::granting(3600)),
        )
        .unwrap(),
    );
    FcmProvider::new(
        &FcmSettings::default(),
        &AuthSettings::default(),
        authenticator,
        transport,
    )
}

fn apns_provider(transport: Arc<RecordingTransport>) -> ApnsProvider {
    let settings = ApnsSettings {
        bundle_topic: "com.example.fleet".to_string(),
        ..ApnsSettings::default()
    };
    let authenticator = Arc::new(
        SignedJwtAuthenticator::new("apns", "TEAM123", "apns-signing-secret")
            .unwrap()
            .with_key_id("KEY456"),
    );
    ApnsProvider::new(&settings, &AuthSettings::default(), authenticator, transport)
}

fn wns_provider(transport: Arc<RecordingTransport>) -> WnsProvider {
    let settings = WnsSettings {
        client_id: "wns-client".to_string(),
        client_secret: "wns-secret".to_string(),
        ..WnsSettings::default()
    };
    let authenticator = Arc::new(
        OAuth2ClientCredentialsAuthenticator::new(
            "wns",
            &settings.client_id,
            &settings.client_secret,
            &settings.token_endpoint,
            Arc::new(CountingExchanger::granting(86400)),
        )
        .unwrap()
        .with_scope("notify.windows.com"),
    );
    WnsProvider::new(&settings, &AuthSettings::default(), authenticator, transport)
}

fn web_push_provider(transport: Arc<RecordingTransport>) -> WebPushProvider {
    let authenticator = Arc::new(
        SignedJwtAuthenticator::new("web_push", "mailto:ops@example.com", "vapid-secret")
            .unwrap()
            .with_subject("mailto:ops@example.com")
            .with_header_scheme("WebPush"),
    );
    WebPushProvider::new(&AuthSettings::default(), authenticator, transport)
}

fn broker_provider(transport: Arc<RecordingTransport>) -> TopicBrokerProvider {
    let settings = TopicBrokerSettings {
        broker_host: "broker.fleet.example.com".to_string(),
        publish_endpoint: "https://broker.fleet.example.com/api/publish".to_string(),
        api_key: "broker-key".to_string(),
    };
    let authenticator = Arc::new(
        ApiKeyAuthenticator::new("topic_broker", "Authorization", "key=", &settings.api_key)
            .unwrap(),
    );
    TopicBrokerProvider::new(&AuthSettings::default(), &settings, authenticator, transport)
}

fn fcm_token() -> String {
    "f".repeat(152)
}

fn apns_token() -> String {
    "0123456789abcdef".repeat(4)
}

fn web_push_subscription() -> String {
    r#"{"endpoint":"https://push.example.com/sub/abc123","keys":{"p256dh":"BPK-client-key","auth":"auth-secret"}}"#
        .to_string()
}

#[tokio::test]
async fn test_registry_covers_all_platforms_in_stable_order() {
    let mut registry = ProviderRegistry::new();
    // Register out of order; enumeration order must not depend on it
    registry.register(
        Platform::TopicBroker,
        Arc::new(broker_provider(Arc::new(RecordingTransport::accepting()))),
    );
    registry.register(
        Platform::WebPush,
        Arc::new(web_push_provider(Arc::new(RecordingTransport::accepting()))),
    );
    registry.register(
        Platform::Apns,
        Arc::new(apns_provider(Arc::new(RecordingTransport::accepting()))),
    );
    registry.register(
        Platform::Fcm,
        Arc::new(fcm_provider(Arc::new(RecordingTransport::accepting()))),
    );
    registry.register(
        Platform::Wns,
        Arc::new(wns_provider(Arc::new(RecordingTransport::accepting()))),
    );

    assert_eq!(registry.platforms(), Platform::ALL.to_vec());

    registry.initialize_all().await.unwrap();
    let info = registry.info();
    assert_eq!(info.len(), 5);
    assert!(info.iter().all(|i| i.initialized));
    // Topic delivery is a broker-only capability
    assert!(info
        .iter()
        .all(|i| i.supports_topics == (i.platform == Platform::TopicBroker)));
}

#[tokio::test]
async fn test_fcm_send_uses_project_endpoint_and_echoed_message_id() {
    let transport = Arc::new(RecordingTransport::replying(
        200,
        r#"{"name":"projects/fleet-project/messages/m-42"}"#,
    ));
    let provider = fcm_provider(transport.clone());
    provider.initialize().await.unwrap();

    let response = provider.send_notification(&fcm_token(), &notification()).await;
    assert!(response.success);
    assert_eq!(
        response.message_id.as_deref(),
        Some("projects/fleet-project/messages/m-42")
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].endpoint,
        "https://fcm.googleapis.com/v1/projects/fleet-project/messages:send"
    );
    assert_eq!(
        requests[0].headers.get("Authorization").unwrap(),
        "Bearer grant-0"
    );
}

#[tokio::test]
async fn test_structural_failures_never_reach_network() {
    let cases: Vec<(Arc<dyn PushProvider>, Arc<RecordingTransport>, &str, DeliveryErrorCode)> = {
        let fcm_transport = Arc::new(RecordingTransport::accepting());
        let apns_transport = Arc::new(RecordingTransport::accepting());
        let wns_transport = Arc::new(RecordingTransport::accepting());
        let web_transport = Arc::new(RecordingTransport::accepting());
        let broker_transport = Arc::new(RecordingTransport::accepting());
        vec![
            (
                Arc::new(fcm_provider(fcm_transport.clone())),
                fcm_transport,
                "too-short",
                DeliveryErrorCode::InvalidSubscription,
            ),
            (
                Arc::new(apns_provider(apns_transport.clone())),
                apns_transport,
                "not-sixty-four-hex-characters",
                DeliveryErrorCode::InvalidSubscription,
            ),
            (
                Arc::new(wns_provider(wns_transport.clone())),
                wns_transport,
                "https://evil.example.com/?token=x",
                DeliveryErrorCode::InvalidChannelUri,
            ),
            (
                Arc::new(web_push_provider(web_transport.clone())),
                web_transport,
                "{\"endpoint\":\"ftp://not-https\"}",
                DeliveryErrorCode::InvalidSubscription,
            ),
            (
                Arc::new(broker_provider(broker_transport.clone())),
                broker_transport,
                "mqtts://other-broker.example.com/fleet/dev-1",
                DeliveryErrorCode::InvalidChannelUri,
            ),
        ]
    };

    for (provider, transport, bad_token, expected) in cases {
        provider.initialize().await.unwrap();
        let response = provider.send_notification(bad_token, &notification()).await;
        assert!(!response.success, "{bad_token} should fail");
        assert_eq!(
            response.error_code,
            Some(expected),
            "wrong category for {bad_token}"
        );
        assert_eq!(
            transport.request_count(),
            0,
            "{bad_token} must not reach the transport"
        );
    }
}

#[tokio::test]
async fn test_dead_registrations_map_per_platform() {
    // Hex-token platform: 410 means the token was unregistered
    let provider = apns_provider(Arc::new(RecordingTransport::replying(410, "")));
    provider.initialize().await.unwrap();
    let response = provider.send_notification(&apns_token(), &notification()).await;
    assert_eq!(
        response.error_code,
        Some(DeliveryErrorCode::InvalidSubscription)
    );

    // Channel-URI platform: 404/410 means the channel expired
    let provider = wns_provider(Arc::new(RecordingTransport::replying(404, "")));
    provider.initialize().await.unwrap();
    let response = provider
        .send_notification("https://db5p.notify.windows.com/?token=x", &notification())
        .await;
    assert_eq!(response.error_code, Some(DeliveryErrorCode::ChannelExpired));

    // Subscription platform: 410 means the browser unsubscribed
    let provider = web_push_provider(Arc::new(RecordingTransport::replying(410, "")));
    provider.initialize().await.unwrap();
    let response = provider
        .send_notification(&web_push_subscription(), &notification())
        .await;
    assert_eq!(
        response.error_code,
        Some(DeliveryErrorCode::InvalidSubscription)
    );
}

#[tokio::test]
async fn test_upstream_credential_rejection_maps_to_unauthorized() {
    let provider = fcm_provider(Arc::new(RecordingTransport::replying(403, "denied")));
    provider.initialize().await.unwrap();

    let response = provider.send_notification(&fcm_token(), &notification()).await;
    assert!(!response.success);
    assert_eq!(response.error_code, Some(DeliveryErrorCode::Unauthorized));
}

#[tokio::test]
async fn test_transport_timeout_maps_to_network_error() {
    let provider = fcm_provider(Arc::new(RecordingTransport::timing_out()));
    provider.initialize().await.unwrap();

    let response = provider.send_notification(&fcm_token(), &notification()).await;
    assert!(!response.success);
    assert_eq!(response.error_code, Some(DeliveryErrorCode::NetworkError));
}

#[tokio::test]
async fn test_topic_delivery_only_on_broker() {
    let fcm = fcm_provider(Arc::new(RecordingTransport::accepting()));
    fcm.initialize().await.unwrap();
    let response = fcm
        .send_topic_notification("fleet/site-001/all", &notification())
        .await;
    assert_eq!(
        response.error_code,
        Some(DeliveryErrorCode::TopicsNotSupported)
    );

    let transport = Arc::new(RecordingTransport::accepting());
    let broker = broker_provider(transport.clone());
    broker.initialize().await.unwrap();
    let response = broker
        .send_topic_notification("fleet/site-001/all", &notification())
        .await;
    assert!(response.success);

    let requests = transport.requests();
    let envelope: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["topic"], "fleet/site-001/all");
}

#[tokio::test]
async fn test_bulk_send_defaults_to_sequential_singles() {
    let transport = Arc::new(RecordingTransport::replying(200, "{}"));
    let provider = fcm_provider(transport.clone());
    provider.initialize().await.unwrap();

    let tokens = vec!["a".repeat(152), "b".repeat(152), "c".repeat(152)];
    let responses = provider.send_bulk_notifications(&tokens, &notification()).await;
    assert_eq!(responses.len(), 3);
    assert!(responses.iter().all(|r| r.success));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_uninitialized_provider_refuses_to_send() {
    let transport = Arc::new(RecordingTransport::accepting());
    let provider = fcm_provider(transport.clone());

    let response = provider.send_notification(&fcm_token(), &notification()).await;
    assert_eq!(
        response.error_code,
        Some(DeliveryErrorCode::LibraryNotAvailable)
    );
    assert_eq!(transport.request_count(), 0);
}
