//! # Provider Registry
//!
//! Closed enumeration of supported push platforms and the registry resolving
//! each to its provider. The platform set is fixed at compile time; adding a
//! platform means adding an enum variant and a provider implementation, which
//! keeps "unknown platform" unrepresentable past the device directory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PlatformInfo, PushProvider};
use crate::error::Result;

/// The supported push platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Mobile push platform A (registration-token based)
    Fcm,
    /// Mobile push platform B (hex device tokens)
    Apns,
    /// Desktop push (channel URIs)
    Wns,
    /// Browser push (subscription objects)
    WebPush,
    /// Message-broker bridge with native topics
    TopicBroker,
}

impl Platform {
    /// All platform variants, in registry display order.
    pub const ALL: [Platform; 5] = [
        Platform::Fcm,
        Platform::Apns,
        Platform::Wns,
        Platform::WebPush,
        Platform::TopicBroker,
    ];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Fcm => "fcm",
            Platform::Apns => "apns",
            Platform::Wns => "wns",
            Platform::WebPush => "web_push",
            Platform::TopicBroker => "topic_broker",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fcm" => Ok(Platform::Fcm),
            "apns" => Ok(Platform::Apns),
            "wns" => Ok(Platform::Wns),
            "web_push" => Ok(Platform::WebPush),
            "topic_broker" => Ok(Platform::TopicBroker),
            _ => Err(format!("Invalid platform: {s}")),
        }
    }
}

/// Resolves each platform to its provider implementation.
///
/// Built once during orchestrator construction, then shared read-only across
/// workers. A platform without a registered provider resolves to `None` and
/// surfaces as a per-device failure, never a crash.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, Arc<dyn PushProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a provider to its platform. Re-registration replaces the binding.
    pub fn register(&mut self, platform: Platform, provider: Arc<dyn PushProvider>) {
        info!(platform = %platform, "📚 REGISTRY: Provider registered");
        self.providers.insert(platform, provider);
    }

    /// Resolve the provider for a platform.
    pub fn provider(&self, platform: Platform) -> Option<Arc<dyn PushProvider>> {
        self.providers.get(&platform).cloned()
    }

    /// Platforms with a registered provider, in stable enum order.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .iter()
            .copied()
            .filter(|p| self.providers.contains_key(p))
            .collect()
    }

    /// Initialize every registered provider. Idempotent.
    pub async fn initialize_all(&self) -> Result<()> {
        for platform in self.platforms() {
            if let Some(provider) = self.provider(platform) {
                provider.initialize().await?;
            }
        }
        Ok(())
    }

    /// Capability/diagnostic records for every registered provider.
    pub fn info(&self) -> Vec<PlatformInfo> {
        self.platforms()
            .into_iter()
            .filter_map(|p| self.provider(p).map(|provider| provider.platform_info()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
