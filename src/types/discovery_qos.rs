//! Request-scoped discovery parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cache age meaning "any cached entry is acceptable".
pub const NO_MAX_AGE: i64 = i64::MAX;

/// Which sources a lookup consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryScope {
    LocalOnly,
    LocalThenGlobal,
    GlobalOnly,
    LocalAndGlobal,
}

impl DiscoveryScope {
    pub fn includes_local(&self) -> bool {
        !matches!(self, DiscoveryScope::GlobalOnly)
    }

    pub fn includes_global(&self) -> bool {
        !matches!(self, DiscoveryScope::LocalOnly)
    }
}

impl Default for DiscoveryScope {
    fn default() -> Self {
        DiscoveryScope::LocalThenGlobal
    }
}

/// Selection policy used by the arbitrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArbitrationStrategy {
    /// No strategy chosen; treated as highest priority.
    NotSet,
    HighestPriority,
    Keyword,
    FixedParticipant,
    LastSeen,
    /// A caller-supplied strategy function.
    Custom,
}

impl Default for ArbitrationStrategy {
    fn default() -> Self {
        ArbitrationStrategy::HighestPriority
    }
}

/// Parameters of a single discovery or proxy-build request.
///
/// Constructed per request and not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryQos {
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: i64,
    #[serde(default)]
    pub cache_max_age_ms: i64,
    #[serde(default)]
    pub discovery_scope: DiscoveryScope,
    #[serde(default)]
    pub arbitration_strategy: ArbitrationStrategy,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    #[serde(default)]
    pub provider_must_support_on_change: bool,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: i64,
}

fn default_discovery_timeout_ms() -> i64 { 600_000 }
fn default_retry_interval_ms() -> i64 { 10_000 }

impl Default for DiscoveryQos {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout_ms(),
            cache_max_age_ms: 0,
            discovery_scope: DiscoveryScope::default(),
            arbitration_strategy: ArbitrationStrategy::default(),
            custom_parameters: HashMap::new(),
            provider_must_support_on_change: false,
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl DiscoveryQos {
    pub fn new(
        discovery_timeout_ms: i64,
        retry_interval_ms: i64,
        arbitration_strategy: ArbitrationStrategy,
        cache_max_age_ms: i64,
        discovery_scope: DiscoveryScope,
    ) -> Self {
        Self {
            discovery_timeout_ms,
            cache_max_age_ms,
            discovery_scope,
            arbitration_strategy,
            retry_interval_ms,
            ..Default::default()
        }
    }

    pub fn with_scope(mut self, discovery_scope: DiscoveryScope) -> Self {
        self.discovery_scope = discovery_scope;
        self
    }

    pub fn with_custom_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_provider_must_support_on_change(mut self, required: bool) -> Self {
        self.provider_must_support_on_change = required;
        self
    }
}
