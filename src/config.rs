//! Settings for the discovery core.
//!
//! Every field has a serde default so partial JSON documents are accepted;
//! selected values can be overridden from `JOYNR_DISCOVERY_*` environment
//! variables.

use serde::{Deserialize, Serialize};

use crate::errors::RuntimeError;

/// Tunables for the capabilities directory, arbitration and access control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySettings {
    /// Backends this node knows about; the first one is the default backend.
    #[serde(default = "default_known_gbids")]
    pub known_gbids: Vec<String>,

    /// Identifies this node towards the global directory (touch/removeStale).
    #[serde(default = "default_cluster_controller_id")]
    pub cluster_controller_id: String,

    /// Interval of the periodic touch of globally registered providers.
    #[serde(default = "default_freshness_update_interval_ms")]
    pub freshness_update_interval_ms: u64,

    /// Interval of the expired entry sweep.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Lifetime given to newly created discovery entries.
    #[serde(default = "default_expiry_interval_ms")]
    pub default_expiry_interval_ms: i64,

    #[serde(default = "default_discovery_timeout_ms")]
    pub default_discovery_timeout_ms: i64,

    #[serde(default = "default_retry_interval_ms")]
    pub default_retry_interval_ms: i64,

    /// Lower bound for the delay between two arbitration attempts.
    #[serde(default = "default_minimum_arbitration_retry_delay_ms")]
    pub minimum_arbitration_retry_delay_ms: i64,

    /// TTL of add/remove/lookup calls to the global directory.
    #[serde(default = "default_global_directory_call_ttl_ms")]
    pub global_directory_call_ttl_ms: u64,

    /// TTL of the startup removeStale call.
    #[serde(default = "default_remove_stale_ttl_ms")]
    pub remove_stale_ttl_ms: u64,

    /// Domain hosting the global capabilities directory.
    #[serde(default = "default_capabilities_directory_domain")]
    pub capabilities_directory_domain: String,

    /// Domain hosting local system services (discovery, routing).
    #[serde(default = "default_system_services_domain")]
    pub system_services_domain: String,
}

fn default_known_gbids() -> Vec<String> { vec!["joynrdefaultgbid".to_string()] }
fn default_cluster_controller_id() -> String { uuid::Uuid::new_v4().to_string() }
fn default_freshness_update_interval_ms() -> u64 { 3_600_000 }
fn default_cleanup_interval_ms() -> u64 { 3_600_000 }
fn default_expiry_interval_ms() -> i64 { 6 * 7 * 24 * 3_600_000 }
fn default_discovery_timeout_ms() -> i64 { 600_000 }
fn default_retry_interval_ms() -> i64 { 10_000 }
fn default_minimum_arbitration_retry_delay_ms() -> i64 { 2_000 }
fn default_global_directory_call_ttl_ms() -> u64 { 60_000 }
fn default_remove_stale_ttl_ms() -> u64 { 3_600_000 }
fn default_capabilities_directory_domain() -> String { "io.joynr".to_string() }
fn default_system_services_domain() -> String { "io.joynr.system".to_string() }

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            known_gbids: default_known_gbids(),
            cluster_controller_id: default_cluster_controller_id(),
            freshness_update_interval_ms: default_freshness_update_interval_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            default_expiry_interval_ms: default_expiry_interval_ms(),
            default_discovery_timeout_ms: default_discovery_timeout_ms(),
            default_retry_interval_ms: default_retry_interval_ms(),
            minimum_arbitration_retry_delay_ms: default_minimum_arbitration_retry_delay_ms(),
            global_directory_call_ttl_ms: default_global_directory_call_ttl_ms(),
            remove_stale_ttl_ms: default_remove_stale_ttl_ms(),
            capabilities_directory_domain: default_capabilities_directory_domain(),
            system_services_domain: default_system_services_domain(),
        }
    }
}

impl DiscoverySettings {
    /// Parse settings from JSON, then validate them.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `JOYNR_DISCOVERY_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self, RuntimeError> {
        if let Ok(gbids) = std::env::var("JOYNR_DISCOVERY_KNOWN_GBIDS") {
            self.known_gbids = gbids
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
        }
        if let Ok(id) = std::env::var("JOYNR_DISCOVERY_CLUSTER_CONTROLLER_ID") {
            self.cluster_controller_id = id;
        }
        if let Some(v) = env_number("JOYNR_DISCOVERY_FRESHNESS_UPDATE_INTERVAL_MS")? {
            self.freshness_update_interval_ms = v;
        }
        if let Some(v) = env_number("JOYNR_DISCOVERY_CLEANUP_INTERVAL_MS")? {
            self.cleanup_interval_ms = v;
        }
        if let Some(v) = env_number("JOYNR_DISCOVERY_DEFAULT_RETRY_INTERVAL_MS")? {
            self.default_retry_interval_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn default_gbid(&self) -> &str {
        // validate() guarantees at least one gbid
        self.known_gbids.first().map(String::as_str).unwrap_or_default()
    }

    /// Reject settings the directory cannot run with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.known_gbids.is_empty() || self.known_gbids.iter().any(|g| g.is_empty()) {
            return Err(RuntimeError::IllegalArgument(
                "knownGbids must contain at least one non-empty gbid".to_string(),
            ));
        }
        if self.freshness_update_interval_ms == 0 || self.cleanup_interval_ms == 0 {
            return Err(RuntimeError::IllegalArgument(
                "periodic intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, RuntimeError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RuntimeError::IllegalArgument(format!("{} is not a number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
