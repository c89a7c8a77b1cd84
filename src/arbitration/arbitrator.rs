//! Provider arbitration.
//!
//! An [`Arbitrator`] repeatedly asks a [`DiscoveryLookup`] for providers of an
//! interface and lets an [`ArbitrationStrategyFunction`] pick one per domain.
//! Retries are timer driven inside a single tokio task; the deadline is fixed
//! when the arbitrator is constructed.
//!
//! ```text
//! NotStarted ──start──▶ Running ──selected──▶ Successful
//!                         │  ▲
//!                   retry └──┘ (until deadline)
//!                         │
//!                         └──deadline / fatal──▶ CanceledForever
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use super::strategy::{strategy_for, ArbitrationStrategyFunction};
use crate::config::DiscoverySettings;
use crate::errors::{ArbitrationError, DiscoveryError, DiscoveryFailure, RuntimeError};
use crate::interfaces::DiscoveryLookup;
use crate::types::{ArbitrationStrategy, DiscoveryEntryWithMetaInfo, DiscoveryQos};

/// Default lower bound for the delay between two arbitration attempts.
pub const DEFAULT_MINIMUM_RETRY_DELAY_MS: i64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArbitrationStatus {
    ArbitrationNotStarted,
    ArbitrationRunning,
    ArbitrationSuccessful,
    ArbitrationCanceledForever,
}

impl ArbitrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArbitrationStatus::ArbitrationSuccessful | ArbitrationStatus::ArbitrationCanceledForever
        )
    }
}

/// Providers chosen by a successful arbitration, one per requested domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbitrationResult {
    pub participant_ids: HashSet<String>,
    pub discovery_entries: Vec<DiscoveryEntryWithMetaInfo>,
}

/// Receives the outcome of an arbitration exactly once.
pub trait ArbitrationListener: Send + Sync {
    fn on_status_changed(&self, _status: ArbitrationStatus) {}

    fn on_success(&self, result: &ArbitrationResult);

    fn on_error(&self, error: &ArbitrationError);
}

struct ArbitrationState {
    status: ArbitrationStatus,
    outcome: Option<Result<ArbitrationResult, ArbitrationError>>,
    listener: Option<Arc<dyn ArbitrationListener>>,
    delivered: bool,
}

enum Attempt {
    Selected(ArbitrationResult),
    Retry(Option<ArbitrationError>),
    Cancel(ArbitrationError),
}

pub struct Arbitrator {
    domains: Vec<String>,
    interface_name: String,
    qos: DiscoveryQos,
    gbids: Vec<String>,
    discovery: Arc<dyn DiscoveryLookup>,
    strategy: Arc<dyn ArbitrationStrategyFunction>,
    minimum_retry_delay_ms: i64,
    deadline: Instant,
    attempts: AtomicU32,
    state: Mutex<ArbitrationState>,
    status_tx: watch::Sender<ArbitrationStatus>,
}

impl Arbitrator {
    /// Create an arbitrator. The deadline is `now + qos.discovery_timeout_ms`.
    pub fn new(
        domains: Vec<String>,
        interface_name: impl Into<String>,
        qos: DiscoveryQos,
        discovery: Arc<dyn DiscoveryLookup>,
        strategy: Arc<dyn ArbitrationStrategyFunction>,
    ) -> Self {
        let mut unique = Vec::with_capacity(domains.len());
        for domain in domains {
            if !unique.contains(&domain) {
                unique.push(domain);
            }
        }
        let timeout = Duration::from_millis(qos.discovery_timeout_ms.max(0) as u64);
        let (status_tx, _) = watch::channel(ArbitrationStatus::ArbitrationNotStarted);

        Self {
            domains: unique,
            interface_name: interface_name.into(),
            qos,
            gbids: Vec::new(),
            discovery,
            strategy,
            minimum_retry_delay_ms: DEFAULT_MINIMUM_RETRY_DELAY_MS,
            deadline: Instant::now() + timeout,
            attempts: AtomicU32::new(0),
            state: Mutex::new(ArbitrationState {
                status: ArbitrationStatus::ArbitrationNotStarted,
                outcome: None,
                listener: None,
                delivered: false,
            }),
            status_tx,
        }
    }

    /// Create an arbitrator using the built-in strategy named by
    /// `qos.arbitration_strategy` and the retry floor from `settings`.
    pub fn for_qos(
        domains: Vec<String>,
        interface_name: impl Into<String>,
        qos: DiscoveryQos,
        discovery: Arc<dyn DiscoveryLookup>,
        settings: &DiscoverySettings,
    ) -> Result<Self, ArbitrationError> {
        let strategy = strategy_for(qos.arbitration_strategy).ok_or_else(|| {
            ArbitrationError::Strategy(format!(
                "{:?} arbitration needs a strategy function",
                ArbitrationStrategy::Custom
            ))
        })?;
        Ok(Self::new(domains, interface_name, qos, discovery, strategy)
            .with_minimum_retry_delay_ms(settings.minimum_arbitration_retry_delay_ms))
    }

    /// Restrict lookups to these backends. Empty means all known backends.
    pub fn with_gbids(mut self, gbids: Vec<String>) -> Self {
        self.gbids = gbids;
        self
    }

    pub fn with_minimum_retry_delay_ms(mut self, delay_ms: i64) -> Self {
        self.minimum_retry_delay_ms = delay_ms;
        self
    }

    pub fn status(&self) -> ArbitrationStatus {
        self.state.lock().status
    }

    /// Number of lookups issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Register the listener. If the arbitration already finished the
    /// outcome is delivered right away, unless an earlier listener got it.
    pub fn set_arbitration_listener(&self, listener: Arc<dyn ArbitrationListener>) {
        let pending = {
            let mut state = self.state.lock();
            state.listener = Some(listener.clone());
            if state.delivered {
                None
            } else {
                let outcome = state.outcome.clone();
                state.delivered = outcome.is_some();
                outcome
            }
        };
        if let Some(outcome) = pending {
            deliver(listener.as_ref(), &outcome);
        }
    }

    /// Start the arbitration task. Calling this more than once has no effect.
    pub fn start_arbitration(self: &Arc<Self>) {
        let listener = {
            let mut state = self.state.lock();
            if state.status != ArbitrationStatus::ArbitrationNotStarted {
                log::warn!(
                    "[Arbitrator] Arbitration for {} {:?} already started",
                    self.interface_name,
                    self.domains
                );
                return;
            }
            state.status = ArbitrationStatus::ArbitrationRunning;
            state.listener.clone()
        };
        self.status_tx.send_replace(ArbitrationStatus::ArbitrationRunning);
        if let Some(listener) = listener {
            listener.on_status_changed(ArbitrationStatus::ArbitrationRunning);
        }

        tokio::spawn(Arc::clone(self).run());
    }

    /// Wait until the arbitration reaches a terminal state.
    pub async fn wait_for_result(&self) -> Result<ArbitrationResult, ArbitrationError> {
        let mut status_rx = self.status_tx.subscribe();
        status_rx
            .wait_for(|status| status.is_terminal())
            .await
            .map(|_| ())
            .map_err(|_| {
                ArbitrationError::Runtime(RuntimeError::IllegalState("arbitration status channel closed".into()))
            })?;

        self.state.lock().outcome.clone().unwrap_or_else(|| {
            Err(ArbitrationError::Runtime(RuntimeError::IllegalState(
                "arbitration finished without an outcome".into(),
            )))
        })
    }

    async fn run(self: Arc<Self>) {
        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            log::debug!(
                "[Arbitrator] Attempt {} for {} {:?}",
                attempt,
                self.interface_name,
                self.domains
            );

            let reason = match self.attempt().await {
                Attempt::Selected(result) => {
                    log::debug!(
                        "[Arbitrator] Selected {:?} for {} after {} attempt(s)",
                        result.participant_ids,
                        self.interface_name,
                        attempt
                    );
                    self.finish(Ok(result));
                    return;
                }
                Attempt::Cancel(error) => {
                    self.finish(Err(error));
                    return;
                }
                Attempt::Retry(reason) => reason,
            };

            if Instant::now() >= self.deadline {
                let error = reason.unwrap_or_else(|| ArbitrationError::NoProviderInTime {
                    interface_name: self.interface_name.clone(),
                    domains: self.domains.clone(),
                });
                log::warn!("[Arbitrator] Canceling arbitration: {}", error);
                self.finish(Err(error));
                return;
            }

            let delay_ms = self.qos.retry_interval_ms.max(self.minimum_retry_delay_ms).max(0) as u64;
            log::trace!("[Arbitrator] Retrying {} in {}ms", self.interface_name, delay_ms);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn attempt(&self) -> Attempt {
        let mut lookup_qos = self.qos.clone();
        lookup_qos.discovery_timeout_ms = self.remaining_ms();

        match self
            .discovery
            .lookup(&self.domains, &self.interface_name, &lookup_qos, &self.gbids)
            .await
        {
            Ok(candidates) => self.select(candidates),
            Err(failure) => self.classify(failure),
        }
    }

    fn select(&self, mut candidates: Vec<DiscoveryEntryWithMetaInfo>) -> Attempt {
        if self.qos.provider_must_support_on_change {
            candidates.retain(|c| c.entry.qos.supports_on_change_subscriptions);
        }

        let mut result = ArbitrationResult::default();
        for domain in &self.domains {
            let in_domain: Vec<DiscoveryEntryWithMetaInfo> = candidates
                .iter()
                .filter(|c| &c.entry.domain == domain)
                .cloned()
                .collect();
            if in_domain.is_empty() {
                log::trace!("[Arbitrator] No provider for {} in domain {} yet", self.interface_name, domain);
                return Attempt::Retry(None);
            }

            match self.strategy.select(&self.qos.custom_parameters, &in_domain) {
                Ok(Some(selected)) => {
                    result.participant_ids.insert(selected.participant_id().to_string());
                    result.discovery_entries.push(selected);
                }
                Ok(None) => return Attempt::Retry(None),
                Err(error) => {
                    log::warn!("[Arbitrator] Strategy failed for {}: {}", self.interface_name, error);
                    return Attempt::Cancel(error);
                }
            }
        }
        Attempt::Selected(result)
    }

    fn classify(&self, failure: DiscoveryFailure) -> Attempt {
        match failure {
            DiscoveryFailure::Modeled(
                error @ (DiscoveryError::NoEntryForParticipant | DiscoveryError::NoEntryForSelectedBackends),
            ) => {
                log::debug!("[Arbitrator] Lookup for {} returned {}, retrying", self.interface_name, error);
                Attempt::Retry(Some(ArbitrationError::Discovery(error)))
            }
            DiscoveryFailure::Modeled(error) => {
                log::warn!("[Arbitrator] Lookup for {} failed: {}", self.interface_name, error);
                Attempt::Cancel(ArbitrationError::Discovery(error))
            }
            DiscoveryFailure::Runtime(error @ (RuntimeError::IllegalState(_) | RuntimeError::Other(_))) => {
                log::error!("[Arbitrator] Unexpected failure during arbitration of {}: {}", self.interface_name, error);
                Attempt::Cancel(ArbitrationError::Runtime(error))
            }
            DiscoveryFailure::Runtime(error @ RuntimeError::Shutdown(_)) => {
                log::warn!("[Arbitrator] Arbitration of {} interrupted: {}", self.interface_name, error);
                Attempt::Cancel(ArbitrationError::Runtime(error))
            }
            DiscoveryFailure::Runtime(error) => {
                log::debug!("[Arbitrator] Lookup for {} failed: {}, retrying", self.interface_name, error);
                Attempt::Retry(None)
            }
        }
    }

    fn finish(&self, outcome: Result<ArbitrationResult, ArbitrationError>) {
        let status = if outcome.is_ok() {
            ArbitrationStatus::ArbitrationSuccessful
        } else {
            ArbitrationStatus::ArbitrationCanceledForever
        };

        let listener = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return;
            }
            state.status = status;
            state.outcome = Some(outcome.clone());
            state.delivered = state.listener.is_some();
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_status_changed(status);
            deliver(listener.as_ref(), &outcome);
        }
        self.status_tx.send_replace(status);
    }

    fn remaining_ms(&self) -> i64 {
        self.deadline.saturating_duration_since(Instant::now()).as_millis() as i64
    }
}

fn deliver(listener: &dyn ArbitrationListener, outcome: &Result<ArbitrationResult, ArbitrationError>) {
    match outcome {
        Ok(result) => listener.on_success(result),
        Err(error) => listener.on_error(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiscoveryEntry, ProviderQos};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct FakeDiscovery {
        responses: Mutex<VecDeque<Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure>>>,
        fallback: Vec<DiscoveryEntryWithMetaInfo>,
        calls: AtomicU32,
    }

    impl FakeDiscovery {
        fn new(
            responses: Vec<Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure>>,
            fallback: Vec<DiscoveryEntryWithMetaInfo>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                fallback,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiscoveryLookup for FakeDiscovery {
        async fn lookup(
            &self,
            _domains: &[String],
            _interface_name: &str,
            _qos: &DiscoveryQos,
            _gbids: &[String],
        ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        async fn lookup_participant(
            &self,
            _participant_id: &str,
            _qos: &DiscoveryQos,
            _gbids: &[String],
        ) -> Result<Option<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl ArbitrationListener for RecordingListener {
        fn on_status_changed(&self, status: ArbitrationStatus) {
            self.events.lock().push(format!("{:?}", status));
        }

        fn on_success(&self, result: &ArbitrationResult) {
            let mut ids: Vec<&String> = result.participant_ids.iter().collect();
            ids.sort();
            self.events.lock().push(format!("success {:?}", ids));
        }

        fn on_error(&self, error: &ArbitrationError) {
            self.events.lock().push(format!("error {}", error));
        }
    }

    fn provider(domain: &str, pid: &str, priority: i64) -> DiscoveryEntryWithMetaInfo {
        let qos = ProviderQos {
            priority,
            ..Default::default()
        };
        DiscoveryEntryWithMetaInfo::local(DiscoveryEntry::new(domain, "vehicle/Radio", pid, qos, 60_000))
    }

    fn qos(timeout_ms: i64, retry_ms: i64) -> DiscoveryQos {
        DiscoveryQos {
            discovery_timeout_ms: timeout_ms,
            retry_interval_ms: retry_ms,
            ..Default::default()
        }
    }

    fn arbitrator(domains: &[&str], qos: DiscoveryQos, discovery: Arc<FakeDiscovery>) -> Arc<Arbitrator> {
        let strategy = strategy_for(ArbitrationStrategy::HighestPriority).unwrap();
        Arc::new(
            Arbitrator::new(
                domains.iter().map(|d| d.to_string()).collect(),
                "vehicle/Radio",
                qos,
                discovery,
                strategy,
            )
            .with_minimum_retry_delay_ms(0),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_highest_priority_provider_is_selected() {
        let discovery = FakeDiscovery::new(
            vec![],
            vec![provider("dom", "p5", 5), provider("dom", "p20", 20), provider("dom", "p3", 3)],
        );
        let arbitrator = arbitrator(&["dom"], qos(10_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let result = arbitrator.wait_for_result().await.unwrap();
        assert_eq!(result.participant_ids, HashSet::from(["p20".to_string()]));
        assert_eq!(arbitrator.status(), ArbitrationStatus::ArbitrationSuccessful);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_cancels_after_one_attempt() {
        let discovery = FakeDiscovery::new(vec![], vec![]);
        let arbitrator = arbitrator(&["dom"], qos(0, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert!(matches!(err, ArbitrationError::NoProviderInTime { .. }));
        assert_eq!(arbitrator.status(), ArbitrationStatus::ArbitrationCanceledForever);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_provider_appears() {
        let discovery = FakeDiscovery::new(
            vec![
                Ok(vec![]),
                Err(RuntimeError::Transport("broker unreachable".into()).into()),
                Ok(vec![provider("dom", "late", 1)]),
            ],
            vec![],
        );
        let arbitrator = arbitrator(&["dom"], qos(60_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let result = arbitrator.wait_for_result().await.unwrap();
        assert!(result.participant_ids.contains("late"));
        assert_eq!(arbitrator.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_retry_delay_bounds_attempts() {
        let discovery = FakeDiscovery::new(vec![Err(DiscoveryError::NoEntryForSelectedBackends.into())], vec![]);
        let strategy = strategy_for(ArbitrationStrategy::HighestPriority).unwrap();
        let arbitrator = Arc::new(
            Arbitrator::new(vec!["dom".into()], "vehicle/Radio", qos(5_000, 1_000), discovery.clone(), strategy)
                .with_minimum_retry_delay_ms(2_000),
        );
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert!(matches!(err, ArbitrationError::NoProviderInTime { .. }));
        // attempts at 0s, 2s, 4s and 6s
        assert_eq!(discovery.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_modeled_error_cancels_without_retry() {
        let discovery = FakeDiscovery::new(vec![Err(DiscoveryError::UnknownGbid.into())], vec![]);
        let arbitrator = arbitrator(&["dom"], qos(60_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert_eq!(err, ArbitrationError::Discovery(DiscoveryError::UnknownGbid));
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_state_cancels_without_retry() {
        let discovery = FakeDiscovery::new(
            vec![Err(RuntimeError::IllegalState("directory gone".into()).into())],
            vec![provider("dom", "p1", 1)],
        );
        let arbitrator = arbitrator(&["dom"], qos(60_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert!(matches!(err, ArbitrationError::Runtime(RuntimeError::IllegalState(_))));
        assert_eq!(arbitrator.status(), ArbitrationStatus::ArbitrationCanceledForever);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_without_retry() {
        let discovery = FakeDiscovery::new(
            vec![Err(RuntimeError::Shutdown("runtime stopping".into()).into())],
            vec![provider("dom", "p1", 1)],
        );
        let arbitrator = arbitrator(&["dom"], qos(60_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert!(matches!(err, ArbitrationError::Runtime(RuntimeError::Shutdown(_))));
        assert_eq!(arbitrator.status(), ArbitrationStatus::ArbitrationCanceledForever);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_participant_with_duplicates_cancels() {
        let discovery = FakeDiscovery::new(vec![], vec![provider("dom", "dup", 1), provider("dom", "dup", 2)]);
        let strategy = strategy_for(ArbitrationStrategy::FixedParticipant).unwrap();
        let arbitrator = Arc::new(
            Arbitrator::new(
                vec!["dom".into()],
                "vehicle/Radio",
                qos(60_000, 1_000).with_custom_parameter(crate::arbitration::FIXED_PARTICIPANT_PARAMETER, "dup"),
                discovery.clone(),
                strategy,
            )
            .with_minimum_retry_delay_ms(0),
        );
        arbitrator.start_arbitration();

        let err = arbitrator.wait_for_result().await.unwrap_err();
        assert!(matches!(err, ArbitrationError::Strategy(_)));
        assert_eq!(arbitrator.status(), ArbitrationStatus::ArbitrationCanceledForever);
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_domain_needs_a_provider() {
        let discovery = FakeDiscovery::new(
            vec![Ok(vec![provider("a", "a1", 1)])],
            vec![provider("a", "a1", 1), provider("b", "b1", 1), provider("b", "b2", 9)],
        );
        let arbitrator = arbitrator(&["a", "b", "a"], qos(60_000, 1_000), discovery.clone());
        arbitrator.start_arbitration();

        let result = arbitrator.wait_for_result().await.unwrap();
        assert_eq!(result.participant_ids, HashSet::from(["a1".to_string(), "b2".to_string()]));
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_change_support_filter() {
        let mut supporting = provider("dom", "supporting", 1);
        supporting.entry.qos.supports_on_change_subscriptions = true;
        let discovery = FakeDiscovery::new(vec![], vec![provider("dom", "fast", 50), supporting]);
        let arbitrator = arbitrator(
            &["dom"],
            qos(10_000, 1_000).with_provider_must_support_on_change(true),
            discovery,
        );
        arbitrator.start_arbitration();

        let result = arbitrator.wait_for_result().await.unwrap();
        assert!(result.participant_ids.contains("supporting"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_sees_status_changes_and_result() {
        let discovery = FakeDiscovery::new(vec![], vec![provider("dom", "p1", 1)]);
        let arbitrator = arbitrator(&["dom"], qos(10_000, 1_000), discovery);
        let listener = Arc::new(RecordingListener::default());
        arbitrator.set_arbitration_listener(listener.clone());
        arbitrator.start_arbitration();
        arbitrator.wait_for_result().await.unwrap();

        assert_eq!(
            *listener.events.lock(),
            vec![
                "ArbitrationRunning".to_string(),
                "ArbitrationSuccessful".to_string(),
                "success [\"p1\"]".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_listener_gets_result_exactly_once() {
        let discovery = FakeDiscovery::new(vec![], vec![]);
        let arbitrator = arbitrator(&["dom"], qos(0, 1_000), discovery);
        arbitrator.start_arbitration();
        arbitrator.wait_for_result().await.unwrap_err();

        let late = Arc::new(RecordingListener::default());
        arbitrator.set_arbitration_listener(late.clone());
        let later = Arc::new(RecordingListener::default());
        arbitrator.set_arbitration_listener(later.clone());

        let events = late.events.lock().clone();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("error Unable to find provider in time"));
        assert!(later.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_custom_strategy_requires_a_function() {
        let discovery = FakeDiscovery::new(vec![], vec![]);
        let mut custom = qos(1_000, 1_000);
        custom.arbitration_strategy = ArbitrationStrategy::Custom;
        let settings = DiscoverySettings::default();

        let result = Arbitrator::for_qos(vec!["dom".into()], "vehicle/Radio", custom, discovery, &settings);
        assert!(matches!(result, Err(ArbitrationError::Strategy(_))));
    }
}
