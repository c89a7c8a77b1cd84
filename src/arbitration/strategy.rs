//! Arbitration strategy functions.
//!
//! A strategy is a pure selection over a candidate list and the request's
//! custom parameters. `Ok(None)` means "nothing suitable yet" and makes the
//! arbitrator retry; `Err` ends the arbitration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ArbitrationError;
use crate::types::{ArbitrationStrategy, DiscoveryEntryWithMetaInfo};

/// Custom parameter holding the requested keyword, on both the request and
/// the provider side.
pub const KEYWORD_PARAMETER: &str = "keyword";

/// Custom parameter holding the participant id for fixed participant arbitration.
pub const FIXED_PARTICIPANT_PARAMETER: &str = "fixedParticipantId";

pub trait ArbitrationStrategyFunction: Send + Sync {
    fn select(
        &self,
        parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError>;
}

/// Closures work as custom strategies.
impl<F> ArbitrationStrategyFunction for F
where
    F: Fn(
            &HashMap<String, String>,
            &[DiscoveryEntryWithMetaInfo],
        ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError>
        + Send
        + Sync,
{
    fn select(
        &self,
        parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError> {
        self(parameters, candidates)
    }
}

/// Highest `ProviderQos::priority` wins; earlier candidates win ties.
/// Candidates without a usable address are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestPriority;

impl ArbitrationStrategyFunction for HighestPriority {
    fn select(
        &self,
        _parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError> {
        let mut best: Option<&DiscoveryEntryWithMetaInfo> = None;
        for candidate in candidates.iter().filter(|c| c.has_usable_address()) {
            match best {
                Some(current) if candidate.entry.qos.priority <= current.entry.qos.priority => {}
                _ => best = Some(candidate),
            }
        }
        Ok(best.cloned())
    }
}

/// First candidate whose `keyword` parameter equals the requested keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keyword;

impl ArbitrationStrategyFunction for Keyword {
    fn select(
        &self,
        parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError> {
        let keyword = parameters.get(KEYWORD_PARAMETER).ok_or_else(|| {
            ArbitrationError::Strategy(format!("keyword arbitration requires the '{}' parameter", KEYWORD_PARAMETER))
        })?;
        Ok(candidates
            .iter()
            .find(|c| c.entry.qos.custom_parameter(KEYWORD_PARAMETER) == Some(keyword.as_str()))
            .cloned())
    }
}

/// The one candidate with the requested participant id. Zero or several
/// matches are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedParticipant;

impl ArbitrationStrategyFunction for FixedParticipant {
    fn select(
        &self,
        parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError> {
        let participant_id = parameters.get(FIXED_PARTICIPANT_PARAMETER).ok_or_else(|| {
            ArbitrationError::Strategy(format!(
                "fixed participant arbitration requires the '{}' parameter",
                FIXED_PARTICIPANT_PARAMETER
            ))
        })?;
        let matches: Vec<&DiscoveryEntryWithMetaInfo> = candidates
            .iter()
            .filter(|c| c.participant_id() == participant_id)
            .collect();
        match matches.as_slice() {
            [single] => Ok(Some((*single).clone())),
            _ => Err(ArbitrationError::Strategy(format!(
                "expected exactly one provider for participant {}, found {}",
                participant_id,
                matches.len()
            ))),
        }
    }
}

/// Most recently seen candidate; earlier candidates win ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastSeen;

impl ArbitrationStrategyFunction for LastSeen {
    fn select(
        &self,
        _parameters: &HashMap<String, String>,
        candidates: &[DiscoveryEntryWithMetaInfo],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, ArbitrationError> {
        let mut latest: Option<&DiscoveryEntryWithMetaInfo> = None;
        for candidate in candidates {
            match latest {
                Some(current) if candidate.entry.last_seen_date_ms <= current.entry.last_seen_date_ms => {}
                _ => latest = Some(candidate),
            }
        }
        Ok(latest.cloned())
    }
}

/// Built-in strategy for `strategy`. `Custom` has no built-in function.
pub fn strategy_for(strategy: ArbitrationStrategy) -> Option<Arc<dyn ArbitrationStrategyFunction>> {
    match strategy {
        ArbitrationStrategy::NotSet | ArbitrationStrategy::HighestPriority => Some(Arc::new(HighestPriority)),
        ArbitrationStrategy::Keyword => Some(Arc::new(Keyword)),
        ArbitrationStrategy::FixedParticipant => Some(Arc::new(FixedParticipant)),
        ArbitrationStrategy::LastSeen => Some(Arc::new(LastSeen)),
        ArbitrationStrategy::Custom => None,
    }
}
