//! # Arbitration
//!
//! Picks the provider a proxy talks to. The [`Arbitrator`] drives lookups and
//! retries; the strategy functions in [`strategy`] make the actual choice.

pub mod arbitrator;
pub mod strategy;

pub use arbitrator::{
    ArbitrationListener, ArbitrationResult, ArbitrationStatus, Arbitrator, DEFAULT_MINIMUM_RETRY_DELAY_MS,
};
pub use strategy::{
    strategy_for, ArbitrationStrategyFunction, FixedParticipant, HighestPriority, Keyword, LastSeen,
    FIXED_PARTICIPANT_PARAMETER, KEYWORD_PARAMETER,
};
