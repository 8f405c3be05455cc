//! Poll engine for reaction-voted treasury trades.
//!
//! A poll is a time-boxed, stake-weighted vote over a fixed set of options,
//! each bound to a trade outcome. The engine posts the poll through a
//! messaging gateway, registers a one-shot resolution trigger, and at expiry
//! weighs the collected reactions by live vault ownership, picks a winner
//! (or declares a tie / no-winner), fires the trade at most once, reports
//! the result, and cleans up its trigger regardless of how resolution went.
//!
//! All external collaborators — chat platform, identity store, ownership
//! oracle, trade executor, scheduler — sit behind injected traits.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod options;
pub mod stake;
pub mod trade;
pub mod trigger;
pub mod types;

pub use aggregator::{aggregate, OptionScore, ScoreResult, Verdict};
pub use error::{PollError, Result};
pub use gateway::MessagingGateway;
pub use lifecycle::{PollCreated, PollLifecycleManager, ResolveOutcome};
pub use options::{build_definition, build_vote_options};
pub use stake::{IdentityStore, OwnershipOracle, VoterAddress};
pub use trade::TradeExecutor;
pub use trigger::{InProcessScheduler, TriggerScheduler};
pub use types::{
    Ballot, NoTradeReason, PollDefinition, PollKind, PollMessageRef, PollRequest, PollState,
    ResultReport, ScheduledTrigger, TradeOrder, TradeOutcome, TradeReceipt, TriggerPayload,
    VoteOption,
};
