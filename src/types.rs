use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Poll request — wire shape consumed from the command layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollKind {
    #[serde(rename = "yes-no")]
    YesNo,
    #[serde(rename = "choose-token")]
    ChooseToken,
}

impl std::fmt::Display for PollKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollKind::YesNo => write!(f, "yes-no"),
            PollKind::ChooseToken => write!(f, "choose-token"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    #[serde(rename = "pollType")]
    pub kind: PollKind,
    /// Poll duration in minutes.
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    pub sell_ticker: String,
    /// Kept as a decimal string end to end to avoid precision loss.
    pub sell_amount: String,
    /// The single buy candidate of a yes-no poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_ticker: Option<String>,
    /// The 2–5 buy candidates of a choose-token poll.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buy_tickers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Poll definition — immutable once built
// ---------------------------------------------------------------------------

/// One votable option, bound at build time to the outcome it stands for.
/// `outcome_ticker` is None for options that reject the trade (the "no" side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    /// Reaction symbol — unique within the poll.
    pub key: String,
    pub outcome_ticker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollDefinition {
    pub poll_id: String,
    pub kind: PollKind,
    pub sell_ticker: String,
    pub sell_amount: String,
    pub duration_minutes: u32,
    pub vote_options: Vec<VoteOption>,
    pub created_at: DateTime<Utc>,
    /// Always `created_at + duration_minutes`.
    pub expires_at: DateTime<Utc>,
}

/// Where ballots are collected — set when the poll is posted, read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollMessageRef {
    pub channel_id: String,
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// Lifecycle state
// ---------------------------------------------------------------------------

/// Created → Open → Resolving → Resolved. Cancelled is the rollback terminal
/// for a poll that was posted but never got a resolution trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Created,
    Open,
    Resolving,
    Resolved,
    Cancelled,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PollState::Created => "created",
            PollState::Open => "open",
            PollState::Resolving => "resolving",
            PollState::Resolved => "resolved",
            PollState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Ballots
// ---------------------------------------------------------------------------

/// One voter's reaction to one option, weighted by live stake.
/// Derived at resolution time, never persisted.
#[derive(Debug, Clone)]
pub struct Ballot {
    pub voter_id: String,
    pub option_key: String,
    /// Non-negative; 0 for voters with no resolvable identity or stake.
    pub weight: f64,
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub sell_ticker: String,
    pub sell_amount: String,
    pub buy_ticker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
}

/// Why a resolution ended without invoking the trade executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoTradeReason {
    /// Nobody voted, or everyone who voted holds zero stake.
    NoVotes,
    /// Two or more options share the non-zero maximum score.
    Tie,
    /// The winning option rejects the trade (the "no" side won).
    Declined,
}

impl std::fmt::Display for NoTradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NoTradeReason::NoVotes => "no votes",
            NoTradeReason::Tie => "tie",
            NoTradeReason::Declined => "no",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeOutcome {
    Executed { tx_hash: Option<String> },
    Failed { message: String },
    Skipped { reason: NoTradeReason },
}

// ---------------------------------------------------------------------------
// Result report — posted back to the channel after every resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultReport {
    pub poll_id: String,
    pub kind: PollKind,
    pub sell_ticker: String,
    pub sell_amount: String,
    pub scores: crate::aggregator::ScoreResult,
    pub trade: TradeOutcome,
}

// ---------------------------------------------------------------------------
// Scheduled trigger
// ---------------------------------------------------------------------------

/// Everything `resolve` needs to run without shared state: the scheduler
/// hands this back verbatim at fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub poll_id: String,
    pub trigger_id: String,
    pub message: PollMessageRef,
    pub definition: PollDefinition,
}

impl TriggerPayload {
    /// Scheduler backends that carry opaque string payloads (cron-rule
    /// targets, delayed queues) round-trip through these.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A one-shot future callback: fires at most once at `fires_at`, and must be
/// deletable afterwards whether or not it fired.
#[derive(Debug, Clone)]
pub struct ScheduledTrigger {
    pub trigger_id: String,
    pub fires_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}
