use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::aggregator::{aggregate, Verdict};
use crate::config::REACTION_FETCH_LIMIT;
use crate::error::Result;
use crate::gateway::MessagingGateway;
use crate::options::build_definition;
use crate::stake::{resolve_weights, IdentityStore, OwnershipOracle};
use crate::trade::TradeExecutor;
use crate::trigger::{new_trigger_id, TriggerScheduler};
use crate::types::{
    Ballot, NoTradeReason, PollDefinition, PollMessageRef, PollRequest, PollState, ResultReport,
    ScheduledTrigger, TradeOrder, TradeOutcome, TriggerPayload,
};

/// Returned by `create`: everything the command layer needs to echo back.
#[derive(Debug, Clone)]
pub struct PollCreated {
    pub poll_id: String,
    pub trigger_id: String,
    pub message: PollMessageRef,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Completed(ResultReport),
    /// Duplicate fire for a poll that already resolved — nothing was done.
    AlreadyResolved,
}

/// Orchestrates a poll from creation to resolution.
///
/// Each poll is one `create` and one `resolve`, both running to completion
/// without shared mutable state beyond the per-poll state table — two polls
/// never interact. Collaborators are injected so tests can run the whole
/// lifecycle against fakes.
pub struct PollLifecycleManager {
    gateway: Arc<dyn MessagingGateway>,
    identity: Arc<dyn IdentityStore>,
    oracle: Arc<dyn OwnershipOracle>,
    executor: Arc<dyn TradeExecutor>,
    scheduler: Arc<dyn TriggerScheduler>,
    /// The vault whose share balances weight the votes.
    vault_address: String,
    /// poll_id → lifecycle state. Doubles as the duplicate-fire guard.
    /// Entries exist only while a poll is in flight — terminal polls are
    /// dropped, so the table never grows with engine uptime.
    states: DashMap<String, PollState>,
    /// poll_id → report computed but not yet delivered. Once the trade has
    /// settled, a retry may only re-post this — never re-run the trade.
    pending_reports: DashMap<String, ResultReport>,
}

impl PollLifecycleManager {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        identity: Arc<dyn IdentityStore>,
        oracle: Arc<dyn OwnershipOracle>,
        executor: Arc<dyn TradeExecutor>,
        scheduler: Arc<dyn TriggerScheduler>,
        vault_address: String,
    ) -> Self {
        Self {
            gateway,
            identity,
            oracle,
            executor,
            scheduler,
            vault_address,
            states: DashMap::new(),
            pending_reports: DashMap::new(),
        }
    }

    pub fn state_of(&self, poll_id: &str) -> Option<PollState> {
        self.states.get(poll_id).map(|s| *s)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Validates the request, posts the poll with one reaction affordance per
    /// option, and registers the resolution trigger for `expires_at`.
    ///
    /// A poll must never be live without a resolution path: if the trigger
    /// cannot be registered after the message went out, a cancellation
    /// notice is posted (best effort) and the poll ends `Cancelled`.
    pub async fn create(&self, request: PollRequest) -> Result<PollCreated> {
        // Validation happens before any side effect.
        let definition = build_definition(&request, Utc::now())?;
        let poll_id = definition.poll_id.clone();
        self.states.insert(poll_id.clone(), PollState::Created);

        info!(
            poll_id = %poll_id,
            kind = %definition.kind,
            sell = %definition.sell_ticker,
            amount = %definition.sell_amount,
            expires_at = %definition.expires_at,
            "creating poll"
        );

        let message = match self.gateway.post_poll(&definition).await {
            Ok(message) => message,
            Err(e) => {
                // Nothing went out — no rollback to communicate.
                self.states.remove(&poll_id);
                return Err(e);
            }
        };
        for option in &definition.vote_options {
            if let Err(e) = self.gateway.add_vote_marker(&message, &option.key).await {
                self.cancel(&poll_id, &message, "could not register vote reactions")
                    .await;
                return Err(e);
            }
        }

        let expires_at = definition.expires_at;
        let trigger_id = new_trigger_id();
        let trigger = ScheduledTrigger {
            trigger_id: trigger_id.clone(),
            fires_at: definition.expires_at,
            payload: TriggerPayload {
                poll_id: poll_id.clone(),
                trigger_id: trigger_id.clone(),
                message: message.clone(),
                definition,
            },
        };
        if let Err(e) = self.scheduler.create(trigger).await {
            // The message is already out — roll back visibly.
            self.cancel(&poll_id, &message, "no resolution trigger could be scheduled")
                .await;
            return Err(e);
        }

        self.states.insert(poll_id.clone(), PollState::Open);
        info!(poll_id = %poll_id, trigger_id = %trigger_id, "poll open");

        Ok(PollCreated {
            poll_id,
            trigger_id,
            message,
            expires_at,
        })
    }

    async fn cancel(&self, poll_id: &str, message: &PollMessageRef, reason: &str) {
        warn!(poll_id, reason, state = %PollState::Cancelled, "cancelling poll after partial creation");
        if let Err(e) = self.gateway.post_cancellation(message, reason).await {
            // Nothing left to do — the notice itself failed.
            error!(poll_id, error = %e, "failed to post cancellation notice");
        }
        // Cancelled is terminal — the poll leaves the state table.
        self.states.remove(poll_id);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Invoked by the scheduler at expiry (or by an operator retry). Collects
    /// ballots, weights them with live stake, aggregates, conditionally
    /// executes the winning trade, and posts the result. The trigger is
    /// deleted exactly once per invocation whether or not the inner steps
    /// succeeded.
    pub async fn resolve(&self, payload: TriggerPayload) -> Result<ResolveOutcome> {
        if !self.claim(&payload).await {
            warn!(poll_id = %payload.poll_id, "duplicate resolve fire ignored");
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        let outcome = self.resolve_inner(&payload).await;

        // Release step: cleanup runs no matter how resolution went. A stray
        // trigger is a leak to surface, not a reason to re-fail the poll.
        if let Err(e) = self.scheduler.delete(&payload.trigger_id).await {
            error!(
                poll_id = %payload.poll_id,
                trigger_id = %payload.trigger_id,
                error = %e,
                "trigger cleanup failed, rule may be leaking"
            );
        }

        match outcome {
            Ok(report) => {
                // Resolved is terminal — the poll leaves the state table.
                self.pending_reports.remove(&payload.poll_id);
                self.states.remove(&payload.poll_id);
                info!(
                    poll_id = %payload.poll_id,
                    state = %PollState::Resolved,
                    winner = %report.scores.winner,
                    "poll resolved"
                );
                Ok(ResolveOutcome::Completed(report))
            }
            Err(e) => {
                // Reopen so an operator-driven retry can still resolve it.
                // If the trade already settled, the stashed report makes the
                // retry a re-post only — the executor is never re-invoked.
                self.states.insert(payload.poll_id.clone(), PollState::Open);
                error!(poll_id = %payload.poll_id, error = %e, "poll resolution failed");
                Err(e)
            }
        }
    }

    /// Atomically takes the poll from `Open` to `Resolving`. A poll unknown
    /// to the state table (engine restart) is admitted only while its
    /// trigger is still registered — an absent trigger means cleanup already
    /// ran, so the poll resolved and this fire is a duplicate.
    async fn claim(&self, payload: &TriggerPayload) -> bool {
        match self.states.entry(payload.poll_id.clone()) {
            Entry::Occupied(mut entry) => match entry.get() {
                PollState::Open => {
                    entry.insert(PollState::Resolving);
                    true
                }
                state => {
                    warn!(poll_id = %payload.poll_id, state = %state, "poll is not open");
                    false
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(PollState::Resolving);
                if self.scheduler.is_registered(&payload.trigger_id).await {
                    true
                } else {
                    self.states.remove(&payload.poll_id);
                    false
                }
            }
        }
    }

    async fn resolve_inner(&self, payload: &TriggerPayload) -> Result<ResultReport> {
        // A stashed report means a previous attempt got through the trade but
        // not the announcement. Only the announcement may be retried.
        let pending = self
            .pending_reports
            .get(&payload.poll_id)
            .map(|r| r.clone());
        if let Some(report) = pending {
            info!(poll_id = %payload.poll_id, "re-posting result of an earlier attempt");
            self.gateway.post_result(&payload.message, &report).await?;
            return Ok(report);
        }

        let definition = &payload.definition;
        info!(poll_id = %payload.poll_id, kind = %definition.kind, "resolving poll");

        // Gateway failures here are fatal — without the reactions there is
        // nothing to count.
        let mut voters_by_option: Vec<(String, Vec<String>)> = Vec::new();
        for option in &definition.vote_options {
            let voters = self
                .gateway
                .fetch_voters(&payload.message, &option.key, REACTION_FETCH_LIMIT)
                .await?;
            voters_by_option.push((option.key.clone(), voters));
        }

        // Weights are resolved live at invocation time — stake may have
        // moved since the votes were cast, and the current holdings are
        // what legitimizes the outcome.
        let distinct: HashSet<String> = voters_by_option
            .iter()
            .flat_map(|(_, voters)| voters.iter().cloned())
            .collect();
        let weights = resolve_weights(
            self.identity.as_ref(),
            self.oracle.as_ref(),
            &self.vault_address,
            &distinct,
        )
        .await;

        let ballots: Vec<Ballot> = voters_by_option
            .iter()
            .flat_map(|(key, voters)| {
                voters.iter().map(|voter_id| Ballot {
                    voter_id: voter_id.clone(),
                    option_key: key.clone(),
                    weight: weights.get(voter_id).copied().unwrap_or(0.0),
                })
            })
            .collect();

        let scores = aggregate(&definition.vote_options, &ballots);
        info!(
            poll_id = %payload.poll_id,
            total_weight = scores.total_weight,
            winner = %scores.winner,
            ballots = ballots.len(),
            "ballots aggregated"
        );

        let trade = self.settle_trade(definition, &scores.winner).await;

        let report = ResultReport {
            poll_id: payload.poll_id.clone(),
            kind: definition.kind,
            sell_ticker: definition.sell_ticker.clone(),
            sell_amount: definition.sell_amount.clone(),
            scores,
            trade,
        };

        // The trade has settled at this point. Stash the report before the
        // fallible announcement so a retry can never reach the executor again.
        self.pending_reports
            .insert(payload.poll_id.clone(), report.clone());

        // Silence is never an acceptable terminal state — the report goes
        // out even when nothing could be computed or the trade failed.
        self.gateway.post_result(&payload.message, &report).await?;

        Ok(report)
    }

    /// Executes the trade when the verdict names an option that carries an
    /// outcome ticker. A "no" win, a tie, or a weightless poll records the
    /// reason instead. Executor failures are captured, never rethrown.
    async fn settle_trade(&self, definition: &PollDefinition, winner: &Verdict) -> TradeOutcome {
        let buy_ticker = match winner {
            Verdict::None => {
                return TradeOutcome::Skipped {
                    reason: NoTradeReason::NoVotes,
                }
            }
            Verdict::Tie => {
                return TradeOutcome::Skipped {
                    reason: NoTradeReason::Tie,
                }
            }
            Verdict::Winner(key) => {
                let ticker = definition
                    .vote_options
                    .iter()
                    .find(|o| &o.key == key)
                    .and_then(|o| o.outcome_ticker.clone());
                match ticker {
                    Some(ticker) => ticker,
                    None => {
                        return TradeOutcome::Skipped {
                            reason: NoTradeReason::Declined,
                        }
                    }
                }
            }
        };

        let order = TradeOrder {
            sell_ticker: definition.sell_ticker.clone(),
            sell_amount: definition.sell_amount.clone(),
            buy_ticker,
        };
        info!(
            poll_id = %definition.poll_id,
            sell = %order.sell_ticker,
            amount = %order.sell_amount,
            buy = %order.buy_ticker,
            "executing winning trade"
        );

        match self.executor.execute(&order).await {
            Ok(receipt) if receipt.success => TradeOutcome::Executed {
                tx_hash: receipt.tx_hash,
            },
            Ok(receipt) => {
                let message = receipt
                    .error_message
                    .unwrap_or_else(|| "trade rejected by executor".to_string());
                warn!(poll_id = %definition.poll_id, message = %message, "trade failed");
                TradeOutcome::Failed { message }
            }
            Err(e) => {
                warn!(poll_id = %definition.poll_id, error = %e, "trade execution errored");
                TradeOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
