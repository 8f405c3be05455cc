use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::{
    CHOICE_MARKERS, MAX_CHOICE_TICKERS, MIN_CHOICE_TICKERS, NO_MARKER, YES_MARKER,
};
use crate::error::{PollError, Result};
use crate::types::{PollDefinition, PollKind, PollRequest, VoteOption};

/// Maps a poll request onto its canonical vote options.
///
/// Yes/no polls get a fixed 👍/👎 pair where only the approving side carries
/// the buy ticker; choose-token polls get one ordinal-keyed option per ticker
/// slot. Pure — validation failures happen before any side effect.
pub fn build_vote_options(request: &PollRequest) -> Result<Vec<VoteOption>> {
    match request.kind {
        PollKind::YesNo => {
            let buy_ticker = request
                .buy_ticker
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    PollError::Validation("yes-no poll requires a buy ticker".to_string())
                })?;
            Ok(vec![
                VoteOption {
                    key: YES_MARKER.to_string(),
                    outcome_ticker: Some(buy_ticker.to_string()),
                },
                VoteOption {
                    key: NO_MARKER.to_string(),
                    outcome_ticker: None,
                },
            ])
        }
        PollKind::ChooseToken => {
            let slots = &request.buy_tickers;
            if slots.len() < MIN_CHOICE_TICKERS || slots.len() > MAX_CHOICE_TICKERS {
                return Err(PollError::Validation(format!(
                    "choose-token poll needs {MIN_CHOICE_TICKERS}-{MAX_CHOICE_TICKERS} buy tickers, got {}",
                    slots.len()
                )));
            }
            slots
                .iter()
                .enumerate()
                .map(|(i, ticker)| {
                    let ticker = ticker.trim();
                    if ticker.is_empty() {
                        return Err(PollError::Validation(format!(
                            "buy ticker slot {} is empty",
                            i + 1
                        )));
                    }
                    Ok(VoteOption {
                        key: CHOICE_MARKERS[i].to_string(),
                        outcome_ticker: Some(ticker.to_string()),
                    })
                })
                .collect()
        }
    }
}

/// Validates a request and freezes it into an immutable [`PollDefinition`].
pub fn build_definition(request: &PollRequest, now: DateTime<Utc>) -> Result<PollDefinition> {
    if request.duration_minutes == 0 {
        return Err(PollError::Validation(
            "poll duration must be at least one minute".to_string(),
        ));
    }
    if request.sell_ticker.trim().is_empty() {
        return Err(PollError::Validation("sell ticker is empty".to_string()));
    }
    if request.sell_amount.trim().is_empty() {
        return Err(PollError::Validation("sell amount is empty".to_string()));
    }

    let vote_options = build_vote_options(request)?;

    Ok(PollDefinition {
        poll_id: Uuid::new_v4().to_string(),
        kind: request.kind,
        sell_ticker: request.sell_ticker.trim().to_string(),
        sell_amount: request.sell_amount.trim().to_string(),
        duration_minutes: request.duration_minutes,
        vote_options,
        created_at: now,
        expires_at: now + Duration::minutes(i64::from(request.duration_minutes)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
