use serde::Serialize;

use crate::types::{Ballot, VoteOption};

// ---------------------------------------------------------------------------
// Score result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionScore {
    pub key: String,
    /// Raw sum of ballot weights for this option.
    pub score: f64,
    /// score / total_weight × 100, rounded to 2 decimal places.
    /// 0 when the poll collected no weight at all.
    pub normalized_score: f64,
    /// Every recorded ballot counts here, zero-weight ones included.
    pub ballot_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Verdict {
    /// A single option holds the strictly positive maximum score.
    Winner(String),
    /// Two or more options share the non-zero maximum.
    Tie,
    /// Total weight is zero — nobody voted, or only zero-stake voters did.
    None,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Winner(key) => write!(f, "winner={key}"),
            Verdict::Tie => write!(f, "tie"),
            Verdict::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub options: Vec<OptionScore>,
    pub total_weight: f64,
    pub winner: Verdict,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Turns raw ballots into per-option scores, normalized percentages and a
/// winner verdict. Pure and deterministic: same ballots in, same result out,
/// so a retried resolution recomputes identical scores.
///
/// Ballots whose key matches no option are ignored (cannot happen when the
/// ballots were built from the poll's own option set).
pub fn aggregate(options: &[VoteOption], ballots: &[Ballot]) -> ScoreResult {
    let mut scored: Vec<OptionScore> = options
        .iter()
        .map(|opt| {
            let mut score = 0.0;
            let mut ballot_count = 0;
            for ballot in ballots.iter().filter(|b| b.option_key == opt.key) {
                score += ballot.weight;
                ballot_count += 1;
            }
            OptionScore {
                key: opt.key.clone(),
                score,
                normalized_score: 0.0,
                ballot_count,
            }
        })
        .collect();

    let total_weight: f64 = scored.iter().map(|o| o.score).sum();

    if total_weight <= 0.0 {
        // "No winner" covers both nobody-voted and only-zero-stake-voted.
        return ScoreResult {
            options: scored,
            total_weight: 0.0,
            winner: Verdict::None,
        };
    }

    for opt in &mut scored {
        opt.normalized_score = round2(opt.score / total_weight * 100.0);
    }

    // Winner selection compares the raw scores — normalizing first could
    // manufacture a false tie out of two scores that round to the same 2dp.
    let max_score = scored.iter().map(|o| o.score).fold(0.0_f64, f64::max);
    let mut at_max = scored.iter().filter(|o| o.score == max_score);
    let winner = match (at_max.next(), at_max.next()) {
        (Some(single), None) => Verdict::Winner(single.key.clone()),
        _ => Verdict::Tie,
    };

    ScoreResult {
        options: scored,
        total_weight,
        winner,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(key: &str) -> VoteOption {
        VoteOption {
            key: key.to_string(),
            outcome_ticker: Some(format!("{key}-TOKEN")),
        }
    }

    fn ballot(voter: &str, key: &str, weight: f64) -> Ballot {
        Ballot {
            voter_id: voter.to_string(),
            option_key: key.to_string(),
            weight,
        }
    }

    #[test]
    fn no_ballots_means_no_winner() {
        let result = aggregate(&[opt("a"), opt("b")], &[]);
        assert_eq!(result.winner, Verdict::None);
        assert_eq!(result.total_weight, 0.0);
        assert!(result.options.iter().all(|o| o.normalized_score == 0.0));
    }

    #[test]
    fn all_zero_weight_ballots_mean_no_winner_but_are_counted() {
        let ballots = vec![ballot("v1", "a", 0.0), ballot("v2", "a", 0.0), ballot("v3", "b", 0.0)];
        let result = aggregate(&[opt("a"), opt("b")], &ballots);
        assert_eq!(result.winner, Verdict::None);
        // Zero-stake voters still show up in the tallies.
        assert_eq!(result.options[0].ballot_count, 2);
        assert_eq!(result.options[1].ballot_count, 1);
    }

    #[test]
    fn strict_maximum_wins() {
        let ballots = vec![
            ballot("v1", "a", 10.0),
            ballot("v2", "a", 5.0),
            ballot("v3", "b", 10.0),
        ];
        let result = aggregate(&[opt("a"), opt("b")], &ballots);
        assert_eq!(result.winner, Verdict::Winner("a".to_string()));
        assert_eq!(result.options[0].score, 15.0);
        assert_eq!(result.options[0].normalized_score, 60.0);
        assert_eq!(result.options[1].normalized_score, 40.0);
    }

    #[test]
    fn equal_nonzero_maximum_is_a_tie() {
        let ballots = vec![
            ballot("v1", "a", 10.0),
            ballot("v2", "b", 10.0),
            ballot("v3", "c", 3.0),
        ];
        let result = aggregate(&[opt("a"), opt("b"), opt("c")], &ballots);
        assert_eq!(result.winner, Verdict::Tie);
    }

    #[test]
    fn single_nonzero_option_wins() {
        let ballots = vec![ballot("v1", "b", 0.5)];
        let result = aggregate(&[opt("a"), opt("b")], &ballots);
        assert_eq!(result.winner, Verdict::Winner("b".to_string()));
        assert_eq!(result.options[1].normalized_score, 100.0);
    }

    #[test]
    fn unique_max_among_many_options() {
        let ballots = vec![
            ballot("v1", "a", 1.0),
            ballot("v2", "b", 7.0),
            ballot("v3", "c", 2.0),
            ballot("v4", "d", 6.9),
        ];
        let result = aggregate(&[opt("a"), opt("b"), opt("c"), opt("d")], &ballots);
        assert_eq!(result.winner, Verdict::Winner("b".to_string()));
    }

    #[test]
    fn normalized_scores_sum_to_100() {
        // Awkward thirds — the rounded percentages must still land within
        // a cent of 100.
        let ballots = vec![
            ballot("v1", "a", 1.0),
            ballot("v2", "b", 1.0),
            ballot("v3", "c", 1.0),
        ];
        let result = aggregate(&[opt("a"), opt("b"), opt("c")], &ballots);
        let sum: f64 = result.options.iter().map(|o| o.normalized_score).sum();
        assert!((sum - 100.0).abs() <= 0.01, "sum={sum}");

        let ballots = vec![
            ballot("v1", "a", 12.37),
            ballot("v2", "b", 88.11),
            ballot("v3", "c", 0.52),
        ];
        let result = aggregate(&[opt("a"), opt("b"), opt("c")], &ballots);
        let sum: f64 = result.options.iter().map(|o| o.normalized_score).sum();
        assert!((sum - 100.0).abs() <= 0.01, "sum={sum}");
    }

    #[test]
    fn deterministic_for_fixed_input() {
        let options = [opt("a"), opt("b")];
        let ballots = vec![ballot("v1", "a", 3.25), ballot("v2", "b", 1.75)];
        let first = aggregate(&options, &ballots);
        let second = aggregate(&options, &ballots);
        assert_eq!(first, second);
    }
}
