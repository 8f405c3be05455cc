use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::Result;

/// One on-chain address a voter has registered, with the authentication
/// timestamp used to pick the freshest when a voter registered several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterAddress {
    pub address: String,
    pub authenticated_at: DateTime<Utc>,
}

/// Identity boundary: which addresses has this voter authenticated?
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn addresses_for_voter(&self, voter_id: &str) -> Result<Vec<VoterAddress>>;
}

/// Ownership boundary: how much stake does this address hold in the vault?
/// The stake travels as a decimal string, as the vault API reports it.
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    async fn stake(&self, address: &str, vault_address: &str) -> Result<String>;
}

/// Resolves a live weight for every distinct voter. Lookups are independent
/// reads, so they run concurrently; any failure along the way — no
/// registered address, store or oracle error, unparsable or negative stake —
/// degrades that one voter to weight 0 and never aborts the batch.
pub async fn resolve_weights(
    identity: &dyn IdentityStore,
    oracle: &dyn OwnershipOracle,
    vault_address: &str,
    voters: &HashSet<String>,
) -> HashMap<String, f64> {
    let lookups = voters.iter().map(|voter_id| async move {
        let weight = resolve_one(identity, oracle, vault_address, voter_id).await;
        (voter_id.clone(), weight)
    });
    join_all(lookups).await.into_iter().collect()
}

async fn resolve_one(
    identity: &dyn IdentityStore,
    oracle: &dyn OwnershipOracle,
    vault_address: &str,
    voter_id: &str,
) -> f64 {
    let addresses = match identity.addresses_for_voter(voter_id).await {
        Ok(addresses) => addresses,
        Err(e) => {
            warn!(voter_id, error = %e, "identity lookup failed, counting zero stake");
            return 0.0;
        }
    };

    // Voters re-authenticate when they rotate wallets — the most recently
    // authenticated address is the one that speaks for them.
    let Some(latest) = addresses.into_iter().max_by_key(|a| a.authenticated_at) else {
        debug!(voter_id, "voter has no authenticated address, counting zero stake");
        return 0.0;
    };

    let raw = match oracle.stake(&latest.address, vault_address).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(voter_id, address = %latest.address, error = %e, "stake lookup failed, counting zero stake");
            return 0.0;
        }
    };

    match raw.trim().parse::<f64>() {
        Ok(stake) if stake.is_finite() && stake >= 0.0 => stake,
        _ => {
            warn!(voter_id, raw = %raw, "unusable stake value, counting zero stake");
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct FakeIdentity {
        addresses: HashMap<String, Vec<VoterAddress>>,
        fail: bool,
    }

    #[async_trait]
    impl IdentityStore for FakeIdentity {
        async fn addresses_for_voter(&self, voter_id: &str) -> Result<Vec<VoterAddress>> {
            if self.fail {
                return Err(PollError::Lookup("identity store down".to_string()));
            }
            Ok(self.addresses.get(voter_id).cloned().unwrap_or_default())
        }
    }

    struct FakeOracle {
        stakes: HashMap<String, String>,
        fail: bool,
    }

    #[async_trait]
    impl OwnershipOracle for FakeOracle {
        async fn stake(&self, address: &str, _vault_address: &str) -> Result<String> {
            if self.fail {
                return Err(PollError::Lookup("oracle down".to_string()));
            }
            self.stakes
                .get(address)
                .cloned()
                .ok_or_else(|| PollError::Lookup(format!("no balance for {address}")))
        }
    }

    fn addr(address: &str, year: i32) -> VoterAddress {
        VoterAddress {
            address: address.to_string(),
            authenticated_at: Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn voters(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn picks_most_recently_authenticated_address() {
        let identity = FakeIdentity {
            addresses: HashMap::from([(
                "alice".to_string(),
                vec![addr("0xold", 2020), addr("0xnew", 2023), addr("0xmid", 2021)],
            )]),
            fail: false,
        };
        let oracle = FakeOracle {
            stakes: HashMap::from([
                ("0xold".to_string(), "999".to_string()),
                ("0xnew".to_string(), "42.5".to_string()),
            ]),
            fail: false,
        };

        let weights = resolve_weights(&identity, &oracle, "0xvault", &voters(&["alice"])).await;
        assert_eq!(weights["alice"], 42.5);
    }

    #[tokio::test]
    async fn unregistered_voter_counts_zero() {
        let identity = FakeIdentity { addresses: HashMap::new(), fail: false };
        let oracle = FakeOracle { stakes: HashMap::new(), fail: false };

        let weights = resolve_weights(&identity, &oracle, "0xvault", &voters(&["ghost"])).await;
        assert_eq!(weights["ghost"], 0.0);
    }

    #[tokio::test]
    async fn identity_failure_degrades_to_zero_without_erroring() {
        let identity = FakeIdentity { addresses: HashMap::new(), fail: true };
        let oracle = FakeOracle { stakes: HashMap::new(), fail: false };

        let weights = resolve_weights(&identity, &oracle, "0xvault", &voters(&["alice"])).await;
        assert_eq!(weights["alice"], 0.0);
    }

    #[tokio::test]
    async fn oracle_failure_degrades_to_zero_without_erroring() {
        let identity = FakeIdentity {
            addresses: HashMap::from([("alice".to_string(), vec![addr("0xa", 2023)])]),
            fail: false,
        };
        let oracle = FakeOracle { stakes: HashMap::new(), fail: true };

        let weights = resolve_weights(&identity, &oracle, "0xvault", &voters(&["alice"])).await;
        assert_eq!(weights["alice"], 0.0);
    }

    #[tokio::test]
    async fn unusable_stake_values_count_zero() {
        let identity = FakeIdentity {
            addresses: HashMap::from([
                ("bob".to_string(), vec![addr("0xb", 2023)]),
                ("eve".to_string(), vec![addr("0xe", 2023)]),
            ]),
            fail: false,
        };
        let oracle = FakeOracle {
            stakes: HashMap::from([
                ("0xb".to_string(), "not-a-number".to_string()),
                ("0xe".to_string(), "-5".to_string()),
            ]),
            fail: false,
        };

        let weights =
            resolve_weights(&identity, &oracle, "0xvault", &voters(&["bob", "eve"])).await;
        assert_eq!(weights["bob"], 0.0);
        assert_eq!(weights["eve"], 0.0);
    }

    #[tokio::test]
    async fn one_bad_voter_does_not_block_the_batch() {
        let identity = FakeIdentity {
            addresses: HashMap::from([("alice".to_string(), vec![addr("0xa", 2023)])]),
            fail: false,
        };
        let oracle = FakeOracle {
            stakes: HashMap::from([("0xa".to_string(), "10".to_string())]),
            fail: false,
        };

        let weights =
            resolve_weights(&identity, &oracle, "0xvault", &voters(&["alice", "ghost"])).await;
        assert_eq!(weights["alice"], 10.0);
        assert_eq!(weights["ghost"], 0.0);
    }
}
