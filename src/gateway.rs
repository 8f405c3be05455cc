use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PollDefinition, PollMessageRef, ResultReport};

/// Chat-platform boundary: posting the poll, registering the reaction
/// affordances voters click on, reading them back, and reporting results.
///
/// Session management, embed rendering and delivery guarantees all live on
/// the implementation side; the engine only sees structured data.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Posts the poll message and returns where ballots will be collected.
    async fn post_poll(&self, definition: &PollDefinition) -> Result<PollMessageRef>;

    /// Seeds one reaction affordance on the poll message. Called once per
    /// vote option, in option order.
    async fn add_vote_marker(&self, message: &PollMessageRef, option_key: &str) -> Result<()>;

    /// Returns the ids of voters who reacted with `option_key`, up to
    /// `limit` (platform fetch cap). Implementations exclude the engine's
    /// own seed reaction.
    async fn fetch_voters(
        &self,
        message: &PollMessageRef,
        option_key: &str,
        limit: u32,
    ) -> Result<Vec<String>>;

    /// Posts the resolution report as a reply to the poll message.
    async fn post_result(&self, message: &PollMessageRef, report: &ResultReport) -> Result<()>;

    /// Tells voters the poll is void — the rollback path when no resolution
    /// trigger could be registered.
    async fn post_cancellation(&self, message: &PollMessageRef, reason: &str) -> Result<()>;
}
