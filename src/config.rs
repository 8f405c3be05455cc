/// Reaction marker for the approving side of a yes/no poll.
pub const YES_MARKER: &str = "👍";

/// Reaction marker for the rejecting side of a yes/no poll.
pub const NO_MARKER: &str = "👎";

/// Ordinal markers for choose-token polls, one per ticker slot.
/// The slot count is capped by the number of distinct markers available.
pub const CHOICE_MARKERS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];

/// Minimum ticker slots a choose-token poll must offer — a single slot
/// would make the vote meaningless.
pub const MIN_CHOICE_TICKERS: usize = 2;

/// Maximum ticker slots a choose-token poll may offer.
pub const MAX_CHOICE_TICKERS: usize = CHOICE_MARKERS.len();

/// Chat platforms cap a single reaction-user fetch around this size.
/// The engine passes it through to the gateway and tolerates the truncation.
pub const REACTION_FETCH_LIMIT: u32 = 100;

/// Prefix for generated one-shot trigger ids.
pub const TRIGGER_ID_PREFIX: &str = "poll-trigger";
