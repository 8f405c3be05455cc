use async_trait::async_trait;

use crate::error::Result;
use crate::types::{TradeOrder, TradeReceipt};

/// Trade execution boundary. Transaction construction, gas estimation and
/// submission all live behind this seam; the engine only hands over the
/// winning order and records the receipt.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Submits the trade. A transport-level failure surfaces as `Err`; a
    /// rejected trade comes back as a receipt with `success == false`.
    /// The lifecycle folds both into the result report — neither aborts
    /// a resolution.
    async fn execute(&self, order: &TradeOrder) -> Result<TradeReceipt>;
}
