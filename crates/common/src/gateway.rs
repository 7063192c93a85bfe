use async_trait::async_trait;

use crate::{OrderIntent, Result};

/// Abstraction over the order gateway.
///
/// `PaperGateway` in `crates/paper` implements this for simulation; live
/// gateways are external collaborators. Submission is fire-and-forget:
/// fills, rejections, and cancellation acknowledgements arrive later as
/// `ExecutionEvent`s on the controller's event stream, keyed by the
/// intent id.
///
/// Only the strategy controller in `crates/engine` may hold a
/// `dyn OrderGateway`.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit an order intent. An `Err` means the intent never left the
    /// process; it does NOT set a pending flag.
    async fn submit(&self, intent: &OrderIntent) -> Result<()>;

    /// Request cancellation of an in-flight intent. Acknowledged via
    /// `ExecutionEvent::Cancelled`. A replacement order must not be
    /// submitted until the acknowledgement arrives.
    async fn cancel(&self, order_id: &str) -> Result<()>;
}
