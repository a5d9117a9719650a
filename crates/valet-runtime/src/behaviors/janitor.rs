use async_trait::async_trait;
use tracing::debug;

use valet_behavior::{Behavior, BehaviorContext, CapabilitySet};
use valet_core::Result;

/// Runs last in the net-tick phase and consumes whatever requests are
/// still unfilled, so nothing downstream of this cycle sees them. The
/// records stay in the store; only the local cycle state is cleared.
pub struct JanitorBehavior;

#[async_trait]
impl Behavior for JanitorBehavior {
    fn name(&self) -> &str {
        "janitor"
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none().net_tick()
    }

    async fn on_net_tick(&self, cx: &BehaviorContext) -> Result<()> {
        let leftovers = cx.sync().unfilled_requests().await;
        if leftovers.is_empty() {
            return Ok(());
        }
        debug!(count = leftovers.len(), "consuming unhandled requests");
        for request in leftovers {
            cx.sync().consume_request(request.id).await;
        }
        Ok(())
    }
}
