use async_trait::async_trait;
use std::sync::Arc;

use super::SERVICE_ORIGIN;
use valet_behavior::{Behavior, BehaviorContext, CapabilitySet, UnitManifest};
use valet_core::{ControlCommand, Result};

/// Answers every non-command request by echoing its text back, optionally
/// behind a prefix. The stock manifest-buildable unit:
///
/// ```toml
/// [unit]
/// builder = "echo"
///
/// [params]
/// prefix = "you said: "
/// ```
pub struct EchoBehavior {
    prefix: String,
}

impl EchoBehavior {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

/// Builder-table entry for [`EchoBehavior`].
pub fn build(manifest: &UnitManifest) -> Result<Arc<dyn Behavior>> {
    let prefix = manifest
        .params
        .get("prefix")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(Arc::new(EchoBehavior::new(prefix)))
}

#[async_trait]
impl Behavior for EchoBehavior {
    fn name(&self) -> &str {
        "echo"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none().net_tick()
    }

    async fn on_net_tick(&self, cx: &BehaviorContext) -> Result<()> {
        for request in cx.sync().unfilled_requests().await {
            if ControlCommand::is_command(&request.text) {
                continue;
            }
            let reply = format!("{}{}", self.prefix, request.text);
            cx.send_response(&reply, SERVICE_ORIGIN, request.id).await;
        }
        Ok(())
    }
}
