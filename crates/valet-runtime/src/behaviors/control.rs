use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use super::SERVICE_ORIGIN;
use valet_behavior::{Behavior, BehaviorContext, CapabilitySet, LoadError};
use valet_core::{BladeMessage, ControlCommand, Result};

/// Handles `--` control commands from both channels.
///
/// Inbound requests may carry `kill`, `load`, `unload`, and `wipe`; blade
/// responses may carry `postblade`. Every handled request is consumed so
/// that units later in the cycle never see it; every handled blade message
/// is consumed from the remote store.
pub struct ControlBehavior {
    join_token: Option<String>,
}

impl ControlBehavior {
    pub fn new(join_token: Option<String>) -> Self {
        Self { join_token }
    }

    async fn run_request_command(&self, cx: &BehaviorContext, cmd: ControlCommand, request_id: i64) {
        match cmd {
            ControlCommand::Kill => {
                info!(request_id, "kill command received");
                cx.send_response("[kill] stopping service", SERVICE_ORIGIN, request_id)
                    .await;
                cx.wipe_store().await;
                cx.request_stop();
            }
            ControlCommand::Load { manifest, unit } => {
                match cx.loader().load(cx, Path::new(&manifest), &unit).await {
                    Ok(report) => {
                        let text = format!(
                            "[load] loaded '{}' with capabilities {:?}",
                            report.name,
                            report.capabilities.names()
                        );
                        cx.send_response(&text, SERVICE_ORIGIN, request_id).await;
                    }
                    Err(LoadError::Rejected { diagnostics }) => {
                        let detail = LoadError::Rejected { diagnostics }.detail();
                        let text = format!("[load] '{unit}' rejected:\n{detail}");
                        cx.send_response(&text, SERVICE_ORIGIN, request_id).await;
                    }
                    Err(e) => {
                        let text = format!("[load] '{unit}' failed: {e}");
                        cx.send_response(&text, SERVICE_ORIGIN, request_id).await;
                    }
                }
            }
            ControlCommand::Unload { unit } => {
                let text = if cx.loader().unload(&unit) {
                    format!("[unload] removed '{unit}'")
                } else {
                    format!("[unload] no unit named '{unit}'")
                };
                cx.send_response(&text, SERVICE_ORIGIN, request_id).await;
            }
            ControlCommand::Wipe => {
                // No response: the point is to leave the store empty, and a
                // response would outlive the wipe as a fresh record.
                info!(request_id, "wipe command received");
                cx.wipe_store().await;
                cx.sync().consume_request(request_id).await;
            }
            ControlCommand::PostBlade { .. } => {
                cx.send_response(
                    "[error] postblade is only valid from a device channel",
                    SERVICE_ORIGIN,
                    request_id,
                )
                .await;
            }
        }
    }

    async fn run_blade_command(&self, cx: &BehaviorContext, msg: &BladeMessage) {
        match ControlCommand::parse(&msg.data) {
            Ok(ControlCommand::PostBlade { name, token }) => {
                self.handle_postblade(cx, &msg.origin, &name, &token).await;
            }
            Ok(_) => {
                cx.queue_blade_command(
                    &msg.origin,
                    "[error] only postblade is valid from a device channel",
                );
            }
            Err(e) => {
                cx.queue_blade_command(&msg.origin, &format!("[error] {e}"));
            }
        }
        cx.consume_blade_messages(&msg.origin, false, true).await;
    }

    async fn handle_postblade(&self, cx: &BehaviorContext, origin: &str, name: &str, token: &str) {
        let authorized = match &self.join_token {
            Some(expected) => expected == token,
            None => false,
        };
        let echo = if !authorized {
            warn!(blade = name, origin, "postblade refused: bad token");
            "[postblade] refused: bad token".to_string()
        } else if cx.blades().track(name) {
            format!("[postblade] tracking '{name}'")
        } else {
            format!("[postblade] '{name}' already tracked")
        };
        cx.queue_blade_command(origin, &echo);
    }
}

#[async_trait]
impl Behavior for ControlBehavior {
    fn name(&self) -> &str {
        "control"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none().net_tick()
    }

    async fn on_net_tick(&self, cx: &BehaviorContext) -> Result<()> {
        for request in cx.sync().unfilled_requests().await {
            if !ControlCommand::is_command(&request.text) {
                continue;
            }
            match ControlCommand::parse(&request.text) {
                Ok(cmd) => self.run_request_command(cx, cmd, request.id).await,
                Err(e) => {
                    cx.send_response(&format!("[error] {e}"), SERVICE_ORIGIN, request.id)
                        .await;
                }
            }
            // Handled either way; later units skip it this cycle.
            cx.sync().consume_request(request.id).await;
        }

        for msg in cx.blades().drain_responses() {
            if !ControlCommand::is_command(&msg.data) {
                continue;
            }
            self.run_blade_command(cx, &msg).await;
        }
        Ok(())
    }
}
