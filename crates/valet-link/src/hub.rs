use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

use crate::store::RemoteStore;
use valet_core::BladeMessage;

#[derive(Default)]
struct BladeState {
    /// Outbound commands waiting for the network loop to post, FIFO.
    queue: VecDeque<String>,
    /// Last command seen on the wire for this device.
    last_command: Option<String>,
    /// Last response fetched from this device.
    last_response: Option<String>,
}

/// Tracks the set of named remote devices ("blades"), a per-device outbound
/// FIFO command queue, and the last known command/response for each device.
///
/// The hub never dequeues on its own: posting queued commands to the wire is
/// the network loop's job, one command per device per cycle, so the remote
/// store's write volume stays bounded. Queue and caches are created when a
/// device is first tracked and removed when it is retracted.
#[derive(Default)]
pub struct BladeCommandHub {
    blades: Mutex<HashMap<String, BladeState>>,
}

impl BladeCommandHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a device. Returns false if it was already tracked.
    pub fn track(&self, name: &str) -> bool {
        let mut blades = self.blades.lock();
        if blades.contains_key(name) {
            return false;
        }
        blades.insert(name.to_string(), BladeState::default());
        info!(blade = name, "tracking blade");
        true
    }

    /// Stop tracking a device, dropping its queue and caches.
    pub fn retract(&self, name: &str) -> bool {
        let removed = self.blades.lock().remove(name).is_some();
        if removed {
            info!(blade = name, "retracted blade");
        }
        removed
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.blades.lock().contains_key(name)
    }

    /// Names of all tracked devices, sorted for stable iteration.
    pub fn tracked(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blades.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tracked_count(&self) -> usize {
        self.blades.lock().len()
    }

    /// Queue an outbound command for a device. False when untracked.
    pub fn enqueue(&self, name: &str, data: &str) -> bool {
        let mut blades = self.blades.lock();
        match blades.get_mut(name) {
            Some(state) => {
                state.queue.push_back(data.to_string());
                debug!(blade = name, queued = state.queue.len(), "queued blade command");
                true
            }
            None => false,
        }
    }

    /// The command at the head of a device's queue, without removing it.
    pub fn peek_command(&self, name: &str) -> Option<String> {
        self.blades
            .lock()
            .get(name)
            .and_then(|s| s.queue.front().cloned())
    }

    /// Remove and return the command at the head of a device's queue.
    pub fn pop_command(&self, name: &str) -> Option<String> {
        self.blades
            .lock()
            .get_mut(name)
            .and_then(|s| s.queue.pop_front())
    }

    /// Record the last command seen on the wire for a device.
    pub fn cache_command(&self, origin: &str, data: &str) {
        if let Some(state) = self.blades.lock().get_mut(origin) {
            state.last_command = Some(data.to_string());
        }
    }

    /// Record the last response fetched from a device.
    pub fn cache_response(&self, origin: &str, data: &str) {
        if let Some(state) = self.blades.lock().get_mut(origin) {
            state.last_response = Some(data.to_string());
        }
    }

    pub fn last_command(&self, name: &str) -> Option<String> {
        self.blades.lock().get(name).and_then(|s| s.last_command.clone())
    }

    /// Current cached responses, one per tracked device that has one. The
    /// cache is cleared by [`BladeCommandHub::consume`] or overwritten by
    /// the next sync; reading does not clear it.
    pub fn drain_responses(&self) -> Vec<BladeMessage> {
        let blades = self.blades.lock();
        let mut out: Vec<BladeMessage> = blades
            .iter()
            .filter_map(|(name, state)| {
                state
                    .last_response
                    .as_ref()
                    .map(|data| BladeMessage::new(name.clone(), data.clone()))
            })
            .collect();
        out.sort_by(|a, b| a.origin.cmp(&b.origin));
        out
    }

    /// Delete a device's command and/or response record from the remote
    /// store, clearing the matching local cache on success. Returns true
    /// only if the device is tracked and every requested deletion succeeded.
    pub async fn consume(
        &self,
        store: &dyn RemoteStore,
        name: &str,
        remove_command: bool,
        remove_response: bool,
    ) -> bool {
        if !self.is_tracked(name) {
            return false;
        }

        let mut ok = true;
        if remove_command {
            match store.delete_blade_command(name).await {
                Ok(()) => {
                    if let Some(state) = self.blades.lock().get_mut(name) {
                        state.last_command = None;
                    }
                }
                Err(e) => {
                    tracing::warn!(blade = name, error = %e, "failed to delete blade command");
                    ok = false;
                }
            }
        }
        if remove_response {
            match store.delete_blade_response(name).await {
                Ok(()) => {
                    if let Some(state) = self.blades.lock().get_mut(name) {
                        state.last_response = None;
                    }
                }
                Err(e) => {
                    tracing::warn!(blade = name, error = %e, "failed to delete blade response");
                    ok = false;
                }
            }
        }
        ok
    }
}
