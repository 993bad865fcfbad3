use std::collections::HashMap;

use log::{debug, info};

use crate::config::UnsubscribePolicy;
use crate::messages::{SUBSCRIBE, UNSUBSCRIBE};
use crate::transport::{ConnectionManager, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Subscribe sent, nothing received for it yet.
    Requested,
    /// The server is pushing updates for this tracker.
    Confirmed,
    Cancelled,
}

/// Keeps the server pushing updates for the selected tracker only.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    policy: UnsubscribePolicy,
    states: HashMap<String, SubscriptionState>,
    active: Option<String>,
}

impl SubscriptionTracker {
    pub fn new(policy: UnsubscribePolicy) -> Self {
        SubscriptionTracker {
            policy,
            ..Default::default()
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn state(&self, tracker_id: &str) -> Option<SubscriptionState> {
        self.states.get(tracker_id).copied()
    }

    /// No-op when not connected; nothing is recorded for an unsent request.
    pub fn subscribe<T: Transport>(
        &mut self,
        connection: &ConnectionManager<T>,
        tracker_id: &str,
    ) -> bool {
        if !connection.emit(SUBSCRIBE, tracker_id) {
            return false;
        }
        info!("Subscribed to tracker {tracker_id}");
        self.states
            .insert(tracker_id.to_string(), SubscriptionState::Requested);
        self.active = Some(tracker_id.to_string());
        true
    }

    pub fn unsubscribe<T: Transport>(
        &mut self,
        connection: &ConnectionManager<T>,
        tracker_id: &str,
    ) -> bool {
        if !connection.emit(UNSUBSCRIBE, tracker_id) {
            return false;
        }
        debug!("Unsubscribed from tracker {tracker_id}");
        if let Some(state) = self.states.get_mut(tracker_id) {
            *state = SubscriptionState::Cancelled;
        }
        if self.active.as_deref() == Some(tracker_id) {
            self.active = None;
        }
        true
    }

    /// Moves the subscription to `tracker_id` after a selection change.
    pub fn follow<T: Transport>(
        &mut self,
        connection: &ConnectionManager<T>,
        tracker_id: &str,
        known: &[String],
    ) -> bool {
        match self.policy {
            UnsubscribePolicy::Previous => {
                if let Some(previous) = self.active.clone() {
                    if previous == tracker_id {
                        return true;
                    }
                    self.unsubscribe(connection, &previous);
                }
            }
            UnsubscribePolicy::AllKnown => {
                // The active tracker may have been picked before the list loaded.
                if let Some(previous) = self.active.clone() {
                    if !known.contains(&previous) {
                        self.unsubscribe(connection, &previous);
                    }
                }
                for id in known {
                    self.unsubscribe(connection, id);
                }
            }
        }
        self.subscribe(connection, tracker_id)
    }

    /// Marks a requested subscription as live. Returns whether it changed.
    pub fn confirm(&mut self, tracker_id: &str) -> bool {
        match self.states.get_mut(tracker_id) {
            Some(state) if *state == SubscriptionState::Requested => {
                debug!("Subscription to tracker {tracker_id} confirmed");
                *state = SubscriptionState::Confirmed;
                true
            }
            _ => false,
        }
    }

    /// A new connection carries no server-side subscriptions: forget ours and
    /// request `selected` again.
    pub fn resubscribe<T: Transport>(
        &mut self,
        connection: &ConnectionManager<T>,
        selected: Option<&str>,
    ) -> bool {
        for state in self.states.values_mut() {
            *state = SubscriptionState::Cancelled;
        }
        self.active = None;
        match selected {
            Some(tracker_id) => self.subscribe(connection, tracker_id),
            None => false,
        }
    }
}
