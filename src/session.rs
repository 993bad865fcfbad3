use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;

use crate::cache::{ApplyOutcome, LocationCache};
use crate::config::UnsubscribePolicy;
use crate::error::{Error, FetchError};
use crate::messages::{LocationUpdate, TransportEvent};
use crate::selection::Selection;
use crate::subscription::{SubscriptionState, SubscriptionTracker};
use crate::tracker::{Location, Tracker};
use crate::transport::{ConnectionManager, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Disconnected,
}

/// What the console renders.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub loading: bool,
    pub error: Option<String>,
    pub status: ConnectionStatus,
    pub selected: Option<Tracker>,
    pub subscription: Option<SubscriptionState>,
}

impl Snapshot {
    pub fn location(&self) -> Option<Location> {
        self.selected.as_ref().and_then(|t| t.location)
    }
}

/// Everything the live tracking view owns, for as long as it is active.
///
/// Only [`TrackingSession::activate`] creates one and [`TrackingSession::deactivate`]
/// consumes it, so nothing can reach the location cache after teardown.
pub struct TrackingSession<T: Transport> {
    connection: ConnectionManager<T>,
    subscriptions: SubscriptionTracker,
    cache: LocationCache,
    selection: Selection,
    status: ConnectionStatus,
    loading: bool,
    error: Option<String>,
}

impl<T: Transport> TrackingSession<T> {
    pub fn activate(
        transport: T,
        policy: UnsubscribePolicy,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let mut connection = ConnectionManager::new(transport);
        connection.connect(events);
        TrackingSession {
            connection,
            subscriptions: SubscriptionTracker::new(policy),
            cache: LocationCache::default(),
            selection: Selection::default(),
            status: ConnectionStatus::Connecting,
            loading: true,
            error: None,
        }
    }

    /// Applies the outcome of the tracker list fetch.
    pub fn load(&mut self, result: Result<Vec<Tracker>, FetchError>) {
        self.loading = false;
        match result {
            Ok(trackers) => {
                info!("Loaded {} trackers", trackers.len());
                self.error = None;
                self.cache = LocationCache::new(trackers);
                if !self.selection.auto_select(self.cache.trackers()) {
                    // Selected before the list arrived.
                    if let Some(id) = self.selection.id().filter(|id| self.cache.get(id).is_none()) {
                        warn!("Selected tracker {id} is not in the tracker list");
                    }
                }
                self.follow_selection();
            }
            Err(err) => self.error = Some(err.to_string()),
        }
    }

    pub fn select(&mut self, tracker_id: &str) -> Result<(), Error> {
        if !self.cache.is_empty() && self.cache.get(tracker_id).is_none() {
            return Err(Error::UnknownTracker(tracker_id.to_string()));
        }
        if self.selection.select(tracker_id) {
            info!("Selected tracker {tracker_id}");
            self.follow_selection();
        }
        Ok(())
    }

    fn follow_selection(&mut self) {
        if let Some(selected) = self.selection.id() {
            self.cache.reset_sequence(selected);
            let known = self.cache.ids();
            self.subscriptions.follow(&self.connection, selected, &known);
        }
    }

    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.status = ConnectionStatus::Connected;
                // Publishers may have restarted their numbering meanwhile.
                self.cache.reset_sequences();
                self.subscriptions
                    .resubscribe(&self.connection, self.selection.id());
            }
            TransportEvent::Disconnected => self.status = ConnectionStatus::Disconnected,
            TransportEvent::Reconnecting { attempt, delay } => {
                warn!("Reconnecting (attempt {attempt}) in {delay:?}");
                self.status = ConnectionStatus::Reconnecting { attempt, delay };
            }
            TransportEvent::GaveUp => self.status = ConnectionStatus::Disconnected,
            TransportEvent::LocationUpdate(update) => {
                self.apply(&update);
            }
        }
    }

    pub fn apply(&mut self, update: &LocationUpdate) -> ApplyOutcome {
        let outcome = self.cache.apply(update);
        if outcome == ApplyOutcome::Applied {
            self.subscriptions.confirm(&update.tracker_id);
        }
        outcome
    }

    pub fn trackers(&self) -> &[Tracker] {
        self.cache.trackers()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.id()
    }

    pub fn snapshot(&self) -> Snapshot {
        let selected = self.selection.id();
        Snapshot {
            loading: self.loading,
            error: self.error.clone(),
            status: self.status,
            selected: selected.and_then(|id| self.cache.get(id)).cloned(),
            subscription: selected.and_then(|id| self.subscriptions.state(id)),
        }
    }

    pub fn deactivate(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.connection.has_connection() {
            info!("Closing tracking session");
            self.connection.disconnect();
        }
    }
}

impl<T: Transport> Drop for TrackingSession<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
