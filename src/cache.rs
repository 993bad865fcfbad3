use std::collections::HashMap;

use log::{debug, warn};

use crate::messages::LocationUpdate;
use crate::tracker::{Location, Tracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    UnknownTracker,
    Stale { received: u64, current: u64 },
}

/// Last-known positions for the fetched tracker list.
///
/// Entries are never added or removed by updates; only the location of a
/// matching tracker is replaced.
#[derive(Debug, Default)]
pub struct LocationCache {
    trackers: Vec<Tracker>,
    sequences: HashMap<String, u64>,
}

impl LocationCache {
    pub fn new(trackers: Vec<Tracker>) -> Self {
        LocationCache {
            trackers,
            sequences: HashMap::new(),
        }
    }

    pub fn apply(&mut self, update: &LocationUpdate) -> ApplyOutcome {
        let Some(tracker) = self
            .trackers
            .iter_mut()
            .find(|t| t.id == update.tracker_id)
        else {
            debug!("Ignoring location for unknown tracker {}", update.tracker_id);
            return ApplyOutcome::UnknownTracker;
        };

        if let Some(received) = update.sequence {
            if let Some(&current) = self.sequences.get(&update.tracker_id) {
                if received <= current {
                    warn!(
                        "Dropping stale location for tracker {} (sequence {} <= {})",
                        update.tracker_id, received, current
                    );
                    return ApplyOutcome::Stale { received, current };
                }
            }
            self.sequences.insert(update.tracker_id.clone(), received);
        }

        tracker.location = Some(update.location);
        ApplyOutcome::Applied
    }

    /// Forgets the last sequence seen for a tracker, so a publisher that
    /// restarted its numbering is accepted again.
    pub fn reset_sequence(&mut self, id: &str) {
        self.sequences.remove(id);
    }

    pub fn reset_sequences(&mut self) {
        self.sequences.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Tracker> {
        self.trackers.iter().find(|t| t.id == id)
    }

    pub fn location(&self, id: &str) -> Option<Location> {
        self.get(id).and_then(|t| t.location)
    }

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn ids(&self) -> Vec<String> {
        self.trackers.iter().map(|t| t.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerStatus;

    fn update(id: &str, latitude: f64, longitude: f64, sequence: Option<u64>) -> LocationUpdate {
        LocationUpdate {
            tracker_id: id.to_string(),
            location: Location {
                latitude,
                longitude,
            },
            sequence,
        }
    }

    fn fleet() -> Vec<Tracker> {
        let mut t1 = Tracker::new("T1", "Van 1").with_location(1.0, 2.0);
        t1.status = TrackerStatus::Active;
        t1.battery_level = 80;
        vec![t1, Tracker::new("T2", "Van 2").with_location(3.0, 4.0)]
    }

    #[test]
    fn test_replaces_location_only() {
        let before = fleet();
        let mut cache = LocationCache::new(before.clone());

        assert_eq!(cache.apply(&update("T1", 9.0, 9.0, None)), ApplyOutcome::Applied);

        let t1 = cache.get("T1").unwrap();
        assert_eq!(
            *t1,
            Tracker {
                location: Some(Location {
                    latitude: 9.0,
                    longitude: 9.0
                }),
                ..before[0].clone()
            }
        );
        assert_eq!(cache.get("T2").unwrap(), &before[1]);
    }

    #[test]
    fn test_unknown_tracker_is_ignored() {
        let before = fleet();
        let mut cache = LocationCache::new(before.clone());

        assert_eq!(
            cache.apply(&update("T9", 0.0, 0.0, None)),
            ApplyOutcome::UnknownTracker
        );
        assert_eq!(cache.trackers(), before.as_slice());
    }

    #[test]
    fn test_unsequenced_updates_apply_in_receipt_order() {
        let mut cache = LocationCache::new(fleet());
        cache.apply(&update("T2", 5.0, 5.0, None));
        cache.apply(&update("T2", 6.0, 6.0, None));
        assert_eq!(cache.location("T2").map(|l| l.latitude), Some(6.0));
    }

    #[test]
    fn test_stale_sequence_is_rejected() {
        let mut cache = LocationCache::new(fleet());
        assert_eq!(cache.apply(&update("T1", 5.0, 5.0, Some(7))), ApplyOutcome::Applied);
        assert_eq!(
            cache.apply(&update("T1", 4.0, 4.0, Some(6))),
            ApplyOutcome::Stale {
                received: 6,
                current: 7
            }
        );
        assert_eq!(
            cache.apply(&update("T1", 4.0, 4.0, Some(7))),
            ApplyOutcome::Stale {
                received: 7,
                current: 7
            }
        );
        assert_eq!(cache.location("T1").map(|l| l.latitude), Some(5.0));

        // Sequences are tracked per tracker.
        assert_eq!(cache.apply(&update("T2", 1.0, 1.0, Some(1))), ApplyOutcome::Applied);
    }

    #[test]
    fn test_reset_sequence_accepts_restarted_publisher() {
        let mut cache = LocationCache::new(fleet());
        cache.apply(&update("T1", 5.0, 5.0, Some(40)));
        cache.apply(&update("T2", 5.0, 5.0, Some(40)));

        cache.reset_sequence("T1");
        assert_eq!(cache.apply(&update("T1", 6.0, 6.0, Some(1))), ApplyOutcome::Applied);
        assert!(matches!(
            cache.apply(&update("T2", 6.0, 6.0, Some(1))),
            ApplyOutcome::Stale { .. }
        ));

        cache.reset_sequences();
        assert_eq!(cache.apply(&update("T2", 6.0, 6.0, Some(1))), ApplyOutcome::Applied);
    }
}
