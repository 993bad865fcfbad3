use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::tracker::Location;

pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";
pub const LOCATION_UPDATE: &str = "tracker:location_update";

/// Payload of both `subscribe` and `unsubscribe`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerRequest {
    pub tracker_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub tracker_id: String,
    pub location: Location,
    /// Monotonic per tracker when the publisher provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    /// Reconnect attempts exhausted; the connection stays down.
    GaveUp,
    LocationUpdate(LocationUpdate),
}
