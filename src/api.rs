use log::{debug, error};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_derive::Deserialize;

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::tracker::{Assignment, Location, Tracker, TrackerStatus};

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    status: String,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TrackerRecord {
    tracker_id: String,
    tracker_data: TrackerData,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TrackerData {
    tracker_name: String,
    location: Option<Location>,
    last_updated: Option<String>,
    #[serde(default)]
    status: TrackerStatus,
    battery_level: Option<i64>,
    assigned_to: Option<Assignment>,
}

impl From<TrackerRecord> for Tracker {
    fn from(record: TrackerRecord) -> Self {
        let data = record.tracker_data;
        Tracker {
            id: record.tracker_id,
            name: data.tracker_name,
            location: data.location,
            assignment: data.assigned_to,
            status: data.status,
            battery_level: data.battery_level.unwrap_or(0).clamp(0, 100) as u8,
            last_updated: data.last_updated,
        }
    }
}

fn into_trackers(envelope: Envelope<Vec<TrackerRecord>>) -> Result<Vec<Tracker>, FetchError> {
    match envelope {
        Envelope {
            status,
            data: Some(records),
            ..
        } if status == "success" => Ok(records.into_iter().map(Tracker::from).collect()),
        Envelope { message, .. } => Err(FetchError::Rejected(
            message.unwrap_or_else(|| "Failed to get trackers list".to_string()),
        )),
    }
}

/// Client for the tracker registry.
#[derive(Debug, Clone)]
pub struct TrackerApi {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl TrackerApi {
    pub fn new(config: &ApiConfig) -> Self {
        TrackerApi {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    pub async fn fetch_trackers(&self) -> Result<Vec<Tracker>, FetchError> {
        let result = self.request_trackers().await;
        if let Err(err) = &result {
            error!("Error fetching trackers list: {err}");
        }
        result
    }

    async fn request_trackers(&self) -> Result<Vec<Tracker>, FetchError> {
        let url = format!("{}/trackers", self.url);
        debug!("Fetching tracker list from {url}");

        let mut request = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.access_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {}
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(FetchError::Unauthorized(status.as_u16()));
            }
            status => return Err(FetchError::Status(status.as_u16())),
        }
        into_trackers(response.json().await?)
    }
}
