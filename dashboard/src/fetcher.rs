use crate::errors::{Error, Result};
use crate::metrics::{FETCH_LATENCY_SECONDS, INVALID_READINGS_TOTAL};
use crate::model::{Reading, SensorReading};
use crate::validate::validate;
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

const CURRENT_NODE: &str = "Current";
const HISTORY_NODE: &str = "History";

/// Source of sensor snapshots, read as `[current?, ...history]`.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Reading>>;
}

/// Realtime database accessed through its REST interface.
#[derive(Debug, Clone)]
pub struct RtdbSource {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl RtdbSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    async fn read_node(&self, node: &str) -> Result<Value> {
        let url = format!("{}/{}.json", self.base_url, node);
        let mut request = self.client.get(&url);
        if let Some(auth) = &self.auth {
            request = request.query(&[("auth", auth)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl SensorSource for RtdbSource {
    async fn fetch(&self) -> Result<Vec<Reading>> {
        let start = Instant::now();

        let current = self.read_node(CURRENT_NODE).await?;
        let history = self.read_node(HISTORY_NODE).await?;

        FETCH_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

        let readings = merge(decode_current(current), decode_history(history));
        debug!("Fetched {} readings from {}", readings.len(), self.base_url);
        Ok(readings)
    }
}

/// Joins the snapshot and history into `[current?, ...history]`.
pub fn merge(current: Option<SensorReading>, history: Vec<Reading>) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(history.len() + 1);
    if let Some(reading) = current {
        readings.push(Reading::Current(reading));
    }
    readings.extend(history);
    readings
}

/// Decodes the `Current` node. A null or malformed node counts as absent.
pub fn decode_current(node: Value) -> Option<SensorReading> {
    if node.is_null() {
        return None;
    }
    decode_entry(CURRENT_NODE, node)
}

/// Decodes the `History` node.
///
/// The database returns an object keyed by id, or an array when the keys
/// are dense integers. Array holes are null and are skipped.
pub fn decode_history(node: Value) -> Vec<Reading> {
    match node {
        Value::Null => Vec::new(),
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(id, value)| {
                decode_entry(&id, value).map(|reading| Reading::historical(id, reading))
            })
            .collect(),
        Value::Array(entries) => entries
            .into_iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .filter_map(|(index, value)| {
                let id = index.to_string();
                decode_entry(&id, value).map(|reading| Reading::historical(id, reading))
            })
            .collect(),
        other => {
            warn!("History node has unexpected shape: {}", other);
            INVALID_READINGS_TOTAL.inc();
            Vec::new()
        }
    }
}

fn decode_entry(id: &str, value: Value) -> Option<SensorReading> {
    let reading = match serde_json::from_value::<SensorReading>(value) {
        Ok(reading) => reading,
        Err(e) => {
            warn!("Skipping malformed reading {}: {}", id, e);
            INVALID_READINGS_TOTAL.inc();
            return None;
        }
    };

    if let Err(e) = validate(&reading) {
        warn!("Skipping implausible reading {}: {}", id, e);
        INVALID_READINGS_TOTAL.inc();
        return None;
    }

    Some(reading)
}
