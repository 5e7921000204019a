use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;

/// Id shown for the latest snapshot in tables and exports.
pub const CURRENT_ID: &str = "current";

/// One sensor snapshot as stored in the realtime database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "SoilMoisture")]
    pub soil_moisture: i64,
    #[serde(rename = "WaterLevelPercent")]
    pub water_level_percent: f64,
    #[serde(rename = "PumpStatus")]
    pub pump_status: String,
    #[serde(rename = "WaterAlert")]
    pub water_alert: String,
    #[serde(rename = "MotionDetected", default)]
    pub motion_detected: bool,
}

impl SensorReading {
    pub fn pump_on(&self) -> bool {
        self.pump_status == "ON"
    }

    pub fn alert_level(&self) -> AlertLevel {
        AlertLevel::from_alert(&self.water_alert)
    }

    /// A negative water level is the sensor's fault sentinel.
    pub fn water_sensor_fault(&self) -> bool {
        self.water_level_percent < 0.0
    }
}

/// A reading as held by the store: either the latest snapshot or a
/// historical entry keyed by the database's own id.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Current(SensorReading),
    Historical { id: String, reading: SensorReading },
}

impl Reading {
    pub fn historical(id: impl Into<String>, reading: SensorReading) -> Self {
        Reading::Historical {
            id: id.into(),
            reading,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Reading::Current(_) => CURRENT_ID,
            Reading::Historical { id, .. } => id,
        }
    }

    pub fn reading(&self) -> &SensorReading {
        match self {
            Reading::Current(reading) => reading,
            Reading::Historical { reading, .. } => reading,
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, Reading::Current(_))
    }

    /// Numeric value of a historical id, used for display ordering.
    pub fn numeric_id(&self) -> Option<f64> {
        match self {
            Reading::Current(_) => None,
            Reading::Historical { id, .. } => id.trim().parse::<f64>().ok(),
        }
    }
}

/// Display ordering: the current reading leads, historical entries follow by
/// ascending numeric id, and ids that are not numbers go last by text.
pub fn display_cmp(a: &Reading, b: &Reading) -> Ordering {
    match (a.is_current(), b.is_current()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => match (a.numeric_id(), b.numeric_id()) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.id().cmp(b.id())),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.id().cmp(b.id()),
        },
    }
}

#[derive(Serialize)]
struct ReadingRow<'a> {
    id: &'a str,
    current: bool,
    #[serde(flatten)]
    reading: &'a SensorReading,
    alert_level: AlertLevel,
    alert_class: &'static str,
    pump_class: &'static str,
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reading = self.reading();
        ReadingRow {
            id: self.id(),
            current: self.is_current(),
            reading,
            alert_level: reading.alert_level(),
            alert_class: reading.alert_level().css_class(),
            pump_class: pump_css_class(&reading.pump_status),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Low,
    Severe,
}

impl AlertLevel {
    pub fn from_alert(alert: &str) -> Self {
        match alert {
            "Normal" => AlertLevel::Normal,
            "Low" => AlertLevel::Low,
            _ => AlertLevel::Severe,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            AlertLevel::Normal => "text-green-400",
            AlertLevel::Low => "text-yellow-400",
            AlertLevel::Severe => "text-red-400",
        }
    }
}

pub fn pump_css_class(status: &str) -> &'static str {
    if status == "ON" {
        "text-green-400"
    } else {
        "text-red-400"
    }
}

/// Phase of the polling-driven view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Idle,
    Loading,
}

/// Chat log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub message: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(message.into(), true)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(message.into(), false)
    }

    fn new(message: String, is_user: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message,
            is_user,
            timestamp: Utc::now(),
        }
    }
}

/// REST API response for the reading store
#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub data: Vec<Reading>,
    pub total: usize,
    pub phase: PollPhase,
    pub version: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
pub(crate) fn sample(temperature: f64, humidity: f64) -> SensorReading {
    SensorReading {
        temperature,
        humidity,
        soil_moisture: 2100,
        water_level_percent: 64.5,
        pump_status: "OFF".to_string(),
        water_alert: "Normal".to_string(),
        motion_detected: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_database_keys() {
        let json = r#"{
            "Humidity": 71,
            "PumpStatus": "ON",
            "SoilMoisture": 4095,
            "Temperature": 29.1,
            "WaterAlert": "Sensor Error",
            "WaterLevelPercent": -1
        }"#;

        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.temperature, 29.1);
        assert_eq!(reading.humidity, 71.0);
        assert_eq!(reading.soil_moisture, 4095);
        assert!(reading.pump_on());
        assert!(!reading.motion_detected);
        assert!(reading.water_sensor_fault());
    }

    #[test]
    fn test_fault_sentinel_is_severe() {
        let mut reading = sample(25.0, 60.0);
        reading.water_level_percent = -1.0;
        reading.water_alert = "Sensor Error".to_string();

        let level = reading.alert_level();
        assert_eq!(level, AlertLevel::Severe);
        assert_eq!(level.css_class(), "text-red-400");
        assert_ne!(level.css_class(), AlertLevel::Normal.css_class());
        assert_ne!(level.css_class(), AlertLevel::Low.css_class());
    }

    #[test]
    fn test_pump_class() {
        assert_eq!(pump_css_class("ON"), "text-green-400");
        assert_eq!(pump_css_class("OFF"), "text-red-400");
        assert_eq!(pump_css_class("on"), "text-red-400");
    }

    #[test]
    fn test_reading_ids() {
        let current = Reading::Current(sample(20.0, 50.0));
        let past = Reading::historical("7", sample(21.0, 51.0));

        assert_eq!(current.id(), CURRENT_ID);
        assert!(current.numeric_id().is_none());
        assert_eq!(past.id(), "7");
        assert_eq!(past.numeric_id(), Some(7.0));
    }

    #[test]
    fn test_display_order() {
        let mut readings = vec![
            Reading::historical("10", sample(20.0, 50.0)),
            Reading::historical("legacy", sample(20.0, 50.0)),
            Reading::historical("2", sample(20.0, 50.0)),
            Reading::Current(sample(20.0, 50.0)),
        ];
        readings.sort_by(display_cmp);

        let ids: Vec<&str> = readings.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![CURRENT_ID, "2", "10", "legacy"]);
    }

    #[test]
    fn test_reading_serializes_flat_row() {
        let value = serde_json::to_value(Reading::historical("3", sample(22.0, 55.0))).unwrap();

        assert_eq!(value["id"], "3");
        assert_eq!(value["current"], false);
        assert_eq!(value["Temperature"], 22.0);
        assert_eq!(value["alert_level"], "normal");
        assert_eq!(value["pump_class"], "text-red-400");
    }
}
