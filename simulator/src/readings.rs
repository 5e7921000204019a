use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Reading in the realtime-database field layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
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
    #[serde(rename = "MotionDetected")]
    pub motion_detected: bool,
}

// Raw ADC value above which the soil counts as dry.
const DRY_SOIL: i64 = 3000;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn water_alert(level: f64) -> &'static str {
    if level < 20.0 {
        "Severe"
    } else if level < 40.0 {
        "Low"
    } else {
        "Normal"
    }
}

pub fn generate_reading(rng: &mut impl Rng, fault_rate: f64) -> SensorReading {
    let temperature = if rng.gen_bool(0.02) {
        rng.gen_range(38.0..48.0) // 2% heat spikes
    } else {
        rng.gen_range(20.0..35.0)
    };
    let humidity = rng.gen_range(40.0..70.0);
    let soil_moisture = rng.gen_range(1200..4095);

    let (water_level_percent, water_alert) = if rng.gen_bool(fault_rate) {
        (-1.0, "Sensor Error")
    } else {
        let level = round1(rng.gen_range(5.0..100.0));
        (level, water_alert(level))
    };

    // Pump runs on dry soil while there is water to pump.
    let pump_on = soil_moisture > DRY_SOIL && water_level_percent >= 20.0;

    SensorReading {
        temperature: round1(temperature),
        humidity: round1(humidity),
        soil_moisture,
        water_level_percent,
        pump_status: if pump_on { "ON" } else { "OFF" }.to_string(),
        water_alert: water_alert.to_string(),
        motion_detected: rng.gen_bool(0.3),
    }
}

/// In-memory stand-in for the `Current` and `History` nodes.
#[derive(Debug, Default)]
pub struct Database {
    pub current: Option<SensorReading>,
    pub history: BTreeMap<u64, SensorReading>,
    next_id: u64,
    capacity: usize,
}

impl Database {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 1,
            capacity,
            ..Default::default()
        }
    }

    /// Archives the current reading under the next numeric key and installs
    /// `reading` as current. The oldest entries go once over capacity.
    pub fn advance(&mut self, reading: SensorReading) {
        if let Some(previous) = self.current.replace(reading) {
            self.history.insert(self.next_id, previous);
            self.next_id += 1;
        }
        while self.history.len() > self.capacity {
            self.history.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_readings_are_plausible() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let r = generate_reading(&mut rng, 0.0);
            assert!((20.0..=48.0).contains(&r.temperature));
            assert!((40.0..=70.0).contains(&r.humidity));
            assert!((1200..4095).contains(&r.soil_moisture));
            assert!(r.water_level_percent >= 5.0);
            assert_ne!(r.water_alert, "Sensor Error");
        }
    }

    #[test]
    fn test_fault_sentinel() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = generate_reading(&mut rng, 1.0);
        assert_eq!(r.water_level_percent, -1.0);
        assert_eq!(r.water_alert, "Sensor Error");
        assert_eq!(r.pump_status, "OFF");
    }

    #[test]
    fn test_history_is_capped() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut db = Database::new(3);
        for _ in 0..6 {
            db.advance(generate_reading(&mut rng, 0.0));
        }

        assert!(db.current.is_some());
        assert_eq!(db.history.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_history_serializes_with_string_keys() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut db = Database::new(10);
        db.advance(generate_reading(&mut rng, 0.0));
        db.advance(generate_reading(&mut rng, 0.0));

        let json = serde_json::to_value(&db.history).unwrap();
        assert!(json.get("1").is_some());
    }
}
