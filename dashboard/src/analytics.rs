//! Derived metrics over a chronological reading window.
//!
//! Everything here is a pure function of its input. Values keep full
//! precision; rounding for display lives in [`one_decimal`] and the card
//! helpers and is applied only when rendering.

use crate::model::SensorReading;
use crate::store::TrendPoint;
use serde::Serialize;

/// Points in the single-series temperature chart.
pub const TEMPERATURE_WINDOW: usize = 12;
/// Points in the dual-series comparison charts.
pub const COMPARISON_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub temperature_trend: f64,
    pub temperature_direction: TrendDirection,
    pub humidity_trend: f64,
    pub humidity_direction: TrendDirection,
    pub average_temperature: f64,
    pub average_humidity: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub motion_events: usize,
}

impl Analytics {
    /// Computes the metrics over `readings`, oldest first.
    ///
    /// Returns `None` when fewer than two readings are available.
    pub fn compute(readings: &[SensorReading]) -> Option<Self> {
        let [.., previous, latest] = readings else {
            return None;
        };

        let count = readings.len() as f64;
        let temperature_trend = latest.temperature - previous.temperature;
        let humidity_trend = latest.humidity - previous.humidity;

        Some(Self {
            temperature_trend,
            temperature_direction: TrendDirection::of(temperature_trend),
            humidity_trend,
            humidity_direction: TrendDirection::of(humidity_trend),
            average_temperature: readings.iter().map(|r| r.temperature).sum::<f64>() / count,
            average_humidity: readings.iter().map(|r| r.humidity).sum::<f64>() / count,
            min_temperature: readings
                .iter()
                .map(|r| r.temperature)
                .fold(f64::INFINITY, f64::min),
            max_temperature: readings
                .iter()
                .map(|r| r.temperature)
                .fold(f64::NEG_INFINITY, f64::max),
            motion_events: readings.iter().filter(|r| r.motion_detected).count(),
        })
    }

    /// Metric cards as rendered by the analytics view.
    pub fn cards(&self) -> Vec<MetricCard> {
        vec![
            MetricCard {
                title: "Avg Temperature",
                value: format!("{}°C", one_decimal(self.average_temperature)),
                detail: Some(format!("{}° from last", signed_one_decimal(self.temperature_trend))),
                direction: Some(self.temperature_direction),
            },
            MetricCard {
                title: "Avg Humidity",
                value: format!("{}%", one_decimal(self.average_humidity)),
                detail: Some(format!("{}% from last", signed_one_decimal(self.humidity_trend))),
                direction: Some(self.humidity_direction),
            },
            MetricCard {
                title: "Temperature Range",
                value: format!(
                    "{}° - {}°C",
                    one_decimal(self.min_temperature),
                    one_decimal(self.max_temperature)
                ),
                detail: None,
                direction: None,
            },
            MetricCard {
                title: "Motion Events",
                value: self.motion_events.to_string(),
                detail: None,
                direction: None,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub title: &'static str,
    pub value: String,
    pub detail: Option<String>,
    pub direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: &'static str,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

type Field = fn(&SensorReading) -> f64;

impl Chart {
    fn windowed(items: &[SensorReading], window: usize, series: &[(&'static str, Field)]) -> Self {
        let tail = last_n(items, window);
        Self {
            labels: (1..=tail.len()).map(|i| format!("#{}", i)).collect(),
            series: series
                .iter()
                .map(|&(label, value)| Series {
                    label,
                    data: tail.iter().map(value).collect(),
                })
                .collect(),
        }
    }
}

fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

fn temperature(r: &SensorReading) -> f64 {
    r.temperature
}

fn humidity(r: &SensorReading) -> f64 {
    r.humidity
}

fn soil_moisture(r: &SensorReading) -> f64 {
    r.soil_moisture as f64
}

fn water_level(r: &SensorReading) -> f64 {
    r.water_level_percent
}

/// Last 12 temperatures.
pub fn temperature_chart(readings: &[SensorReading]) -> Chart {
    Chart::windowed(readings, TEMPERATURE_WINDOW, &[("Temperature (°C)", temperature as Field)])
}

/// Last 10 temperature/humidity pairs.
pub fn temperature_humidity_chart(readings: &[SensorReading]) -> Chart {
    Chart::windowed(
        readings,
        COMPARISON_WINDOW,
        &[("Temperature (°C)", temperature as Field), ("Humidity (%)", humidity as Field)],
    )
}

/// Last 10 soil moisture, water level and humidity values.
pub fn soil_water_chart(readings: &[SensorReading]) -> Chart {
    Chart::windowed(
        readings,
        COMPARISON_WINDOW,
        &[
            ("Soil Moisture", soil_moisture as Field),
            ("Water Level (%)", water_level as Field),
            ("Humidity (%)", humidity as Field),
        ],
    )
}

/// Latest soil moisture and water level as a two-bar chart.
pub fn soil_water_snapshot(readings: &[SensorReading]) -> Chart {
    let data = match readings.last() {
        Some(latest) => vec![latest.soil_moisture as f64, latest.water_level_percent],
        None => vec![0.0, 0.0],
    };
    Chart {
        labels: vec!["Soil Moisture".to_string(), "Water Level".to_string()],
        series: vec![Series {
            label: "Current Value",
            data,
        }],
    }
}

/// Rolling charts for the dashboard, fed by successive poll cycles.
pub fn rolling_charts(trend: &[TrendPoint]) -> (Chart, Chart) {
    let labels = |n: usize| (0..n).map(|i| format!("-{}", n - i)).collect::<Vec<_>>();

    let temperatures = last_n(trend, TEMPERATURE_WINDOW);
    let single = Chart {
        labels: labels(temperatures.len()),
        series: vec![Series {
            label: "Temperature (°C)",
            data: temperatures.iter().map(|p| p.temperature).collect(),
        }],
    };

    let pairs = last_n(trend, COMPARISON_WINDOW);
    let dual = Chart {
        labels: labels(pairs.len()),
        series: vec![
            Series {
                label: "Temperature (°C)",
                data: pairs.iter().map(|p| p.temperature).collect(),
            },
            Series {
                label: "Humidity (%)",
                data: pairs.iter().map(|p| p.humidity).collect(),
            },
        ],
    };

    (single, dual)
}

pub fn one_decimal(value: f64) -> String {
    format!("{:.1}", value)
}

pub fn signed_one_decimal(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.1}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Gauge fill in percent of `max`, clamped to `0..=100`.
pub fn gauge_percent(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample;
    use rand::Rng;

    fn temps(values: &[f64]) -> Vec<SensorReading> {
        values.iter().map(|&t| sample(t, 50.0)).collect()
    }

    #[test]
    fn test_basic_trend() {
        let analytics = Analytics::compute(&temps(&[20.0, 25.0])).unwrap();

        assert_eq!(analytics.temperature_trend, 5.0);
        assert_eq!(analytics.temperature_direction, TrendDirection::Up);
        assert_eq!(analytics.average_temperature, 22.5);
        assert_eq!(analytics.min_temperature, 20.0);
        assert_eq!(analytics.max_temperature, 25.0);
    }

    #[test]
    fn test_insufficient_data() {
        assert!(Analytics::compute(&[]).is_none());
        assert!(Analytics::compute(&temps(&[20.0])).is_none());
    }

    #[test]
    fn test_flat_trend_is_down() {
        let analytics = Analytics::compute(&temps(&[21.0, 21.0])).unwrap();
        assert_eq!(analytics.temperature_direction, TrendDirection::Down);
    }

    #[test]
    fn test_average_without_premature_rounding() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let len = rng.gen_range(2..40);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-10.0..45.0)).collect();

            let analytics = Analytics::compute(&temps(&values)).unwrap();
            let expected = values.iter().sum::<f64>() / values.len() as f64;
            assert_eq!(analytics.average_temperature, expected);
        }
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let readings = temps(&[20.15, 20.25, 19.95, 23.45]);

        let first = Analytics::compute(&readings);
        let second = Analytics::compute(&readings);
        assert_eq!(first, second);
    }

    #[test]
    fn test_motion_events() {
        let mut readings = temps(&[20.0, 21.0, 22.0]);
        readings[0].motion_detected = true;
        readings[2].motion_detected = true;

        assert_eq!(Analytics::compute(&readings).unwrap().motion_events, 2);
    }

    #[test]
    fn test_chart_windows() {
        let readings = temps(&(0..15).map(|i| i as f64).collect::<Vec<_>>());

        let single = temperature_chart(&readings);
        assert_eq!(single.labels.len(), 12);
        assert_eq!(single.labels[0], "#1");
        assert_eq!(single.series[0].data[0], 3.0);
        assert_eq!(single.series[0].data[11], 14.0);

        let dual = temperature_humidity_chart(&readings);
        assert_eq!(dual.series.len(), 2);
        assert_eq!(dual.series[0].data.len(), 10);
        assert_eq!(dual.series[0].data[0], 5.0);

        let soil = soil_water_chart(&readings);
        assert_eq!(soil.series.len(), 3);
        assert_eq!(soil.series[0].data.len(), 10);
    }

    #[test]
    fn test_short_windows() {
        let readings = temps(&[20.0, 21.0]);

        assert_eq!(temperature_chart(&readings).labels, vec!["#1", "#2"]);
        assert_eq!(soil_water_snapshot(&[]).series[0].data, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cards_round_only_for_display() {
        let analytics = Analytics::compute(&temps(&[20.04, 20.14])).unwrap();
        let cards = analytics.cards();

        assert_eq!(cards[0].value, "20.1°C");
        assert_eq!(cards[0].detail.as_deref(), Some("+0.1° from last"));
        assert!((analytics.average_temperature - 20.09).abs() < 1e-9);
    }

    #[test]
    fn test_gauge_percent() {
        assert_eq!(gauge_percent(25.0, 50.0), 50.0);
        assert_eq!(gauge_percent(4095.0, 4095.0), 100.0);
        assert_eq!(gauge_percent(120.0, 100.0), 100.0);
        assert_eq!(gauge_percent(-1.0, 100.0), 0.0);
    }
}
