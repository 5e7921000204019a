use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FORECAST_DAYS: u32 = 7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub localtime: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentWeather {
    /// Absent when the API omits current conditions. Temperature advice and
    /// alerts are skipped then.
    pub temp_c: Option<f64>,
    pub feelslike_c: f64,
    pub humidity: f64,
    pub wind_kph: f64,
    pub precip_mm: f64,
    pub uv: f64,
    pub cloud: f64,
    pub dewpoint_c: f64,
    pub pressure_mb: f64,
    pub vis_km: f64,
    pub condition: Condition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaySummary {
    pub maxtemp_c: f64,
    pub mintemp_c: f64,
    pub avghumidity: f64,
    pub daily_chance_of_rain: f64,
    pub condition: Condition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HourForecast {
    pub time: String,
    pub temp_c: f64,
    pub chance_of_rain: f64,
    pub condition: Condition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastDay {
    pub date: String,
    pub day: DaySummary,
    pub hour: Vec<HourForecast>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    error: Option<ApiError>,
    location: Option<Location>,
    current: Option<CurrentWeather>,
    #[serde(default)]
    forecast: Forecast,
}

/// Client for the weather forecast API.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Current conditions and the 7-day forecast for a city name or a
    /// `lat,lon` pair.
    pub async fn forecast(&self, location: &str) -> Result<WeatherReport> {
        let url = format!("{}/forecast.json", self.base_url);
        let days = FORECAST_DAYS.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("days", days.as_str()),
                ("aqi", "yes"),
                ("alerts", "yes"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: ForecastResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(Error::Upstream(error.message));
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        debug!("Weather forecast received for {}", location);
        Ok(WeatherReport::build(
            body.location.unwrap_or_default(),
            body.current.unwrap_or_default(),
            body.forecast,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConditionSplit {
    pub sunny: u8,
    pub cloudy: u8,
    pub rainy: u8,
}

impl ConditionSplit {
    /// Rough sunny/cloudy/rainy split from precipitation, condition text and
    /// cloud cover. Presentational only.
    pub fn estimate(current: &CurrentWeather) -> Self {
        let (sunny, cloudy, rainy) = if current.precip_mm > 0.0
            || current.condition.text.to_lowercase().contains("rain")
        {
            (10, 20, 70)
        } else if current.cloud > 70.0 {
            (20, 70, 10)
        } else if current.cloud > 30.0 {
            (40, 50, 10)
        } else {
            (70, 25, 5)
        };
        Self {
            sunny,
            cloudy,
            rainy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertChip {
    pub label: &'static str,
    pub class: &'static str,
}

/// Farming advice for the current conditions.
pub fn recommendations(current: &CurrentWeather, today: Option<&DaySummary>) -> Vec<&'static str> {
    let mut advice = Vec::new();
    if current.temp_c.is_some_and(|t| t > 35.0) {
        advice.push("High temperature! Irrigate to protect crops.");
    }
    if current.humidity > 80.0 {
        advice.push("High humidity, watch for fungal diseases.");
    }
    if current.wind_kph > 25.0 {
        advice.push("Strong wind expected, avoid spraying pesticides.");
    }
    if current.precip_mm > 0.0 {
        advice.push("Rainfall detected, adjust irrigation accordingly.");
    }
    if current.uv > 7.0 {
        advice.push("High UV index, protect sun-sensitive crops.");
    }
    if today.map_or(0.0, |d| d.daily_chance_of_rain) > 70.0 {
        advice.push("High chance of rain, delay fertilizer application and plan drainage.");
    }
    if current.temp_c.is_some_and(|t| t < 10.0) {
        advice.push("Low temperature, protect frost-sensitive plants and cover seedlings.");
    }
    advice
}

pub fn alert_chips(current: &CurrentWeather, today: Option<&DaySummary>) -> Vec<AlertChip> {
    let rain_chance = if current.precip_mm > 0.0 {
        100.0
    } else {
        today.map_or(0.0, |d| d.daily_chance_of_rain)
    };

    let mut chips = Vec::new();
    if current.temp_c.is_some_and(|t| t >= 35.0) {
        chips.push(AlertChip {
            label: "High Temperature",
            class: "bg-red-500/20 text-red-300 border-red-500/30",
        });
    }
    if current.humidity >= 80.0 {
        chips.push(AlertChip {
            label: "High Humidity",
            class: "bg-cyan-500/20 text-cyan-300 border-cyan-500/30",
        });
    }
    if current.wind_kph >= 25.0 {
        chips.push(AlertChip {
            label: "Strong Wind",
            class: "bg-blue-500/20 text-blue-300 border-blue-500/30",
        });
    }
    if rain_chance >= 60.0 {
        chips.push(AlertChip {
            label: "Rain Likely",
            class: "bg-indigo-500/20 text-indigo-300 border-indigo-500/30",
        });
    }
    if current.uv >= 7.0 {
        chips.push(AlertChip {
            label: "High UV",
            class: "bg-yellow-500/20 text-yellow-300 border-yellow-500/30",
        });
    }
    if current.temp_c.is_some_and(|t| t <= 10.0) {
        chips.push(AlertChip {
            label: "Cold Conditions",
            class: "bg-slate-500/20 text-slate-300 border-slate-500/30",
        });
    }
    chips
}

/// "Today", "Tomorrow", or the short weekday of the forecast day.
pub fn day_label(index: usize, date: &str) -> String {
    match index {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.format("%a").to_string())
            .unwrap_or_else(|_| date.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyOutlook {
    pub label: String,
    pub date: String,
    pub summary: DaySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub location: Location,
    pub current: CurrentWeather,
    pub split: ConditionSplit,
    pub recommendations: Vec<&'static str>,
    pub alerts: Vec<AlertChip>,
    /// Today's hours, every second hour.
    pub hourly: Vec<HourForecast>,
    pub daily: Vec<DailyOutlook>,
}

impl WeatherReport {
    pub fn build(location: Location, current: CurrentWeather, forecast: Forecast) -> Self {
        let today = forecast.forecastday.first().map(|d| &d.day);
        let split = ConditionSplit::estimate(&current);
        let recommendations = recommendations(&current, today);
        let alerts = alert_chips(&current, today);

        let hourly = forecast
            .forecastday
            .first()
            .map(|d| d.hour.iter().step_by(2).cloned().collect())
            .unwrap_or_default();

        let daily = forecast
            .forecastday
            .into_iter()
            .enumerate()
            .map(|(index, day)| DailyOutlook {
                label: day_label(index, &day.date),
                date: day.date,
                summary: day.day,
            })
            .collect();

        Self {
            location,
            current,
            split,
            recommendations,
            alerts,
            hourly,
            daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(temp_c: f64, cloud: f64, precip_mm: f64) -> CurrentWeather {
        CurrentWeather {
            temp_c: Some(temp_c),
            humidity: 50.0,
            cloud,
            precip_mm,
            condition: Condition {
                text: "Partly cloudy".to_string(),
                icon: String::new(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_condition_split() {
        let rainy = ConditionSplit::estimate(&current(25.0, 10.0, 1.2));
        assert_eq!((rainy.sunny, rainy.cloudy, rainy.rainy), (10, 20, 70));

        let overcast = ConditionSplit::estimate(&current(25.0, 80.0, 0.0));
        assert_eq!(overcast.cloudy, 70);

        let mixed = ConditionSplit::estimate(&current(25.0, 50.0, 0.0));
        assert_eq!((mixed.sunny, mixed.cloudy), (40, 50));

        let clear = ConditionSplit::estimate(&current(25.0, 5.0, 0.0));
        assert_eq!(clear.sunny, 70);
    }

    #[test]
    fn test_rain_in_condition_text() {
        let mut weather = current(25.0, 5.0, 0.0);
        weather.condition.text = "Light Rain shower".to_string();

        assert_eq!(ConditionSplit::estimate(&weather).rainy, 70);
    }

    #[test]
    fn test_recommendations_and_alerts() {
        let mut weather = current(36.0, 10.0, 0.0);
        weather.uv = 8.0;
        let today = DaySummary {
            daily_chance_of_rain: 75.0,
            ..Default::default()
        };

        let advice = recommendations(&weather, Some(&today));
        assert_eq!(advice.len(), 3);
        assert!(advice[0].starts_with("High temperature"));

        let labels: Vec<&str> = alert_chips(&weather, Some(&today))
            .iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["High Temperature", "Rain Likely", "High UV"]);
    }

    #[test]
    fn test_cold_conditions() {
        let weather = current(8.0, 10.0, 0.0);
        let labels: Vec<&str> = alert_chips(&weather, None).iter().map(|c| c.label).collect();

        assert_eq!(labels, vec!["Cold Conditions"]);
        assert_eq!(recommendations(&weather, None).len(), 1);
    }

    #[test]
    fn test_day_labels() {
        assert_eq!(day_label(0, "2024-06-03"), "Today");
        assert_eq!(day_label(1, "2024-06-04"), "Tomorrow");
        assert_eq!(day_label(2, "2024-06-05"), "Wed");
        assert_eq!(day_label(3, "garbage"), "garbage");
    }

    #[test]
    fn test_report_thins_hours() {
        let forecast = Forecast {
            forecastday: vec![ForecastDay {
                date: "2024-06-03".to_string(),
                day: DaySummary::default(),
                hour: (0..24)
                    .map(|h| HourForecast {
                        time: format!("2024-06-03 {:02}:00", h),
                        ..Default::default()
                    })
                    .collect(),
            }],
        };

        let report = WeatherReport::build(Location::default(), current(25.0, 5.0, 0.0), forecast);
        assert_eq!(report.hourly.len(), 12);
        assert_eq!(report.hourly[1].time, "2024-06-03 02:00");
        assert_eq!(report.daily[0].label, "Today");
    }

    #[test]
    fn test_missing_current_raises_no_temperature_alerts() {
        let body: ForecastResponse =
            serde_json::from_str(r#"{"location":{"name":"Tirupati"}}"#).unwrap();
        let report = WeatherReport::build(
            body.location.unwrap_or_default(),
            body.current.unwrap_or_default(),
            body.forecast,
        );

        assert_eq!(report.location.name, "Tirupati");
        assert!(report.current.temp_c.is_none());
        assert!(report.alerts.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_decode_error_body() {
        let body: ForecastResponse =
            serde_json::from_str(r#"{"error":{"code":1006,"message":"No matching location found."}}"#)
                .unwrap();

        assert_eq!(body.error.unwrap().message, "No matching location found.");
    }
}
