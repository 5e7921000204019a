use crate::errors::{Error, Result};
use crate::model::SensorReading;

const TEMP_MIN: f64 = -50.0;
const TEMP_MAX: f64 = 100.0;
const HUMIDITY_MIN: f64 = 0.0;
const HUMIDITY_MAX: f64 = 100.0;

/// Validates a decoded sensor reading.
///
/// The water level is only required to be finite: negative values are the
/// sensor's fault sentinel and must reach the views untouched.
pub fn validate(reading: &SensorReading) -> Result<()> {
    // Validate temperature
    if !reading.temperature.is_finite()
        || reading.temperature < TEMP_MIN
        || reading.temperature > TEMP_MAX
    {
        return Err(Error::Validation(format!(
            "Temperature {} out of range [{}, {}]",
            reading.temperature, TEMP_MIN, TEMP_MAX
        )));
    }

    // Validate humidity
    if !reading.humidity.is_finite()
        || reading.humidity < HUMIDITY_MIN
        || reading.humidity > HUMIDITY_MAX
    {
        return Err(Error::Validation(format!(
            "Humidity {} out of range [{}, {}]",
            reading.humidity, HUMIDITY_MIN, HUMIDITY_MAX
        )));
    }

    if !reading.water_level_percent.is_finite() {
        return Err(Error::Validation(format!(
            "Water level {} is not a number",
            reading.water_level_percent
        )));
    }

    if reading.soil_moisture < 0 {
        return Err(Error::Validation(format!(
            "Soil moisture {} is negative",
            reading.soil_moisture
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample;

    #[test]
    fn test_valid_reading() {
        assert!(validate(&sample(25.0, 60.0)).is_ok());
    }

    #[test]
    fn test_invalid_temperature() {
        assert!(validate(&sample(150.0, 60.0)).is_err());
    }

    #[test]
    fn test_invalid_humidity() {
        assert!(validate(&sample(25.0, 150.0)).is_err());
    }

    #[test]
    fn test_negative_soil_moisture() {
        let mut reading = sample(25.0, 60.0);
        reading.soil_moisture = -3;

        assert!(validate(&reading).is_err());
    }

    #[test]
    fn test_fault_sentinel_passes() {
        let mut reading = sample(25.0, 60.0);
        reading.water_level_percent = -1.0;
        reading.water_alert = "Sensor Error".to_string();

        assert!(validate(&reading).is_ok());
    }
}
