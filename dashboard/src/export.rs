use crate::errors::{Error, Result};
use crate::model::Reading;
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

pub const CSV_HEADER: [&str; 7] = [
    "ID",
    "Temperature",
    "Humidity",
    "Soil Moisture",
    "Pump Status",
    "Water Level %",
    "Water Alert",
];

/// Writes `rows` as CSV under the fixed header.
///
/// Fields are written unquoted: every column is numeric or an enumerated
/// status string.
pub fn to_csv(rows: &[Reading]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        let reading = row.reading();
        writer.write_record([
            row.id().to_string(),
            reading.temperature.to_string(),
            reading.humidity.to_string(),
            reading.soil_moisture.to_string(),
            reading.pump_status.clone(),
            reading.water_level_percent.to_string(),
            reading.water_alert.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::new(e.error().kind(), e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| Error::Validation(format!("CSV is not UTF-8: {}", e)))
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("sensor-data-{}.csv", date.format("%Y-%m-%d"))
}
