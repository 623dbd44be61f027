use std::collections::HashMap;
use time::OffsetDateTime;

/// One advertisement as delivered by the scanner. Lives only for the
/// duration of a single callback.
#[derive(Debug, Clone)]
pub struct RawAdvertisement {
    pub device_name: String,
    pub device_address: String,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
}

/// The measurement part of a reading, without the originating address.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
}

impl Measurements {
    pub fn is_empty(&self) -> bool {
        self.humidity.is_none() && self.temperature.is_none() && self.pressure.is_none()
    }
}

/// A decoded sensor reading. Each measurement may be missing on its own
/// when the sensor reports it as invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub device_id: String,
}

impl SensorReading {
    pub fn new(measurements: Measurements, device_id: impl Into<String>) -> Self {
        SensorReading {
            humidity: measurements.humidity,
            temperature: measurements.temperature,
            pressure: measurements.pressure,
            device_id: device_id.into(),
        }
    }

    /// Strip the device address, leaving only the measured values
    pub fn measurements(&self) -> Measurements {
        Measurements {
            humidity: self.humidity,
            temperature: self.temperature,
            pressure: self.pressure,
        }
    }
}

/// Payload for the "current state" record.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestUpdate {
    pub data: Measurements,
    pub last_updated: OffsetDateTime,
}

/// Payload for one appended history row.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub data: SensorReading,
    pub timestamp: OffsetDateTime,
}
