/// Advertisement handling: filter by name, decode, buffer
use log::{debug, warn};
use std::sync::Arc;

use crate::bluetooth::adapter::decode_reading;
use crate::buffer::ReadingBuffer;
use crate::models::RawAdvertisement;
use crate::utils::format_optional;

/// Callback invoked by the scanner for every advertisement it observes
pub type AdvertisementCallback = Box<dyn Fn(RawAdvertisement) + Send + Sync>;

/// Accepts advertisements from the configured sensor and buffers their readings.
///
/// Runs on the scanner's delivery task, so it only decodes and appends.
#[derive(Debug, Clone)]
pub struct AdvertisementHandler {
    sensor_name: String,
    buffer: Arc<ReadingBuffer>,
}

impl AdvertisementHandler {
    pub fn new(sensor_name: impl Into<String>, buffer: Arc<ReadingBuffer>) -> Self {
        AdvertisementHandler {
            sensor_name: sensor_name.into(),
            buffer,
        }
    }

    /// Returns the number of readings appended to the buffer.
    pub fn handle(&self, advertisement: &RawAdvertisement) -> usize {
        if advertisement.device_name != self.sensor_name {
            return 0;
        }

        if advertisement.manufacturer_data.is_empty() {
            warn!(
                "No manufacturer data found for {} ({})",
                advertisement.device_name, advertisement.device_address
            );
            return 0;
        }

        let mut appended = 0;
        for (&manufacturer_id, payload) in &advertisement.manufacturer_data {
            if let Some(reading) =
                decode_reading(manufacturer_id, payload, &advertisement.device_address)
            {
                debug!(
                    "Received data from {}: temp={}°C, humidity={}%, pressure={} hPa",
                    reading.device_id,
                    format_optional(reading.temperature),
                    format_optional(reading.humidity),
                    format_optional(reading.pressure)
                );
                self.buffer.append(reading);
                appended += 1;
            }
        }

        if appended > 0 {
            debug!("{} readings buffered", self.buffer.len());
        }
        appended
    }

    pub fn into_callback(self) -> AdvertisementCallback {
        Box::new(move |advertisement| {
            self.handle(&advertisement);
        })
    }
}
