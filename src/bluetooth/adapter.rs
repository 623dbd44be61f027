/// Maps raw manufacturer data entries to sensor readings
use log::debug;

use crate::bluetooth::decoder;
use crate::models::SensorReading;

pub const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID

/// Turn one manufacturer data entry into a reading for `device_address`.
///
/// Entries from other manufacturers, unrecognized formats and payloads
/// carrying no measurement at all are misses, not errors.
pub fn decode_reading(
    manufacturer_id: u16,
    payload: &[u8],
    device_address: &str,
) -> Option<SensorReading> {
    if manufacturer_id != RUUVITAG_MANUFACTURER_ID {
        debug!(
            "Ignoring manufacturer data 0x{:04X} from {}",
            manufacturer_id, device_address
        );
        return None;
    }

    let measurements = decoder::decode(payload)?;
    if measurements.is_empty() {
        debug!("No valid measurements from {}", device_address);
        return None;
    }

    Some(SensorReading::new(measurements, device_address))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT_5: [u8; 24] = [
        0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC, 0x36,
        0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
    ];

    #[test]
    fn attaches_device_address() {
        let reading = decode_reading(RUUVITAG_MANUFACTURER_ID, &FORMAT_5, "AA:BB:CC:DD:EE:FF")
            .unwrap();
        assert_eq!(
            reading,
            SensorReading {
                humidity: Some(53.49),
                temperature: Some(24.3),
                pressure: Some(1000.44),
                device_id: "AA:BB:CC:DD:EE:FF".to_string(),
            }
        );
    }

    #[test]
    fn ignores_other_manufacturers() {
        assert!(decode_reading(0x004C, &FORMAT_5, "AA:BB:CC:DD:EE:FF").is_none());
    }

    #[test]
    fn all_invalid_measurements_is_a_miss() {
        let mut payload = [0xFFu8; 24];
        payload[0] = 0x05;
        payload[1] = 0x80;
        payload[2] = 0x00;
        assert!(decode_reading(RUUVITAG_MANUFACTURER_ID, &payload, "AA:BB:CC:DD:EE:FF").is_none());
    }
}
