/// RuuviTag manufacturer data decoding
use log::debug;

use crate::models::Measurements;
use crate::utils::round2;

const DATA_FORMAT_3: u8 = 3; // RAWv1
const DATA_FORMAT_5: u8 = 5; // RAWv2
const FORMAT_3_LEN: usize = 14;
const FORMAT_5_LEN: usize = 24;

/// Decode a RuuviTag manufacturer payload (company ID already stripped)
///
/// The first byte selects the data format. Formats 3 and 5 carry
/// environmental measurements; anything else is not ours to decode.
///
/// # Returns
/// Some(Measurements) when the format is recognized, None otherwise.
/// Individual measurements may still be absent in format 5.
pub fn decode(payload: &[u8]) -> Option<Measurements> {
    match payload.first() {
        Some(&DATA_FORMAT_3) => decode_format_3(payload),
        Some(&DATA_FORMAT_5) => decode_format_5(payload),
        Some(other) => {
            debug!("Unsupported RuuviTag data format {}", other);
            None
        }
        None => None,
    }
}

/// Decode data format 3 (RAWv1)
///
/// - Byte 1: Humidity (0.5% resolution)
/// - Byte 2: Temperature integer part, bit 7 is the sign
/// - Byte 3: Temperature fraction (0.01°C)
/// - Bytes 4-5: Pressure (unsigned 16-bit, +50000 Pa offset)
/// - Bytes 6-13: Acceleration and battery (not used here)
fn decode_format_3(data: &[u8]) -> Option<Measurements> {
    if data.len() < FORMAT_3_LEN {
        debug!("Format 3 payload too short: len={}", data.len());
        return None;
    }

    let humidity = data[1] as f64 * 0.5;

    let magnitude = (data[2] & 0x7f) as f64 + data[3] as f64 / 100.0;
    let temperature = if data[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    let pressure = (u16::from_be_bytes([data[4], data[5]]) as f64 + 50000.0) / 100.0;

    Some(Measurements {
        humidity: Some(round2(humidity)),
        temperature: Some(round2(temperature)),
        pressure: Some(round2(pressure)),
    })
}

/// Decode data format 5 (RAWv2)
///
/// - Bytes 1-2: Temperature (signed 16-bit, 0.005°C resolution, 0x8000 = invalid)
/// - Bytes 3-4: Humidity (unsigned 16-bit, 0.0025% resolution, 0xFFFF = invalid)
/// - Bytes 5-6: Pressure (unsigned 16-bit, +50000 Pa offset, 0xFFFF = invalid)
/// - Bytes 7-23: Acceleration, power info, movement, sequence, MAC (not used here)
fn decode_format_5(data: &[u8]) -> Option<Measurements> {
    if data.len() < FORMAT_5_LEN {
        debug!("Format 5 payload too short: len={}", data.len());
        return None;
    }

    let raw_temperature = i16::from_be_bytes([data[1], data[2]]);
    let raw_humidity = u16::from_be_bytes([data[3], data[4]]);
    let raw_pressure = u16::from_be_bytes([data[5], data[6]]);

    let temperature = (raw_temperature != i16::MIN).then(|| round2(raw_temperature as f64 * 0.005));
    let humidity = (raw_humidity != u16::MAX).then(|| round2(raw_humidity as f64 * 0.0025));
    let pressure =
        (raw_pressure != u16::MAX).then(|| round2((raw_pressure as f64 + 50000.0) / 100.0));

    Some(Measurements {
        humidity,
        temperature,
        pressure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn decodes_format_5() {
        let m = decode(&hex("0512FC5394C37C0004FFFC040CAC364200CDCBB8334C884F")).unwrap();
        assert_eq!(m.temperature, Some(24.3));
        assert_eq!(m.humidity, Some(53.49));
        assert_eq!(m.pressure, Some(1000.44));
    }

    #[test]
    fn format_5_invalid_markers_become_absent() {
        let m = decode(&hex("058000FFFFFFFF800080008000FFFFFFFFFFFFFFFFFFFFFF")).unwrap();
        assert!(m.is_empty());

        // Only humidity marked invalid
        let m = decode(&hex("0512FCFFFFC37C0004FFFC040CAC364200CDCBB8334C884F")).unwrap();
        assert_eq!(m.humidity, None);
        assert_eq!(m.temperature, Some(24.3));
        assert_eq!(m.pressure, Some(1000.44));
    }

    #[test]
    fn decodes_format_3() {
        let m = decode(&hex("03291A1ECE1EFC18F94202CA0B53")).unwrap();
        assert_eq!(m.humidity, Some(20.5));
        assert_eq!(m.temperature, Some(26.3));
        assert_eq!(m.pressure, Some(1027.66));
    }

    #[test]
    fn format_3_negative_temperature() {
        let m = decode(&hex("03298145CE1EFC18F94202CA0B53")).unwrap();
        assert_eq!(m.temperature, Some(-1.69));
    }

    #[test]
    fn rejects_unknown_format_and_short_payloads() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&hex("0412FC5394C37C")), None);
        assert_eq!(decode(&hex("0512FC5394C37C")), None);
        assert_eq!(decode(&hex("03291A1E")), None);
    }
}
