//! Encoded polyline codec (precision 1e-5).
//!
//! Route geometry arrives from the planner as an encoded polyline string:
//! each coordinate is stored as a zigzag-encoded delta from the previous one,
//! split into 5-bit chunks offset by 63 so every chunk is a printable ASCII
//! character.

use crate::model::LatLng;

const FACTOR: f64 = 1e5;

/// Lowest and highest valid chunk characters (`?` and `~`).
const MIN_CHUNK: u8 = 63;
const MAX_CHUNK: u8 = 126;

/// A varint longer than this cannot come from a valid coordinate.
const MAX_SHIFT: u32 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolylineError {
    #[error("invalid character {byte:#04x} at byte {position}")]
    InvalidCharacter { position: usize, byte: u8 },

    #[error("encoded value truncated at byte {position}")]
    Truncated { position: usize },

    #[error("encoded value at byte {position} is too long")]
    Overflow { position: usize },

    #[error("latitude without longitude at byte {position}")]
    MissingLongitude { position: usize },
}

/// Decode an encoded polyline into coordinates, in order.
///
/// An empty string decodes to an empty path.
pub fn decode(encoded: &str) -> Result<Vec<LatLng>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut coords = Vec::new();

    while index < bytes.len() {
        lat += next_value(bytes, &mut index)?;
        if index >= bytes.len() {
            return Err(PolylineError::MissingLongitude { position: index });
        }
        lng += next_value(bytes, &mut index)?;

        coords.push(LatLng::new(lat as f64 / FACTOR, lng as f64 / FACTOR));
    }

    Ok(coords)
}

/// Encode coordinates as a polyline string.
pub fn encode(points: &[LatLng]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = (point.lat * FACTOR).round() as i64;
        let lng = (point.lng * FACTOR).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let position = *index;
        let Some(&byte) = bytes.get(position) else {
            return Err(PolylineError::Truncated { position });
        };
        if !(MIN_CHUNK..=MAX_CHUNK).contains(&byte) {
            return Err(PolylineError::InvalidCharacter { position, byte });
        }
        if shift > MAX_SHIFT {
            return Err(PolylineError::Overflow { position });
        }

        let chunk = i64::from(byte - MIN_CHUNK);
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    // Zigzag: the low bit carries the sign.
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((0x20 | (v & 0x1f)) as u8 + MIN_CHUNK));
        v >>= 5;
    }
    out.push(char::from(v as u8 + MIN_CHUNK));
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn assert_close(actual: LatLng, lat: f64, lng: f64) {
        assert!((actual.lat - lat).abs() < 1e-6, "lat {} != {}", actual.lat, lat);
        assert!((actual.lng - lng).abs() < 1e-6, "lng {} != {}", actual.lng, lng);
    }

    #[test]
    fn test_decode_reference_polyline() {
        let coords = decode(REFERENCE).unwrap();

        assert_eq!(coords.len(), 3);
        assert_close(coords[0], 38.5, -120.2);
        assert_close(coords[1], 40.7, -120.95);
        assert_close(coords[2], 43.252, -126.453);
    }

    #[test]
    fn test_encode_reference_polyline() {
        let points = [
            LatLng::new(38.5, -120.2),
            LatLng::new(40.7, -120.95),
            LatLng::new(43.252, -126.453),
        ];

        assert_eq!(encode(&points), REFERENCE);
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("not a polyline"),
            Err(PolylineError::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        // Continuation bit set on the last character.
        assert!(matches!(
            decode("_p~iF~ps|"),
            Err(PolylineError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_dangling_latitude() {
        assert!(matches!(
            decode("_p~iF"),
            Err(PolylineError::MissingLongitude { .. })
        ));
    }
}
