//! Parser for LMS400 measurement-data telegrams (`mLRreqdata` output).
//!
//! Layout of the payload, big-endian unless noted:
//!
//! | offset | size | field                                                  |
//! |--------|------|--------------------------------------------------------|
//! | 0      | 4    | telegram length echo (ignored)                         |
//! | 4      | 8    | starting angle, 1/10000 degree                         |
//! | 12     | 2    | angular resolution, 1/10000 degree per step            |
//! | 14     | 2    | number of points `N`                                   |
//! | 16     | 8    | scanning frequency and remission scaling (ignored)     |
//! | 24     | 2·N  | distances in millimeters, little-endian                |

use crate::base::{Error, Result, Telegram};
use crate::types::{ScanPoint, ScanRecord};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{error, trace};

const LENGTH_ECHO_OFFSET: usize = 0;
const STARTING_ANGLE_OFFSET: usize = LENGTH_ECHO_OFFSET + 4;
const ANGULAR_RESOLUTION_OFFSET: usize = STARTING_ANGLE_OFFSET + 8;
const POINT_COUNT_OFFSET: usize = ANGULAR_RESOLUTION_OFFSET + 2;
const SCAN_INFO_OFFSET: usize = POINT_COUNT_OFFSET + 2;

/// Size of the fixed header in front of the distance values.
pub const MEASUREMENT_HEADER_SIZE: usize = SCAN_INFO_OFFSET + 8;

const DISTANCE_SIZE: usize = 2;

/// Header fields of a measurement telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementHeader {
    /// Angle of the first point, in 1/10000 degree.
    pub starting_angle: i64,
    /// Angle between consecutive points, in 1/10000 degree.
    pub angular_resolution: u16,
    /// Number of distance values following the header.
    pub point_count: u16,
}

impl MeasurementHeader {
    /// Angle of point `index`, in 1/10000 degree. Saturates instead of overflowing.
    #[inline]
    pub fn angle_of(&self, index: usize) -> i64 {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        self.starting_angle
            .saturating_add(i64::from(self.angular_resolution).saturating_mul(index))
    }

    /// Angle of the last declared point, or `None` when it does not fit an `i64`.
    pub fn last_angle(&self) -> Option<i64> {
        let steps = i64::from(self.point_count.saturating_sub(1));
        self.starting_angle
            .checked_add(i64::from(self.angular_resolution) * steps)
    }

    /// Payload size implied by the header.
    #[inline]
    pub fn telegram_size(&self) -> usize {
        MEASUREMENT_HEADER_SIZE + DISTANCE_SIZE * self.point_count as usize
    }
}

/// Reads the fixed header of a measurement telegram.
pub fn parse_header(payload: &[u8]) -> Result<MeasurementHeader> {
    if payload.len() < MEASUREMENT_HEADER_SIZE {
        error!(
            "Measurement telegram too short for header: {} < {}",
            payload.len(),
            MEASUREMENT_HEADER_SIZE
        );
        return Err(Error::ProtocolError {
            description: format!(
                "measurement telegram of {} bytes is shorter than its {}-byte header",
                payload.len(),
                MEASUREMENT_HEADER_SIZE
            ),
        });
    }

    let raw_angle = BigEndian::read_u64(&payload[STARTING_ANGLE_OFFSET..ANGULAR_RESOLUTION_OFFSET]);
    let starting_angle = i64::try_from(raw_angle).map_err(|_| Error::ProtocolError {
        description: format!("starting angle {} out of range", raw_angle),
    })?;

    let header = MeasurementHeader {
        starting_angle,
        angular_resolution: BigEndian::read_u16(
            &payload[ANGULAR_RESOLUTION_OFFSET..POINT_COUNT_OFFSET],
        ),
        point_count: BigEndian::read_u16(&payload[POINT_COUNT_OFFSET..SCAN_INFO_OFFSET]),
    };
    if header.last_angle().is_none() {
        error!("Measurement angles overflow: {:?}", header);
        return Err(Error::ProtocolError {
            description: format!(
                "{} points of {} from starting angle {} overflow the angle range",
                header.point_count, header.angular_resolution, header.starting_angle
            ),
        });
    }
    trace!("Parsed measurement header: {:?}", header);
    Ok(header)
}

/// Converts one measurement telegram into its points, in measurement order.
///
/// A telegram declaring zero points yields an empty record. Bytes past the last distance
/// value are ignored; a telegram too short for the declared point count is rejected.
pub fn parse_measurement(telegram: &Telegram) -> Result<ScanRecord> {
    let payload = telegram.as_bytes();
    let header = parse_header(payload)?;

    let required = header.telegram_size();
    if payload.len() < required {
        error!(
            "Measurement telegram truncated: {} points need {} bytes, got {}",
            header.point_count,
            required,
            payload.len()
        );
        return Err(Error::ProtocolError {
            description: format!(
                "measurement telegram truncated: expected {} bytes, got {}",
                required,
                payload.len()
            ),
        });
    }

    let points: ScanRecord = payload[MEASUREMENT_HEADER_SIZE..required]
        .chunks_exact(DISTANCE_SIZE)
        .enumerate()
        .map(|(i, raw)| ScanPoint::new(LittleEndian::read_u16(raw), header.angle_of(i)))
        .collect();

    trace!(
        "Parsed {} points ({} valid) starting at {}",
        points.len(),
        points.iter().filter(|p| p.is_valid()).count(),
        header.starting_angle
    );
    Ok(points)
}

#[cfg(test)]
pub(crate) fn build_measurement(
    starting_angle: u64,
    angular_resolution: u16,
    distances: &[u16],
) -> Telegram {
    let mut payload = vec![0u8; MEASUREMENT_HEADER_SIZE + DISTANCE_SIZE * distances.len()];
    let total = payload.len() as u32;
    BigEndian::write_u32(&mut payload[0..4], total);
    BigEndian::write_u64(&mut payload[4..12], starting_angle);
    BigEndian::write_u16(&mut payload[12..14], angular_resolution);
    BigEndian::write_u16(&mut payload[14..16], distances.len() as u16);
    for (i, d) in distances.iter().enumerate() {
        let at = MEASUREMENT_HEADER_SIZE + DISTANCE_SIZE * i;
        LittleEndian::write_u16(&mut payload[at..at + DISTANCE_SIZE], *d);
    }
    Telegram::from(payload)
}
