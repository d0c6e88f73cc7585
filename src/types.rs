use std::fmt;

/// Shortest distance the LMS400 reports reliably, in millimeters.
pub const LMS400_MIN_VALID_DISTANCE_MM: u16 = 700;

/// Longest distance the LMS400 reports reliably, in millimeters.
pub const LMS400_MAX_VALID_DISTANCE_MM: u16 = 3000;

/// Raw angle units per degree (angles are transmitted in 1/10000 degree).
pub const LMS400_ANGLE_UNITS_PER_DEGREE: f64 = 10_000.0;

/// Maps a raw distance into the valid window; anything outside becomes 0 (invalid return).
#[inline]
pub fn normalize_distance(distance_mm: u16) -> u16 {
    if (LMS400_MIN_VALID_DISTANCE_MM..=LMS400_MAX_VALID_DISTANCE_MM).contains(&distance_mm) {
        distance_mm
    } else {
        0
    }
}

/// A single range measurement in polar and Cartesian form.
///
/// Constructed only through [`ScanPoint::new`], which normalizes the distance and derives the
/// Cartesian coordinates, so `x`/`y` always agree with `distance_mm`/`angle_raw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    distance_mm: u16,
    angle_raw: i64,
    x: f64,
    y: f64,
}

impl ScanPoint {
    /// Creates a point from a raw distance and a raw angle.
    ///
    /// # Arguments
    ///
    /// * `distance_mm` - Measured distance in millimeters. Values outside 700..=3000 are stored as 0.
    /// * `angle_raw` - Beam angle in 1/10000 degree.
    pub fn new(distance_mm: u16, angle_raw: i64) -> ScanPoint {
        let distance_mm = normalize_distance(distance_mm);
        let angle = (angle_raw as f64 / LMS400_ANGLE_UNITS_PER_DEGREE).to_radians();
        let distance = f64::from(distance_mm);
        ScanPoint {
            distance_mm,
            angle_raw,
            x: distance * angle.cos(),
            y: distance * angle.sin(),
        }
    }

    /// Normalized distance in millimeters, 0 for an invalid return.
    #[inline]
    pub fn distance_mm(&self) -> u16 {
        self.distance_mm
    }

    /// Angle in 1/10000 degree, as transmitted.
    #[inline]
    pub fn angle_raw(&self) -> i64 {
        self.angle_raw
    }

    #[inline]
    pub fn angle_degrees(&self) -> f64 {
        self.angle_raw as f64 / LMS400_ANGLE_UNITS_PER_DEGREE
    }

    #[inline]
    pub fn angle_radians(&self) -> f64 {
        self.angle_degrees().to_radians()
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Returns `true` unless the distance was out of range.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.distance_mm != 0
    }
}

impl fmt::Display for ScanPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "polar ({} mm, {}°) cartesian ({:.1}, {:.1})",
            self.distance_mm,
            self.angle_degrees(),
            self.x,
            self.y
        )
    }
}

/// The points parsed from one measurement telegram, in increasing angle.
pub type ScanRecord = Vec<ScanPoint>;

/// Whether the device currently holds an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}
