use crate::cancel::ResetSignal;
use crate::types::{ScanPoint, ScanRecord};
use log::{debug, trace};

/// Distance of every synthetic point, in millimeters.
pub const SIMULATED_DISTANCE_MM: u16 = 1500;

/// First angle of a synthetic record, in 1/10000 degree (55°).
pub const SIMULATED_STARTING_ANGLE: i64 = 550_000;

/// Step between synthetic points, in 1/10000 degree (0.25°).
pub const SIMULATED_ANGULAR_RESOLUTION: i64 = 2500;

/// Points per synthetic record, covering 55° to 124.75°.
pub const SIMULATED_POINT_COUNT: usize = 280;

/// One synthetic record: a 1.5 m arc over the LMS400 field of view.
pub fn simulated_record() -> ScanRecord {
    (0..SIMULATED_POINT_COUNT)
        .map(|i| {
            ScanPoint::new(
                SIMULATED_DISTANCE_MM,
                SIMULATED_STARTING_ANGLE + SIMULATED_ANGULAR_RESOLUTION * i as i64,
            )
        })
        .collect()
}

/// Produces up to `count` synthetic records without a device.
///
/// A reset requested on `reset` stops generation early and is consumed.
pub fn simulate_scan(count: usize, reset: &ResetSignal) -> Vec<ScanRecord> {
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        if reset.take() {
            debug!("Simulation reset after {} of {} records", records.len(), count);
            break;
        }
        records.push(simulated_record());
    }
    trace!("Simulated {} records", records.len());
    records
}

/// Renders records as text, one line per record: `Scan <i> (x,y) (x,y) ...`.
///
/// Coordinates are truncated to whole millimeters.
pub fn format_scan_history(records: &[ScanRecord]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let points: String = record
            .iter()
            .map(|point| format!(" ({},{})", point.x() as i64, point.y() as i64))
            .collect();
        out.push_str(&format!("Scan {}{}\n", i, points));
    }
    out
}
