//! Persistence of processed scan records.

use crate::base::{Error, Result};
use crate::types::ScanRecord;
use log::{debug, error};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Accepts processed scan records for durable storage.
pub trait ScanSink {
    /// Stores `records` under `identifier`. Fails with `Error::EmptyResult` when there is
    /// nothing to store.
    fn save(&mut self, identifier: &str, records: &[ScanRecord]) -> Result<()>;
}

/// Writes the point cloud as text, one point per line: `x scan_index -y`.
///
/// Points are grouped by record, records in order. The scan index is written as a float so
/// every column parses the same way.
pub fn write_point_cloud(dest: &mut impl Write, records: &[ScanRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(Error::EmptyResult);
    }
    for (index, record) in records.iter().enumerate() {
        for point in record {
            writeln!(dest, "{:?} {:?} {:?}", point.x(), index as f64, 0.0 - point.y())?;
        }
    }
    dest.flush()?;
    Ok(())
}

/// Saves records as `<directory>/<identifier>.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFileSink {
    directory: PathBuf,
}

impl TextFileSink {
    pub fn new(directory: impl Into<PathBuf>) -> TextFileSink {
        TextFileSink {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path the records for `identifier` are written to.
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.directory.join(format!("{}.txt", identifier))
    }
}

impl ScanSink for TextFileSink {
    fn save(&mut self, identifier: &str, records: &[ScanRecord]) -> Result<()> {
        if records.is_empty() {
            return Err(Error::EmptyResult);
        }
        let path = self.path_for(identifier);
        debug!("Saving {} scan records to {}", records.len(), path.display());
        let file = File::create(&path).map_err(|e| {
            error!("Cannot create {}: {}", path.display(), e);
            Error::from(e)
        })?;
        write_point_cloud(&mut BufWriter::new(file), records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanPoint;
    use std::fs;

    #[test]
    fn point_cloud_lines() {
        let records = vec![
            vec![ScanPoint::new(1500, 0), ScanPoint::new(4000, 0)],
            vec![ScanPoint::new(1000, 900_000)],
        ];
        let mut out = Vec::new();
        write_point_cloud(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "1500.0 0.0 0.0");
        assert_eq!(lines[1], "0.0 0.0 0.0");
        let fields: Vec<f64> = lines[2].split(' ').map(|f| f.parse().unwrap()).collect();
        assert!(fields[0].abs() < 1e-6);
        assert_eq!(fields[1], 1.0);
        assert_eq!(fields[2], -1000.0);
    }

    #[test]
    fn empty_records_are_rejected() {
        let mut out = Vec::new();
        assert!(matches!(
            write_point_cloud(&mut out, &[]),
            Err(Error::EmptyResult)
        ));
        assert!(matches!(
            TextFileSink::new(std::env::temp_dir()).save("nothing", &[]),
            Err(Error::EmptyResult)
        ));
    }

    #[test]
    fn file_sink_writes_identifier_txt() {
        let dir = std::env::temp_dir().join(format!("lms400-export-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut sink = TextFileSink::new(&dir);

        sink.save("BOXANDDOC", &[vec![ScanPoint::new(2000, 0)]])
            .unwrap();
        let written = fs::read_to_string(dir.join("BOXANDDOC.txt")).unwrap();
        assert_eq!(written, "2000.0 0.0 0.0\n");

        fs::remove_dir_all(&dir).unwrap();
    }
}
