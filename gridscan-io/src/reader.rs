//! Memory-mapped trip record reader.
//!
//! Input is a comma-separated text file whose first line is a header. Each
//! following non-blank line is one record; two of its columns hold the
//! latitude and longitude of the point. Fields are split on `,` only, quoted
//! fields are not supported.

use crate::{Error, Result};
use gridscan_core::{BoundingBox, LabeledPoint};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the reader was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Positions of the coordinate columns, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Latitude column.
    pub lat_column: usize,
    /// Longitude column.
    pub long_column: usize,
}

impl Default for RecordLayout {
    fn default() -> Self {
        // Pickup latitude and longitude of the taxi trip record format.
        Self {
            lat_column: 8,
            long_column: 9,
        }
    }
}

/// Loaded points with their tight bounds.
#[derive(Debug, Clone)]
pub struct PointSet {
    /// Points in file order, ids starting at 1, all unclassified.
    pub points: Vec<LabeledPoint>,
    /// Smallest box holding every point (inclusive corners).
    pub bounds: BoundingBox,
}

impl PointSet {
    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no points were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reader for trip record files.
pub struct TripRecordReader {
    reader: MappedFileReader,
    layout: RecordLayout,
}

impl TripRecordReader {
    /// Opens a trip record file with the default column layout.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self {
            reader,
            layout: RecordLayout::default(),
        })
    }

    /// Sets the column layout.
    #[must_use]
    pub fn with_layout(mut self, layout: RecordLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Parses every record into a point.
    ///
    /// # Errors
    /// Returns [`Error::EmptyInput`] if there is no data row after the
    /// header, and [`Error::MalformedRecord`] or [`Error::MissingField`] for
    /// the first bad record.
    pub fn read_points(&self) -> Result<PointSet> {
        let set = parse_records(self.reader.as_bytes(), self.layout)?;
        log::info!(
            "loaded {} points from {}",
            set.len(),
            self.reader.path().display()
        );
        Ok(set)
    }
}

/// Parses trip records from an in-memory buffer.
///
/// Lines are parsed in parallel; on failure the error of the earliest bad
/// line is returned.
///
/// # Errors
/// Same as [`TripRecordReader::read_points`].
pub fn parse_records(data: &[u8], layout: RecordLayout) -> Result<PointSet> {
    // Line numbers are 1-based and the header is line 1.
    let lines: Vec<(usize, &[u8])> = data
        .split(|&b| b == b'\n')
        .enumerate()
        .skip(1)
        .map(|(k, line)| (k + 1, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .collect();

    if lines.is_empty() {
        return Err(Error::EmptyInput);
    }

    let parsed: Vec<Result<(f64, f64)>> = lines
        .par_iter()
        .map(|&(line_no, line)| parse_line(line_no, line, layout))
        .collect();

    let mut points = Vec::with_capacity(parsed.len());
    for (id, record) in (1u64..).zip(parsed) {
        let (lat, long) = record?;
        points.push(LabeledPoint::new(id, lat, long));
    }

    let bounds = points
        .par_iter()
        .map(|p| BoundingBox::point(p.point))
        .reduce_with(|a, b| a.union(&b))
        .ok_or(Error::EmptyInput)?;

    Ok(PointSet { points, bounds })
}

fn parse_line(line_no: usize, line: &[u8], layout: RecordLayout) -> Result<(f64, f64)> {
    let fields: Vec<&[u8]> = line.split(|&b| b == b',').collect();
    let lat = parse_field(line_no, &fields, layout.lat_column)?;
    let long = parse_field(line_no, &fields, layout.long_column)?;
    Ok((lat, long))
}

fn parse_field(line_no: usize, fields: &[&[u8]], column: usize) -> Result<f64> {
    let raw = fields.get(column).ok_or(Error::MissingField {
        line: line_no,
        column,
    })?;
    let malformed = || Error::MalformedRecord {
        line: line_no,
        column,
        value: String::from_utf8_lossy(raw).into_owned(),
    };
    let text = std::str::from_utf8(raw).map_err(|_| malformed())?;
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "vendor,pickup,dropoff,passengers,distance,rate,flag,payment,lat,long\n";

    fn record(lat: &str, long: &str) -> String {
        format!("VTS,2009-01-15 09:00:00,2009-01-15 09:12:00,1,2.5,1,N,CASH,{lat},{long}\n")
    }

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
    }

    #[test]
    fn test_read_points_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{HEADER}{}{}{}",
            record("40.7500", "-73.9900"),
            record("40.7000", "-74.0100"),
            record("40.8000", "-73.9300"),
        )
        .unwrap();
        file.flush().unwrap();

        let set = TripRecordReader::open(file.path())
            .unwrap()
            .read_points()
            .unwrap();
        assert_eq!(set.len(), 3);
        let ids: Vec<u64> = set.points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(set.points.iter().all(|p| p.label.is_unclassified()));
        assert_relative_eq!(set.points[0].lat(), 40.75);
        assert_relative_eq!(set.points[0].long(), -73.99);
        assert_relative_eq!(set.bounds.min.lat, 40.7);
        assert_relative_eq!(set.bounds.min.long, -74.01);
        assert_relative_eq!(set.bounds.max.lat, 40.8);
        assert_relative_eq!(set.bounds.max.long, -73.93);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TripRecordReader::open("/nonexistent/trips.csv"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(
            parse_records(b"", RecordLayout::default()),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(
            parse_records(HEADER.as_bytes(), RecordLayout::default()),
            Err(Error::EmptyInput)
        ));
        let blank = format!("{HEADER}\n\r\n  \n");
        assert!(matches!(
            parse_records(blank.as_bytes(), RecordLayout::default()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let data = format!(
            "{}\r\n{}\r\n\r\n{}",
            HEADER.trim_end(),
            record("1.5", "2.5").trim_end(),
            record("3.5", "4.5")
        );
        let set = parse_records(data.as_bytes(), RecordLayout::default()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.points[1].id, 2);
        assert_relative_eq!(set.points[1].long(), 4.5);
    }

    #[test]
    fn test_malformed_record_reports_first_bad_line() {
        let data = format!(
            "{HEADER}{}{}{}",
            record("40.1", "-73.0"),
            record("40.x", "-73.0"),
            record("NaN", "-73.0"),
        );
        match parse_records(data.as_bytes(), RecordLayout::default()) {
            Err(Error::MalformedRecord {
                line,
                column,
                value,
            }) => {
                assert_eq!(line, 3);
                assert_eq!(column, 8);
                assert_eq!(value, "40.x");
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let data = format!("{HEADER}{}", record("40.1", "inf"));
        assert!(matches!(
            parse_records(data.as_bytes(), RecordLayout::default()),
            Err(Error::MalformedRecord { column: 9, .. })
        ));
    }

    #[test]
    fn test_missing_field() {
        let data = format!("{HEADER}a,b,c\n");
        assert!(matches!(
            parse_records(data.as_bytes(), RecordLayout::default()),
            Err(Error::MissingField { line: 2, column: 8 })
        ));
    }

    #[test]
    fn test_custom_layout() {
        let data = "lat,long\n1.0,2.0\n3.0,4.0\n";
        let layout = RecordLayout {
            lat_column: 0,
            long_column: 1,
        };
        let set = parse_records(data.as_bytes(), layout).unwrap();
        assert_eq!(set.len(), 2);
        assert_relative_eq!(set.bounds.max.lat, 3.0);
        assert_relative_eq!(set.bounds.max.long, 4.0);
    }
}
