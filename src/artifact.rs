//! Text artifact writers for finished days and calibration traces.
//!
//! Two plain-text products leave the pipeline: the daily record, one
//! line per output sample with timestamp, day of year and the four
//! field values, and the rotation trace, one line of rotation-matrix
//! off-diagonals per sample from a per-sample alignment. Both writers
//! buffer through [`BufWriter`] and flush on [`close`](DayRecordWriter::close).
//!
//! ## Example
//!
//! ```rust
//! use magpipe::artifact::RotationTraceWriter;
//! use magpipe::rotation_solver::RotationTraceRow;
//!
//! let rows = vec![RotationTraceRow { r01: 0.001, r02: -0.002, r12: 0.0 }];
//! let tmp = std::env::temp_dir().join("magpipe_doc_trace.txt");
//! let mut writer = RotationTraceWriter::create(&tmp).unwrap();
//! writer.write_rows(&rows).unwrap();
//! writer.close().unwrap();
//! assert_eq!(
//!     std::fs::read_to_string(&tmp).unwrap(),
//!     "0.00100 -0.00200 0.00000\n"
//! );
//! std::fs::remove_file(&tmp).ok();
//! ```

use chrono::{Datelike, NaiveDate};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::pipeline::DayRecord;
use crate::rotation_solver::RotationTraceRow;

/// Canonical file name of a day record: `{station}{YYYY}{MM}{DD}vsec.sec`.
pub fn day_record_file_name(station: &str, date: NaiveDate) -> String {
    format!(
        "{}{:04}{:02}{:02}vsec.sec",
        station,
        date.year(),
        date.month(),
        date.day()
    )
}

/// Writer for the per-sample rotation trace, `r01 r02 r12` per line at
/// five decimal places.
pub struct RotationTraceWriter {
    writer: BufWriter<File>,
    rows_written: u64,
}

impl RotationTraceWriter {
    /// Create the trace file (truncates existing).
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            rows_written: 0,
        })
    }

    /// Append a block of trace rows.
    pub fn write_rows(&mut self, rows: &[RotationTraceRow]) -> io::Result<()> {
        for row in rows {
            writeln!(self.writer, "{:.5} {:.5} {:.5}", row.r01, row.r02, row.r12)?;
        }
        self.rows_written += rows.len() as u64;
        Ok(())
    }

    /// Flush buffered rows.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Close the writer (flush + drop).
    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Total rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

/// Writer for the daily text record.
///
/// One line per output sample:
/// `YYYY-MM-DD HH:MM:SS:mmm DOY    x y z f`
/// with the day of year zero padded to three digits, four spaces before
/// the values and the values at two decimal places. Milliseconds come
/// from the sample's time-of-day rounded half up; hours wrap at 24.
pub struct DayRecordWriter {
    writer: BufWriter<File>,
    lines_written: u64,
}

impl DayRecordWriter {
    /// Create the record file (truncates existing).
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            lines_written: 0,
        })
    }

    /// Write every sample of a finished day.
    pub fn write_record(&mut self, record: &DayRecord) -> io::Result<()> {
        let date = record.date;
        let doy = date.ordinal();
        let series = &record.series;
        let time = series.time();
        let f = series.f();

        for i in 0..series.len() {
            let x = series.x()[i];
            let y = series.y()[i];
            let z = series.z()[i];
            let total = match f {
                Some(f) => f[i],
                None => (x * x + y * y + z * z).sqrt(),
            };
            writeln!(
                self.writer,
                "{:04}-{:02}-{:02} {} {:03}    {:.2} {:.2} {:.2} {:.2}",
                date.year(),
                date.month(),
                date.day(),
                clock_of_day(time[i]),
                doy,
                x,
                y,
                z,
                total
            )?;
        }
        self.lines_written += series.len() as u64;
        Ok(())
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Close the writer (flush + drop).
    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Total lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

/// One-shot convenience: write `record` into `directory` under its
/// canonical file name and return the full path.
pub fn write_day_record(directory: &Path, record: &DayRecord) -> io::Result<PathBuf> {
    let path = directory.join(day_record_file_name(&record.station, record.date));
    let mut writer = DayRecordWriter::create(&path)?;
    writer.write_record(record)?;
    writer.close()?;
    Ok(path)
}

/// `HH:MM:SS:mmm` from seconds since midnight, milliseconds rounded
/// half up, hours wrapped at 24. Non-finite times render as midnight.
fn clock_of_day(t: f64) -> String {
    let total_ms = (t * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    let second = secs % 60;
    let minute = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;
    format!("{hour:02}:{minute:02}:{second:02}:{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::ThreeAxisSeries;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("magpipe_artifact_test_{}", name))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_with(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>, time: Vec<f64>) -> DayRecord {
        let series = ThreeAxisSeries::from_channels(x, y, z, time, 1.0).unwrap();
        DayRecord {
            station: "LRE".to_string(),
            date: day(2018, 2, 12),
            series,
            gap_spans: Vec::new(),
            filled_hours: Vec::new(),
            calibration: None,
        }
    }

    #[test]
    fn test_day_record_file_name() {
        assert_eq!(
            day_record_file_name("LRE", day(2018, 2, 12)),
            "LRE20180212vsec.sec"
        );
        assert_eq!(
            day_record_file_name("LRO", day(2020, 12, 1)),
            "LRO20201201vsec.sec"
        );
    }

    #[test]
    fn test_clock_of_day() {
        assert_eq!(clock_of_day(0.0), "00:00:00:000");
        assert_eq!(clock_of_day(1.5), "00:00:01:500");
        assert_eq!(clock_of_day(3661.25), "01:01:01:250");
        assert_eq!(clock_of_day(86_399.0), "23:59:59:000");
        // Times past the day wrap, matching the legacy product.
        assert_eq!(clock_of_day(90_000.0), "01:00:00:000");
    }

    #[test]
    fn test_day_record_lines() {
        let path = temp_path("lines.sec");
        let record = record_with(
            vec![1.0, 4.5],
            vec![2.0, 5.5],
            vec![3.0, 6.5],
            vec![0.0, 1.0],
        );
        let mut writer = DayRecordWriter::create(&path).unwrap();
        writer.write_record(&record).unwrap();
        assert_eq!(writer.lines_written(), 2);
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // 2018-02-12 is day 43; f is the vector norm at two decimals.
        assert_eq!(lines[0], "2018-02-12 00:00:00:000 043    1.00 2.00 3.00 3.74");
        assert_eq!(lines[1], "2018-02-12 00:00:01:000 043    4.50 5.50 6.50 9.63");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_day_record_prefers_stored_total_field() {
        let path = temp_path("stored_f.sec");
        let mut record = record_with(vec![1.0], vec![0.0], vec![0.0], vec![0.0]);
        record.series.compute_total_field();
        let mut writer = DayRecordWriter::create(&path).unwrap();
        writer.write_record(&record).unwrap();
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("1.00 0.00 0.00 1.00\n"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_day_record_survives_nan_samples() {
        let path = temp_path("nan.sec");
        let record = record_with(vec![f64::NAN], vec![2.0], vec![3.0], vec![0.0]);
        let mut writer = DayRecordWriter::create(&path).unwrap();
        writer.write_record(&record).unwrap();
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("NaN"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_day_record_uses_canonical_name() {
        let record = record_with(vec![1.0], vec![2.0], vec![3.0], vec![0.0]);
        let path = write_day_record(&env::temp_dir(), &record).unwrap();
        assert!(path.ends_with("LRE20180212vsec.sec"));
        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_trace_rows_format() {
        let path = temp_path("trace.txt");
        let rows = vec![
            RotationTraceRow {
                r01: 0.00123,
                r02: -0.5,
                r12: 1.0 / 3.0,
            },
            RotationTraceRow {
                r01: 0.0,
                r02: 0.0,
                r12: 0.0,
            },
        ];
        let mut writer = RotationTraceWriter::create(&path).unwrap();
        writer.write_rows(&rows).unwrap();
        assert_eq!(writer.rows_written(), 2);
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0.00123 -0.50000 0.33333");
        assert_eq!(lines[1], "0.00000 0.00000 0.00000");
        std::fs::remove_file(&path).ok();
    }
}
