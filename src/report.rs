use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::aggregate::Aggregate;
use crate::correlate::{CorrelationSequence, SampleCalculation};
use crate::error::PipelineError;
use crate::peaks::{Peak, PeakDetection};
use crate::utils::format_list;

pub const CORRELATION_RESULTS_FILE: &str = "correlation_results.txt";
pub const PEAKS_FILE: &str = "peaks.txt";
pub const STRIP_REPORT_FILE: &str = "strip_report.json";
pub const AGGREGATE_CSV_FILE: &str = "peaks_and_statistics.csv";

const CORRELATION_PREFIX: &str = "Correlation Result ";
const PEAKS_PREFIX: &str = "Peaks at indices";
const OUT_OF_BOUNDS_PREFIX: &str = "Out of bounds instances (deduped by correlation result)";

fn write_titled(path: &Path, title: &str, body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>) -> Result<(), PipelineError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{title}")?;
    writeln!(writer, "{}", "=".repeat(title.len()))?;
    writeln!(writer)?;
    body(&mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_column_averages(path: &Path, profile: &[f64]) -> Result<(), PipelineError> {
    write_titled(path, "Column Average Grayscale Values", |w| {
        for (col, avg) in profile.iter().enumerate() {
            writeln!(w, "Column {col}: {avg}")?;
        }
        Ok(())
    })
}

pub fn write_scalar(path: &Path, label: &str, value: f64) -> Result<(), PipelineError> {
    fs::write(path, format!("{label}: {value}\n"))?;
    Ok(())
}

pub fn write_correlation_results(path: &Path, correlation: &CorrelationSequence) -> Result<(), PipelineError> {
    write_titled(path, "Correlation Results", |w| {
        for (idx, value) in correlation.values.iter().enumerate() {
            writeln!(w, "{CORRELATION_PREFIX}{idx}: {value}")?;
        }
        writeln!(w)?;
        writeln!(w, "{OUT_OF_BOUNDS_PREFIX}: {}", correlation.out_of_range_offsets)
    })
}

pub fn write_peaks(path: &Path, detection: &PeakDetection) -> Result<(), PipelineError> {
    let peaks = detection.peaks.peaks();
    let values: Vec<f64> = peaks.iter().map(|p| p.value).collect();
    write_titled(path, "Peaks in Correlation Results", |w| {
        writeln!(w, "{PEAKS_PREFIX}: {}", format_list(&detection.peaks.indices()))?;
        writeln!(w, "Peak values: {}", format_list(&values))?;
        writeln!(w, "Message: {}", detection.status)
    })
}

pub fn write_sample_calculation(path: &Path, sample: &SampleCalculation) -> Result<(), PipelineError> {
    write_titled(path, "Sample Correlation Calculation Step-by-Step", |w| {
        for step in &sample.steps {
            writeln!(
                w,
                "Step {}: ({} - {}) * ({} - {}) = {}",
                step.j,
                step.reference,
                step.reference_mean,
                step.profile_value,
                step.profile_mean,
                step.product
            )?;
        }
        writeln!(w)?;
        writeln!(w, "Total Sample Correlation Result: {}", sample.total)
    })
}

#[derive(Debug, Serialize)]
pub struct IndexedValue {
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct StripReport {
    pub strip_index: usize,
    pub width: usize,
    pub out_of_range_offsets: usize,
    pub correlation: Vec<IndexedValue>,
    pub peaks: Vec<Peak>,
    pub status: String,
}

impl StripReport {
    pub fn new(
        strip_index: usize,
        correlation: &CorrelationSequence,
        detection: &PeakDetection,
    ) -> Self {
        Self {
            strip_index,
            width: correlation.values.len(),
            out_of_range_offsets: correlation.out_of_range_offsets,
            correlation: correlation
                .values
                .iter()
                .enumerate()
                .map(|(index, &value)| IndexedValue { index, value })
                .collect(),
            peaks: detection.peaks.peaks(),
            status: detection.status.to_string(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

fn open_required(path: &Path) -> Result<BufReader<File>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::missing(path));
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Correlation values from a `correlation_results.txt`, in file order.
pub fn read_correlation_results(path: &Path) -> Result<Vec<f64>, PipelineError> {
    let mut values = Vec::new();
    for line in open_required(path)?.lines() {
        let line = line?;
        if !line.starts_with(CORRELATION_PREFIX) {
            continue;
        }
        match line.split_once(": ").map(|(_, v)| v.trim().parse::<f64>()) {
            Some(Ok(value)) => values.push(value),
            _ => warn!("Skipping line due to format error: {}", line.trim()),
        }
    }
    Ok(values)
}

/// Peak indices from a `peaks.txt`.
pub fn read_peak_indices(path: &Path) -> Result<Vec<usize>, PipelineError> {
    for line in open_required(path)?.lines() {
        let line = line?;
        let Some(rest) = line.strip_prefix(PEAKS_PREFIX) else {
            continue;
        };
        let body = rest
            .trim_start_matches(':')
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']');
        return body
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>().map_err(|e| PipelineError::MalformedReport {
                    path: path.to_path_buf(),
                    reason: format!("bad peak index {s:?}: {e}"),
                })
            })
            .collect();
    }
    Err(PipelineError::MalformedReport {
        path: path.to_path_buf(),
        reason: format!("no '{PEAKS_PREFIX}' line"),
    })
}

fn opt_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Aggregate table, then the statistics block when it could be computed.
pub fn write_aggregate_csv(path: &Path, aggregate: &Aggregate) -> Result<(), PipelineError> {
    let mut file = BufWriter::new(File::create(path)?);
    {
        let mut table = csv::Writer::from_writer(&mut file);
        table.write_record(["Slice Index", "P1 Index", "P1 Value", "P2 Index", "P2 Value"])?;
        for row in &aggregate.rows {
            let first = row.peaks.map(|(a, _)| a);
            let second = row.peaks.map(|(_, b)| b);
            table.write_record([
                row.strip_index.to_string(),
                opt_cell(first.map(|p| p.index)),
                opt_cell(first.map(|p| p.value)),
                opt_cell(second.map(|p| p.index)),
                opt_cell(second.map(|p| p.value)),
            ])?;
        }
        table.flush()?;
    }
    if let Ok(stats) = &aggregate.dispersion {
        // csv writes an empty record as `""`; the separator is a bare newline
        writeln!(file)?;
        let mut block = csv::WriterBuilder::new().flexible(true).from_writer(&mut file);
        block.write_record(["Statistics"])?;
        for (label, value) in [
            ("Standard Deviation of P1 Values", stats.peak1_value),
            ("Standard Deviation of P1 Indices", stats.peak1_index),
            ("Standard Deviation of P2 Values", stats.peak2_value),
            ("Standard Deviation of P2 Indices", stats.peak2_index),
        ] {
            block.write_record([label.to_string(), value.to_string()])?;
        }
        block.flush()?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::correlate::{correlate, PaddingPolicy};
    use crate::peaks::{detect_in_smoothed, PeakSet};

    #[test]
    fn correlation_results_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CORRELATION_RESULTS_FILE);
        let sequence = correlate(&[0.1, 7.25, 3.3, 1.0 / 3.0], &[1.0, 2.0, 4.0], PaddingPolicy::Zero);
        write_correlation_results(&path, &sequence).unwrap();
        assert_eq!(read_correlation_results(&path).unwrap(), sequence.values);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Out of bounds instances (deduped by correlation result): 2"));
    }

    #[test]
    fn malformed_correlation_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CORRELATION_RESULTS_FILE);
        fs::write(&path, "Correlation Results\n\nCorrelation Result 0: 1.5\nCorrelation Result 1: nan?\nCorrelation Result 2: -2\n").unwrap();
        assert_eq!(read_correlation_results(&path).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn missing_report_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_correlation_results(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
        let err = read_peak_indices(&dir.path().join(PEAKS_FILE)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }

    #[test]
    fn peaks_file_round_trips_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PEAKS_FILE);
        let smoothed = vec![0.0, 3.0, 0.0, 8.0, 0.0, 5.0, 0.0];
        let detection = detect_in_smoothed(&smoothed.clone(), smoothed);
        write_peaks(&path, &detection).unwrap();
        assert_eq!(read_peak_indices(&path).unwrap(), vec![3, 5]);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Message: More than 2 peaks found: [3, 5, 1]"));

        let empty = detect_in_smoothed(&[1.0], vec![1.0]);
        assert_eq!(empty.peaks, PeakSet::Zero);
        write_peaks(&path, &empty).unwrap();
        assert!(read_peak_indices(&path).unwrap().is_empty());
    }

    #[test]
    fn csv_has_null_cells_and_statistics_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AGGREGATE_CSV_FILE);
        let p = |index: usize, value: f64| Peak { index, value, smoothed: value };
        let a = PeakSet::Two(p(1, 2.0), p(5, 4.0));
        let b = PeakSet::One(p(2, 1.0));
        let c = PeakSet::Two(p(3, 6.0), p(7, 8.0));
        let result = aggregate([(1, &b), (0, &a), (2, &c)]);
        write_aggregate_csv(&path, &result).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Slice Index,P1 Index,P1 Value,P2 Index,P2 Value");
        assert_eq!(lines[1], "0,1,2,5,4");
        assert_eq!(lines[2], "1,,,,");
        assert_eq!(lines[3], "2,3,6,7,8");
        assert_eq!(lines[5], "Statistics");
        assert!(lines[6].starts_with("Standard Deviation of P1 Values,"));
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn csv_omits_statistics_when_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AGGREGATE_CSV_FILE);
        let result = aggregate([(0, &PeakSet::Zero)]);
        write_aggregate_csv(&path, &result).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("Statistics"));
    }
}
