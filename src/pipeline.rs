use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, Aggregate};
use crate::correlate::{correlate, sample_calculation, CorrelationSequence, PaddingPolicy};
use crate::error::PipelineError;
use crate::overlay::{draw_markers, map_columns};
use crate::peaks::{detect_peaks, PeakDetection, PeakSet};
use crate::plot::{plot_series_by_index, plot_series_with_peaks};
use crate::profile::IntensityGrid;
use crate::reference::{GlobalShift, ReferenceVector};
use crate::report::{
    self, StripReport, AGGREGATE_CSV_FILE, CORRELATION_RESULTS_FILE, PEAKS_FILE, STRIP_REPORT_FILE,
};
use crate::utils::{mean, parse_strip_index};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub padding: PaddingPolicy,
    pub extension: String,
    pub num_files: Option<usize>,
    pub plots: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            padding: PaddingPolicy::Zero,
            extension: "bmp".to_string(),
            num_files: None,
            plots: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StripInput {
    pub strip_index: usize,
    pub path: PathBuf,
    pub stem: String,
}

impl StripInput {
    fn folder(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.stem)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.bmp", self.stem))
    }
}

/// Everything computed for one strip. Not mutated after creation.
#[derive(Clone, Debug)]
pub struct StripRecord {
    pub input: StripInput,
    pub folder: PathBuf,
    pub profile: Vec<f64>,
    pub correlation: CorrelationSequence,
    pub detection: PeakDetection,
}

impl StripRecord {
    pub fn strip_index(&self) -> usize {
        self.input.strip_index
    }
}

fn plot_error(err: crate::utils::DynError) -> PipelineError {
    PipelineError::Plot(err.to_string())
}

/// Strip images under `input_dir`, ordered by strip index and capped at `num_files`.
pub fn list_strips(input_dir: &Path, options: &PipelineOptions) -> Result<Vec<StripInput>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::missing(input_dir));
    }
    let mut strips = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&options.extension))
            .unwrap_or(false);
        if !path.is_file() || !matches_ext {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        match parse_strip_index(&stem) {
            Some(strip_index) => strips.push(StripInput {
                strip_index,
                path,
                stem,
            }),
            None => warn!("Cannot determine strip index for {}; skipping", path.display()),
        }
    }
    strips.sort_by(|a, b| a.strip_index.cmp(&b.strip_index).then_with(|| a.stem.cmp(&b.stem)));
    if let Some(cap) = options.num_files {
        strips.truncate(cap);
    }
    Ok(strips)
}

/// Profile → correlation → peaks for one strip, with all per-strip artifacts written.
pub fn process_strip(
    input: &StripInput,
    reference: &ReferenceVector,
    output_root: &Path,
    options: &PipelineOptions,
) -> Result<StripRecord, PipelineError> {
    info!(strip = input.strip_index, "Processing image {}", input.path.display());
    if !input.path.exists() {
        return Err(PipelineError::missing(&input.path));
    }
    let luma = image::open(&input.path)?.to_luma8();
    let grid = IntensityGrid::from_luma(&luma)?;
    let profile = grid.column_profile();

    let folder = input.folder(output_root);
    fs::create_dir_all(&folder)?;

    let stem = &input.stem;
    let averages_path = folder.join(format!("{stem}_column_averages.txt"));
    report::write_column_averages(&averages_path, &profile)?;
    debug!(strip = input.strip_index, "Column averages saved to {}", averages_path.display());
    if options.plots {
        let plot_path = folder.join(format!("{stem}_column_averages.png"));
        if let Err(err) = plot_series_by_index(
            &profile,
            "Column Average Grayscale Values",
            &plot_path.to_string_lossy(),
            "Column",
            "Average Grayscale Value",
            "Average Grayscale Value",
        )
        .map_err(plot_error)
        {
            warn!(strip = input.strip_index, "Column average plot failed: {err}");
        }
    }

    fs::write(
        folder.join("correlation_references.json"),
        reference.to_json_pretty()?,
    )?;
    report::write_scalar(
        &folder.join("correlation_references_averages.txt"),
        "Correlation References Average",
        reference.mean(),
    )?;
    report::write_scalar(
        &folder.join("column_averages_average.txt"),
        "Column Averages Average",
        mean(&profile).unwrap_or(0.0),
    )?;

    let values = reference.values();
    let correlation = correlate(&profile, &values, options.padding);
    report::write_correlation_results(&folder.join(CORRELATION_RESULTS_FILE), &correlation)?;
    if correlation.out_of_range_offsets > 0 {
        debug!(
            strip = input.strip_index,
            offsets = correlation.out_of_range_offsets,
            "Reference window ran past the strip edge"
        );
    }

    let detection = detect_peaks(&correlation.values);
    info!(strip = input.strip_index, "{}", detection.status);
    report::write_peaks(&folder.join(PEAKS_FILE), &detection)?;
    report::write_sample_calculation(
        &folder.join("sample_correlation_calculation.txt"),
        &sample_calculation(&profile, &values, 0, options.padding),
    )?;
    StripReport::new(input.strip_index, &correlation, &detection)
        .write(&folder.join(STRIP_REPORT_FILE))?;

    Ok(StripRecord {
        input: input.clone(),
        folder,
        profile,
        correlation,
        detection,
    })
}

/// Process every strip; a failing strip is logged and left out.
pub fn process_folder(
    input_dir: &Path,
    output_root: &Path,
    reference: &ReferenceVector,
    options: &PipelineOptions,
) -> Result<Vec<StripRecord>, PipelineError> {
    let strips = list_strips(input_dir, options)?;
    fs::create_dir_all(output_root)?;
    info!("Found {} strip image(s) in {}", strips.len(), input_dir.display());

    let results: Vec<(usize, Result<StripRecord, PipelineError>)> = strips
        .par_iter()
        .map(|input| {
            (
                input.strip_index,
                process_strip(input, reference, output_root, options),
            )
        })
        .collect();

    let mut records = Vec::with_capacity(results.len());
    let mut skipped = 0usize;
    for (strip_index, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                skipped += 1;
                warn!(strip = strip_index, "Strip skipped: {err}");
            }
        }
    }
    records.sort_by_key(StripRecord::strip_index);
    info!("Processed {} strip(s), skipped {}", records.len(), skipped);
    Ok(records)
}

fn write_combined_plot(folder: &Path, detection: &PeakDetection) -> Result<(), PipelineError> {
    if detection.smoothed.is_empty() {
        return Ok(());
    }
    let path = folder.join("combined_plot.png");
    plot_series_with_peaks(
        &detection.smoothed,
        &detection.peaks.indices(),
        "Correlation Results with Peaks",
        &path.to_string_lossy(),
        "Index",
        "Correlation Result",
    )
    .map_err(plot_error)?;
    info!("Combined plot saved to {}", path.display());
    Ok(())
}

fn finish_aggregate(
    output_root: &Path,
    strips: &[(usize, PeakSet)],
) -> Result<Aggregate, PipelineError> {
    let result = aggregate(strips.iter().map(|(index, peaks)| (*index, peaks)));
    let csv_path = output_root.join(AGGREGATE_CSV_FILE);
    report::write_aggregate_csv(&csv_path, &result)?;
    info!("Aggregate table written to {}", csv_path.display());
    Ok(result)
}

/// Aggregate in-memory strip records.
pub fn summarize_records(
    records: &[StripRecord],
    output_root: &Path,
    options: &PipelineOptions,
) -> Result<Aggregate, PipelineError> {
    let mut strips = Vec::with_capacity(records.len());
    for record in records {
        if options.plots {
            if let Err(err) = write_combined_plot(&record.folder, &record.detection) {
                warn!(strip = record.strip_index(), "Combined plot failed: {err}");
            }
        }
        strips.push((record.strip_index(), record.detection.peaks));
    }
    finish_aggregate(output_root, &strips)
}

fn summarize_strip_folder(folder: &Path, options: &PipelineOptions) -> Result<PeakSet, PipelineError> {
    let correlation = report::read_correlation_results(&folder.join(CORRELATION_RESULTS_FILE))?;
    let detection = detect_peaks(&correlation);
    info!("{}", detection.status);
    report::write_peaks(&folder.join(PEAKS_FILE), &detection)?;
    if options.plots {
        if let Err(err) = write_combined_plot(folder, &detection) {
            warn!("Combined plot failed for {}: {err}", folder.display());
        }
    }
    Ok(detection.peaks)
}

/// Re-derive peaks from the persisted correlation results of every strip folder.
pub fn summarize_folder(output_root: &Path, options: &PipelineOptions) -> Result<Aggregate, PipelineError> {
    if !output_root.is_dir() {
        return Err(PipelineError::missing(output_root));
    }
    let mut strips = Vec::new();
    for entry in fs::read_dir(output_root)? {
        let folder = entry?.path();
        if !folder.is_dir() {
            continue;
        }
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(strip_index) = parse_strip_index(&name) else {
            warn!("Cannot determine strip index for {}; skipping", folder.display());
            continue;
        };
        match summarize_strip_folder(&folder, options) {
            Ok(peaks) => strips.push((strip_index, peaks)),
            Err(err) => warn!(strip = strip_index, "Strip skipped: {err}"),
        }
    }
    finish_aggregate(output_root, &strips)
}

fn overlay_strip(
    input: &StripInput,
    peak_indices: &[usize],
    shift: GlobalShift,
    output_root: &Path,
) -> Result<Option<PathBuf>, PipelineError> {
    let image = image::open(&input.path)?;
    let Some(columns) = map_columns(peak_indices, shift, image.width()) else {
        warn!(strip = input.strip_index, "Not enough peaks found for overlay");
        return Ok(None);
    };
    info!(
        strip = input.strip_index,
        "Overlaying peaks {:?} with shift {}", peak_indices, shift.0
    );
    let folder = input.folder(output_root);
    fs::create_dir_all(&folder)?;
    let path = folder.join(format!("overlay_{}", input.file_name()));
    draw_markers(&image, &columns).save(&path)?;
    info!(strip = input.strip_index, "Saved overlay image to {}", path.display());
    Ok(Some(path))
}

/// Overlay persisted peaks (`peaks.txt`) onto every strip image.
pub fn overlay_folder(
    input_dir: &Path,
    output_root: &Path,
    shift: GlobalShift,
    options: &PipelineOptions,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut written = Vec::new();
    for input in list_strips(input_dir, options)? {
        let peaks_path = input.folder(output_root).join(PEAKS_FILE);
        let outcome = report::read_peak_indices(&peaks_path)
            .and_then(|indices| overlay_strip(&input, &indices, shift, output_root));
        match outcome {
            Ok(Some(path)) => written.push(path),
            Ok(None) => {}
            Err(err) => warn!(strip = input.strip_index, "Overlay skipped: {err}"),
        }
    }
    Ok(written)
}

/// Overlay in-memory strip records.
pub fn overlay_records(
    records: &[StripRecord],
    shift: GlobalShift,
    output_root: &Path,
) -> Vec<PathBuf> {
    records
        .iter()
        .filter_map(|record| {
            match overlay_strip(&record.input, &record.detection.peaks.indices(), shift, output_root) {
                Ok(path) => path,
                Err(err) => {
                    warn!(strip = record.strip_index(), "Overlay skipped: {err}");
                    None
                }
            }
        })
        .collect()
}

pub struct RunSummary {
    pub records: Vec<StripRecord>,
    pub aggregate: Aggregate,
    pub overlays: Vec<PathBuf>,
}

/// Process, aggregate and overlay in one pass over a single loaded reference.
pub fn run(
    input_dir: &Path,
    output_root: &Path,
    reference: &ReferenceVector,
    options: &PipelineOptions,
) -> Result<RunSummary, PipelineError> {
    let shift = reference.global_shift();
    info!("Calculated shift value: {}", shift.0);
    let records = process_folder(input_dir, output_root, reference, options)?;
    let aggregate = summarize_records(&records, output_root, options)?;
    let overlays = overlay_records(&records, shift, output_root);
    Ok(RunSummary {
        records,
        aggregate,
        overlays,
    })
}
