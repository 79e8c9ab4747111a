use tracing::warn;

use crate::error::InsufficientData;
use crate::peaks::{Peak, PeakSet};
use crate::utils::sample_std_dev;

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRow {
    pub strip_index: usize,
    /// Present only when the strip produced exactly two peaks.
    pub peaks: Option<(Peak, Peak)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispersionStats {
    pub peak1_index: f64,
    pub peak1_value: f64,
    pub peak2_index: f64,
    pub peak2_value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub rows: Vec<AggregateRow>,
    pub dispersion: Result<DispersionStats, InsufficientData>,
}

#[derive(Default)]
struct Running {
    peak1_indices: Vec<f64>,
    peak1_values: Vec<f64>,
    peak2_indices: Vec<f64>,
    peak2_values: Vec<f64>,
}

impl Running {
    fn push(&mut self, first: &Peak, second: &Peak) {
        self.peak1_indices.push(first.index as f64);
        self.peak1_values.push(first.value);
        self.peak2_indices.push(second.index as f64);
        self.peak2_values.push(second.value);
    }

    fn dispersion(&self) -> Result<DispersionStats, InsufficientData> {
        let insufficient = InsufficientData {
            complete_strips: self.peak1_indices.len(),
        };
        Ok(DispersionStats {
            peak1_index: sample_std_dev(&self.peak1_indices).ok_or(insufficient)?,
            peak1_value: sample_std_dev(&self.peak1_values).ok_or(insufficient)?,
            peak2_index: sample_std_dev(&self.peak2_indices).ok_or(insufficient)?,
            peak2_value: sample_std_dev(&self.peak2_values).ok_or(insufficient)?,
        })
    }
}

/// Reduce per-strip peak sets into a strip-ordered table plus dispersion statistics.
pub fn aggregate<'a, I>(strips: I) -> Aggregate
where
    I: IntoIterator<Item = (usize, &'a PeakSet)>,
{
    let mut running = Running::default();
    let mut rows = Vec::new();
    for (strip_index, peak_set) in strips {
        let peaks = match peak_set {
            PeakSet::Two(first, second) => {
                running.push(first, second);
                Some((*first, *second))
            }
            PeakSet::Zero | PeakSet::One(_) => None,
        };
        rows.push(AggregateRow { strip_index, peaks });
    }
    rows.sort_by_key(|row| row.strip_index);

    let dispersion = running.dispersion();
    if let Err(diagnostic) = &dispersion {
        warn!("{diagnostic}");
    }
    Aggregate { rows, dispersion }
}

#[cfg(test)]
mod tests {
    use super::aggregate;
    use crate::error::InsufficientData;
    use crate::peaks::{Peak, PeakSet};

    fn peak(index: usize, value: f64) -> Peak {
        Peak {
            index,
            value,
            smoothed: value,
        }
    }

    #[test]
    fn incomplete_strips_get_null_rows_and_are_left_out_of_stats() {
        let a = PeakSet::Two(peak(10, 100.0), peak(40, 80.0));
        let b = PeakSet::Zero;
        let c = PeakSet::Two(peak(14, 110.0), peak(44, 60.0));
        let result = aggregate([(7, &c), (2, &a), (5, &b)]);

        let order: Vec<usize> = result.rows.iter().map(|r| r.strip_index).collect();
        assert_eq!(order, vec![2, 5, 7]);
        assert!(result.rows[1].peaks.is_none());
        assert_eq!(result.rows[0].peaks.unwrap().0.index, 10);

        let stats = result.dispersion.unwrap();
        let sd_of_pair = |x: f64, y: f64| (x - y).abs() / 2f64.sqrt();
        assert!((stats.peak1_index - sd_of_pair(10.0, 14.0)).abs() < 1e-12);
        assert!((stats.peak1_value - sd_of_pair(100.0, 110.0)).abs() < 1e-12);
        assert!((stats.peak2_index - sd_of_pair(40.0, 44.0)).abs() < 1e-12);
        assert!((stats.peak2_value - sd_of_pair(80.0, 60.0)).abs() < 1e-12);
    }

    #[test]
    fn single_complete_strip_is_insufficient() {
        let a = PeakSet::Two(peak(1, 1.0), peak(3, 2.0));
        let b = PeakSet::One(peak(4, 5.0));
        let result = aggregate([(0, &a), (1, &b)]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(
            result.dispersion,
            Err(InsufficientData { complete_strips: 1 })
        );
    }

    #[test]
    fn empty_batch_is_insufficient() {
        let result = aggregate(std::iter::empty::<(usize, &PeakSet)>());
        assert!(result.rows.is_empty());
        assert!(result.dispersion.is_err());
    }
}
