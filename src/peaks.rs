use std::fmt;

use serde::Serialize;

use crate::utils::format_list;

pub const SMOOTHING_SIGMA: f64 = 2.0;
const GAUSSIAN_TRUNCATE: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Peak {
    pub index: usize,
    /// Raw correlation score at `index`.
    pub value: f64,
    /// Smoothed score used for ranking.
    pub smoothed: f64,
}

/// At most two peaks, index-ascending.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PeakSet {
    Zero,
    One(Peak),
    Two(Peak, Peak),
}

impl PeakSet {
    pub fn len(&self) -> usize {
        match self {
            PeakSet::Zero => 0,
            PeakSet::One(_) => 1,
            PeakSet::Two(..) => 2,
        }
    }

    pub fn peaks(&self) -> Vec<Peak> {
        match *self {
            PeakSet::Zero => Vec::new(),
            PeakSet::One(p) => vec![p],
            PeakSet::Two(a, b) => vec![a, b],
        }
    }

    pub fn indices(&self) -> Vec<usize> {
        self.peaks().iter().map(|p| p.index).collect()
    }

    pub fn pair(&self) -> Option<(Peak, Peak)> {
        match *self {
            PeakSet::Two(a, b) => Some((a, b)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeakStatus {
    /// Candidate indices in descending smoothed-value order.
    MoreThanTwo(Vec<usize>),
    Two,
    LessThanTwo,
}

impl fmt::Display for PeakStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakStatus::MoreThanTwo(candidates) => {
                write!(f, "More than 2 peaks found: {}", format_list(candidates))
            }
            PeakStatus::Two => f.write_str("Two peaks found."),
            PeakStatus::LessThanTwo => f.write_str("Less than 2 peaks found."),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeakDetection {
    pub peaks: PeakSet,
    pub status: PeakStatus,
    pub smoothed: Vec<f64>,
}

pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Symmetric reflection `d c b a | a b c d | d c b a`, periodic for any offset.
#[inline(always)]
fn reflect_index(idx: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = idx.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

pub fn gaussian_smooth(signal: &[f64], sigma: f64) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * signal[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Indices strictly greater than both neighbours. Endpoints never qualify.
pub fn local_maxima(signal: &[f64]) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }
    signal
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

pub fn detect_peaks(correlation: &[f64]) -> PeakDetection {
    let smoothed = gaussian_smooth(correlation, SMOOTHING_SIGMA);
    detect_in_smoothed(correlation, smoothed)
}

/// Peak selection on an already-smoothed sequence.
pub fn detect_in_smoothed(correlation: &[f64], smoothed: Vec<f64>) -> PeakDetection {
    let mut ranked = local_maxima(&smoothed);
    // stable: equal heights stay in index order
    ranked.sort_by(|&a, &b| smoothed[b].total_cmp(&smoothed[a]));

    let make = |index: usize| Peak {
        index,
        value: correlation.get(index).copied().unwrap_or(f64::NAN),
        smoothed: smoothed[index],
    };
    let ordered_pair = |a: usize, b: usize| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        PeakSet::Two(make(lo), make(hi))
    };

    let (peaks, status) = match ranked.as_slice() {
        [] => (PeakSet::Zero, PeakStatus::LessThanTwo),
        [only] => (PeakSet::One(make(*only)), PeakStatus::LessThanTwo),
        [a, b] => (ordered_pair(*a, *b), PeakStatus::Two),
        [a, b, ..] => (ordered_pair(*a, *b), PeakStatus::MoreThanTwo(ranked.clone())),
    };

    PeakDetection {
        peaks,
        status,
        smoothed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_maxima() -> Vec<f64> {
        // maxima at 2 (5), 5 (9), 8 (7)
        vec![0.0, 1.0, 5.0, 1.0, 2.0, 9.0, 2.0, 3.0, 7.0, 3.0, 0.0]
    }

    #[test]
    fn kernel_is_normalised_with_radius_eight() {
        let kernel = gaussian_kernel(2.0);
        assert_eq!(kernel.len(), 17);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((kernel[0] - kernel[16]).abs() < 1e-15);
        assert!(kernel[8] > kernel[7]);
    }

    #[test]
    fn smoothing_preserves_constants_and_mass() {
        let flat = gaussian_smooth(&[3.0; 5], 2.0);
        assert!(flat.iter().all(|v| (v - 3.0).abs() < 1e-12));

        let mut impulse = vec![0.0; 41];
        impulse[20] = 1.0;
        let spread = gaussian_smooth(&impulse, 2.0);
        assert!((spread.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(local_maxima(&spread), vec![20]);
    }

    #[test]
    fn reflection_handles_short_signals() {
        assert_eq!(reflect_index(-1, 3), 0);
        assert_eq!(reflect_index(-4, 3), 2);
        assert_eq!(reflect_index(3, 3), 2);
        assert_eq!(reflect_index(6, 3), 0);
        assert_eq!(reflect_index(0, 1), 0);
        assert_eq!(reflect_index(-9, 1), 0);
        let one = gaussian_smooth(&[4.0], 2.0);
        assert!((one[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn endpoints_and_plateaus_are_not_maxima() {
        assert_eq!(local_maxima(&[5.0, 1.0, 5.0]), Vec::<usize>::new());
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 0.0]), Vec::<usize>::new());
        assert_eq!(local_maxima(&[0.0, 2.0, 1.0, 3.0, 0.0]), vec![1, 3]);
    }

    #[test]
    fn more_than_two_keeps_top_two_in_index_order() {
        let smoothed = three_maxima();
        let raw: Vec<f64> = smoothed.iter().map(|v| v * 10.0).collect();
        let detection = detect_in_smoothed(&raw, smoothed);
        assert_eq!(detection.peaks.indices(), vec![5, 8]);
        let (first, second) = detection.peaks.pair().unwrap();
        assert_eq!(first.value, 90.0);
        assert_eq!(second.smoothed, 7.0);
        assert_eq!(detection.status, PeakStatus::MoreThanTwo(vec![5, 8, 2]));
        assert_eq!(detection.status.to_string(), "More than 2 peaks found: [5, 8, 2]");
    }

    #[test]
    fn two_peaks_are_index_sorted() {
        let smoothed = vec![0.0, 9.0, 0.0, 4.0, 0.0];
        let detection = detect_in_smoothed(&smoothed.clone(), smoothed);
        assert_eq!(detection.peaks.indices(), vec![1, 3]);
        assert_eq!(detection.status.to_string(), "Two peaks found.");
    }

    #[test]
    fn fewer_than_two_never_fabricates() {
        let none = detect_in_smoothed(&[1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]);
        assert_eq!(none.peaks, PeakSet::Zero);
        assert_eq!(none.status.to_string(), "Less than 2 peaks found.");

        let one = detect_in_smoothed(&[0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]);
        assert_eq!(one.peaks.indices(), vec![1]);
        assert_eq!(one.peaks.len(), 1);
        assert_eq!(one.status, PeakStatus::LessThanTwo);

        assert_eq!(detect_peaks(&[]).peaks, PeakSet::Zero);
    }

    #[test]
    fn equal_heights_prefer_lower_index() {
        let smoothed = vec![0.0, 4.0, 0.0, 4.0, 0.0, 4.0, 0.0];
        let detection = detect_in_smoothed(&smoothed.clone(), smoothed);
        assert_eq!(detection.peaks.indices(), vec![1, 3]);
        assert_eq!(detection.status, PeakStatus::MoreThanTwo(vec![1, 3, 5]));
    }

    #[test]
    fn detection_is_deterministic() {
        let signal: Vec<f64> = (0..120)
            .map(|i| {
                let x = i as f64;
                (-(x - 30.0).powi(2) / 40.0).exp() * 50.0 + (-(x - 85.0).powi(2) / 30.0).exp() * 35.0
            })
            .collect();
        let a = detect_peaks(&signal);
        let b = detect_peaks(&signal);
        assert_eq!(a, b);
        assert_eq!(a.status.to_string(), b.status.to_string());
        assert_eq!(a.peaks.indices(), vec![30, 85]);
    }
}
