use crate::utils::mean;

/// Value substituted for profile samples past the right edge of the strip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// Substitute 0 before the profile mean is subtracted. Scores near the right
    /// edge are biased by this.
    #[default]
    Zero,
    /// Substitute the profile mean, so out-of-range terms contribute nothing.
    ProfileMean,
}

impl PaddingPolicy {
    #[inline(always)]
    fn fill(self, profile_mean: f64) -> f64 {
        match self {
            PaddingPolicy::Zero => 0.0,
            PaddingPolicy::ProfileMean => profile_mean,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationSequence {
    pub values: Vec<f64>,
    /// Distinct offsets whose window reached past the profile end.
    pub out_of_range_offsets: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationStep {
    pub j: usize,
    pub reference: f64,
    pub reference_mean: f64,
    pub profile_value: f64,
    pub profile_mean: f64,
    pub product: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleCalculation {
    pub offset: usize,
    pub steps: Vec<CorrelationStep>,
    pub total: f64,
}

struct Centered {
    reference: Vec<f64>,
    reference_mean: f64,
    profile_mean: f64,
}

fn center(profile: &[f64], reference: &[f64]) -> Centered {
    let reference_mean = mean(reference).unwrap_or(0.0);
    let profile_mean = mean(profile).unwrap_or(0.0);
    Centered {
        reference: reference.iter().map(|r| r - reference_mean).collect(),
        reference_mean,
        profile_mean,
    }
}

/// Sliding cross-correlation of `reference` over `profile`, one score per offset.
///
/// `C[i] = Σ_j (R[j] - mean(R)) * (P[i + j] - mean(P))`, with `P[k]` for `k >= len(P)`
/// replaced according to `padding`. `mean(P)` is taken over the unpadded profile.
pub fn correlate(profile: &[f64], reference: &[f64], padding: PaddingPolicy) -> CorrelationSequence {
    let width = profile.len();
    if width == 0 {
        return CorrelationSequence {
            values: Vec::new(),
            out_of_range_offsets: 0,
        };
    }
    let centered = center(profile, reference);
    let fill = padding.fill(centered.profile_mean) - centered.profile_mean;

    let mut values = Vec::with_capacity(width);
    let mut out_of_range_offsets = 0usize;
    for offset in 0..width {
        let in_range = reference.len().min(width - offset);
        let window = &profile[offset..offset + in_range];
        let mut acc = 0.0f64;
        for (r, p) in centered.reference.iter().zip(window) {
            acc += r * (p - centered.profile_mean);
        }
        if in_range < reference.len() {
            out_of_range_offsets += 1;
            for r in &centered.reference[in_range..] {
                acc += r * fill;
            }
        }
        values.push(acc);
    }

    CorrelationSequence {
        values,
        out_of_range_offsets,
    }
}

/// Term-by-term breakdown of one offset, for hand verification of `correlate`.
pub fn sample_calculation(
    profile: &[f64],
    reference: &[f64],
    offset: usize,
    padding: PaddingPolicy,
) -> SampleCalculation {
    let centered = center(profile, reference);
    let mut steps = Vec::with_capacity(reference.len());
    let mut total = 0.0f64;
    for (j, (&raw, &r)) in reference.iter().zip(&centered.reference).enumerate() {
        let profile_value = profile
            .get(offset + j)
            .copied()
            .unwrap_or_else(|| padding.fill(centered.profile_mean));
        let product = r * (profile_value - centered.profile_mean);
        total += product;
        steps.push(CorrelationStep {
            j,
            reference: raw,
            reference_mean: centered.reference_mean,
            profile_value,
            profile_mean: centered.profile_mean,
            product,
        });
    }
    SampleCalculation {
        offset,
        steps,
        total,
    }
}
