use log::{debug, warn};

use crate::config::DespikeSettings;
use crate::data::model::Spectrum;

/// Scale factor turning a median absolute deviation into a normal-equivalent
/// standard deviation.
const MAD_SCALE: f64 = 1.4826;

/// Same for a mean absolute deviation, used when the median one is zero.
const MEAN_AD_SCALE: f64 = 1.2533;

/// Median of a slice; `None` when empty. Even lengths average the two middles.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Rolling median with a symmetric window of half-width `half`. The window
/// shrinks towards the ends so it always stays centered.
fn rolling_median(values: &[f64], half: usize) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            median(&values[i - h..=i + h]).unwrap_or(values[i])
        })
        .collect()
}

/// Robust noise estimate from absolute residuals.
///
/// Flat or integer-quantised backgrounds leave most residuals at exactly zero,
/// which zeroes the median; the mean absolute deviation takes over then.
fn noise_spread(abs_residuals: &[f64]) -> f64 {
    let mad = median(abs_residuals).unwrap_or(0.0);
    if mad > 0.0 {
        return MAD_SCALE * mad;
    }
    let mean = abs_residuals.iter().sum::<f64>() / abs_residuals.len().max(1) as f64;
    MEAN_AD_SCALE * mean
}

/// One pass: returns the number of replaced points.
fn despike_pass(values: &mut [f64], settings: &DespikeSettings) -> usize {
    let medians = rolling_median(values, settings.window);
    let residuals: Vec<f64> = values.iter().zip(&medians).map(|(v, m)| v - m).collect();
    let abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    let spread = noise_spread(&abs_residuals);
    if spread <= 0.0 || !spread.is_finite() {
        // Every point sits on its median.
        return 0;
    }

    let limit = settings.threshold * spread;
    let mut replaced = 0;
    for (i, r) in residuals.iter().enumerate() {
        if r.abs() > limit && r.abs() > settings.min_amplitude {
            values[i] = medians[i];
            replaced += 1;
        }
    }
    replaced
}

/// Replace isolated spikes by their local median.
///
/// Passes are repeated until nothing changes, so applying the filter to its
/// own output is a no-op.
pub fn despike(intensity: &[f64], settings: &DespikeSettings) -> Vec<f64> {
    let mut values = intensity.to_vec();
    if values.len() < 3 || settings.window == 0 {
        return values;
    }

    for pass in 0..settings.max_passes {
        let replaced = despike_pass(&mut values, settings);
        if replaced == 0 {
            return values;
        }
        debug!("despike pass {}: replaced {replaced} points", pass + 1);
    }
    warn!(
        "despike did not settle within {} passes",
        settings.max_passes
    );
    values
}

pub fn despike_spectrum(spectrum: &Spectrum, settings: &DespikeSettings) -> Spectrum {
    spectrum.with_intensity(despike(&spectrum.intensity, settings))
}
