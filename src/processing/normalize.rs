use log::warn;

use crate::config::NORMALIZATION_REGION;
use crate::data::model::Spectrum;

use super::split::SplitSpectrum;

/// `1 / peak` of the baseline-corrected normalization window.
///
/// `None`, with a warning, when the window is absent or its peak is not
/// positive; callers then leave intensities unscaled.
pub fn normalization_factor(split: &SplitSpectrum) -> Option<f64> {
    let Some(window) = split.get(NORMALIZATION_REGION) else {
        warn!(
            "{}: no '{NORMALIZATION_REGION}' region, intensities left unscaled",
            split.source.display()
        );
        return None;
    };
    match window.max_intensity() {
        Some(peak) if peak > 0.0 => Some(1.0 / peak),
        peak => {
            warn!(
                "{}: '{NORMALIZATION_REGION}' peak is {peak:?}, intensities left unscaled",
                split.source.display()
            );
            None
        }
    }
}

pub fn scale(spectrum: &Spectrum, factor: f64) -> Spectrum {
    spectrum.with_intensity(spectrum.intensity.iter().map(|v| v * factor).collect())
}
