use crate::config::{RegionConfig, DEFAULT_EXTRA_MARGIN};
use crate::data::model::Spectrum;

use super::split::SplitSpectrum;

/// Straight line anchored on the mean of the first and last points of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBaseline {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearBaseline {
    /// Anchor on the means of the first `k` and last `k` points, with
    /// `k = min(edge, n / 2)` and at least one point. `None` for empty input.
    pub fn fit(ramanshift: &[f64], intensity: &[f64], edge: usize) -> Option<Self> {
        let n = ramanshift.len().min(intensity.len());
        if n == 0 {
            return None;
        }
        let k = edge.min(n / 2).max(1);
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;

        let (x0, y0) = (mean(&ramanshift[..k]), mean(&intensity[..k]));
        let (x1, y1) = (mean(&ramanshift[n - k..n]), mean(&intensity[n - k..n]));

        if (x1 - x0).abs() <= f64::EPSILON * x0.abs().max(1.0) {
            return Some(LinearBaseline {
                slope: 0.0,
                intercept: (y0 + y1) / 2.0,
            });
        }
        let slope = (y1 - y0) / (x1 - x0);
        Some(LinearBaseline {
            slope,
            intercept: y0 - slope * x0,
        })
    }

    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Subtract a linear baseline fitted on this spectrum's own points.
pub fn subtract_baseline(spectrum: &Spectrum, edge: usize) -> Spectrum {
    match LinearBaseline::fit(&spectrum.ramanshift, &spectrum.intensity, edge) {
        Some(line) => spectrum.with_intensity(
            spectrum
                .ramanshift
                .iter()
                .zip(&spectrum.intensity)
                .map(|(x, y)| y - line.at(*x))
                .collect(),
        ),
        None => spectrum.clone(),
    }
}

/// Baseline-correct every region independently, using each region's margin as
/// its edge width.
pub fn subtract_baselines(split: &SplitSpectrum, regions: &RegionConfig) -> SplitSpectrum {
    let corrected = split
        .regions
        .iter()
        .map(|(name, part)| {
            let margin = regions
                .get(name)
                .map_or(DEFAULT_EXTRA_MARGIN, |r| r.extra_margin);
            let edge = usize::try_from(margin).unwrap_or(0);
            (name.clone(), subtract_baseline(part, edge))
        })
        .collect();
    SplitSpectrum {
        source: split.source.clone(),
        regions: corrected,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::config::RegionLimits;
    use crate::processing::split::split_spectrum;

    fn spectrum(ramanshift: Vec<f64>, intensity: Vec<f64>) -> Spectrum {
        Spectrum {
            ramanshift,
            intensity,
            label: "raw".into(),
            region_name: None,
            source: PathBuf::from("A1_1.txt"),
        }
    }

    #[test]
    fn sloped_line_is_removed_entirely() {
        let x: Vec<f64> = (0..100).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|x| 3.0 + 0.5 * x).collect();
        let corrected = subtract_baseline(&spectrum(x, y), 10);
        for v in corrected.intensity {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn peak_survives_baseline_removal() {
        let x: Vec<f64> = (0..101).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|x| 10.0 + 0.1 * x + 50.0 * (-(x - 50.0).powi(2) / 20.0).exp())
            .collect();
        let corrected = subtract_baseline(&spectrum(x, y), 5);
        assert_abs_diff_eq!(corrected.intensity[50], 50.0, epsilon = 0.5);
    }

    #[test]
    fn single_point_becomes_zero() {
        let corrected = subtract_baseline(&spectrum(vec![5.0], vec![7.0]), 20);
        assert_eq!(corrected.intensity, vec![0.0]);
    }

    #[test]
    fn regions_are_corrected_independently() {
        let x: Vec<f64> = (0..400).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|x| if *x < 200.0 { *x } else { 1000.0 - x * x }).collect();
        let source = spectrum(x, y);

        let a = RegionLimits::new("a", 20, 150, 5);
        let b = RegionLimits::new("b", 250, 380, 5);
        let mut only_a = RegionConfig::empty();
        only_a.insert(a);
        let mut both = only_a.clone();
        both.insert(b);

        let alone = subtract_baselines(&split_spectrum(&source, &only_a), &only_a);
        let together = subtract_baselines(&split_spectrum(&source, &both), &both);
        assert_eq!(alone.get("a"), together.get("a"));
        assert!(together.get("b").is_some());
    }

    #[test]
    fn changing_another_region_leaves_this_one_alone() {
        let x: Vec<f64> = (0..400).map(f64::from).collect();
        let before: Vec<f64> = x.iter().map(|x| 2.0 * x).collect();
        let after: Vec<f64> = x
            .iter()
            .map(|x| if *x > 200.0 { 5e3 - x * x / 10.0 } else { 2.0 * x })
            .collect();

        let mut regions = RegionConfig::empty();
        regions.insert(RegionLimits::new("a", 20, 150, 5));
        regions.insert(RegionLimits::new("b", 250, 380, 5));

        let first = subtract_baselines(&split_spectrum(&spectrum(x.clone(), before), &regions), &regions);
        let second = subtract_baselines(&split_spectrum(&spectrum(x, after), &regions), &regions);
        assert_eq!(first.get("a"), second.get("a"));
        assert_ne!(first.get("b"), second.get("b"));
    }
}
