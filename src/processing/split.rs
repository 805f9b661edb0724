use std::collections::BTreeMap;
use std::path::PathBuf;

use log::debug;

use crate::config::{RegionConfig, RegionLimits};
use crate::data::model::Spectrum;

/// One spectrum cut into its configured regions.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSpectrum {
    pub source: PathBuf,
    /// Only regions holding at least one point are present.
    pub regions: BTreeMap<String, Spectrum>,
}

impl SplitSpectrum {
    pub fn get(&self, region: &str) -> Option<&Spectrum> {
        self.regions.get(region)
    }
}

/// Points of `spectrum` inside the region's margin-extended window, or `None`
/// when no point falls inside. The axis must be ascending.
pub fn clip(spectrum: &Spectrum, limits: &RegionLimits) -> Option<Spectrum> {
    let (low, high) = limits.window();
    let start = spectrum.ramanshift.partition_point(|x| *x < low);
    let end = spectrum.ramanshift.partition_point(|x| *x <= high);
    if start >= end {
        return None;
    }
    Some(Spectrum {
        ramanshift: spectrum.ramanshift[start..end].to_vec(),
        intensity: spectrum.intensity[start..end].to_vec(),
        label: spectrum.label.clone(),
        region_name: Some(limits.name.clone()),
        source: spectrum.source.clone(),
    })
}

/// Clip `spectrum` to every configured region, normalization window included.
pub fn split_spectrum(spectrum: &Spectrum, regions: &RegionConfig) -> SplitSpectrum {
    let mut parts = BTreeMap::new();
    for limits in regions.all() {
        match clip(spectrum, limits) {
            Some(part) => {
                parts.insert(limits.name.clone(), part);
            }
            None => debug!(
                "{}: no points in region '{}'",
                spectrum.source.display(),
                limits.name
            ),
        }
    }
    SplitSpectrum {
        source: spectrum.source.clone(),
        regions: parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(from: i32, to: i32) -> Spectrum {
        let ramanshift: Vec<f64> = (from..=to).map(f64::from).collect();
        Spectrum {
            intensity: ramanshift.iter().map(|x| x * 2.0).collect(),
            ramanshift,
            label: "raw".into(),
            region_name: None,
            source: PathBuf::from("A1_1.txt"),
        }
    }

    #[test]
    fn clip_includes_margins() {
        let part = clip(&spectrum(0, 3000), &RegionLimits::new("first_order", 900, 2000, 20)).unwrap();
        assert_eq!(part.coverage(), Some((880.0, 2020.0)));
        assert_eq!(part.region_name.as_deref(), Some("first_order"));
        assert_eq!(part.intensity[0], 1760.0);
    }

    #[test]
    fn regions_stay_inside_native_coverage() {
        let source = spectrum(500, 1700);
        let split = split_spectrum(&source, &RegionConfig::default());
        let (lo, hi) = source.coverage().unwrap();
        for part in split.regions.values() {
            let (a, b) = part.coverage().unwrap();
            assert!(a >= lo && b <= hi);
        }
        assert!(split.get("second_order").is_none());
        assert!(split.get("normalization").is_some());
        assert_eq!(split.get("first_order").unwrap().coverage(), Some((880.0, 1700.0)));
    }
}
