use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::{DespikeSettings, PipelineConfig, RegionConfig};
use crate::data::model::{RawSpectrum, Spectrum};

use super::baseline::subtract_baselines;
use super::despike::despike_spectrum;
use super::normalize::{normalization_factor, scale};
use super::split::split_spectrum;

/// Label prefix of fully processed region spectra.
pub const CLEAN_LABEL_PREFIX: &str = "clean";

pub fn clean_label(region: &str) -> String {
    format!("{CLEAN_LABEL_PREFIX}_{region}")
}

/// Fully processed spectrum of one file: despiked, split, baseline-corrected
/// and normalized. Only general regions are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSpectrum {
    pub source: PathBuf,
    pub regions: BTreeMap<String, Spectrum>,
    /// `None` when normalization was skipped.
    pub normalization_factor: Option<f64>,
}

impl CleanSpectrum {
    pub fn region(&self, name: &str) -> Option<&Spectrum> {
        self.regions.get(name)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Turns raw spectra into [`CleanSpectrum`]s with a fixed region layout.
#[derive(Debug, Clone)]
pub struct SpectrumProcessor {
    regions: RegionConfig,
    despike: DespikeSettings,
}

impl SpectrumProcessor {
    pub fn new(regions: RegionConfig, despike: DespikeSettings) -> Self {
        SpectrumProcessor { regions, despike }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.regions.clone(), config.despike)
    }

    pub fn regions(&self) -> &RegionConfig {
        &self.regions
    }

    pub fn process(&self, raw: &RawSpectrum) -> CleanSpectrum {
        let despiked = despike_spectrum(&raw.spectrum, &self.despike);
        let split = split_spectrum(&despiked, &self.regions);
        let corrected = subtract_baselines(&split, &self.regions);
        let factor = normalization_factor(&corrected);

        let regions: BTreeMap<String, Spectrum> = corrected
            .regions
            .into_iter()
            .filter(|(name, _)| self.regions.get(name).is_some_and(|r| !r.is_normalization()))
            .map(|(name, part)| {
                let mut clean = match factor {
                    Some(f) => scale(&part, f),
                    None => part,
                };
                clean.label = clean_label(&name);
                (name, clean)
            })
            .collect();

        debug!(
            "{}: cleaned {} regions, normalization factor {factor:?}",
            raw.source().display(),
            regions.len()
        );
        CleanSpectrum {
            source: raw.spectrum.source.clone(),
            regions,
            normalization_factor: factor,
        }
    }
}
