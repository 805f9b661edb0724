//! Resolved run configuration.
//!
//! Everything here is handed in already resolved (defaults merged with any
//! user files by an outside collaborator) and threaded explicitly through the
//! index, processor and pipeline constructors.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Reserved region used as the intensity reference during normalization.
pub const NORMALIZATION_REGION: &str = "normalization";

pub const DEFAULT_EXTRA_MARGIN: i64 = 20;

fn default_extra_margin() -> i64 {
    DEFAULT_EXTRA_MARGIN
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// Bounds of a region as found in the resolved configuration mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegionBounds {
    pub min: i64,
    pub max: i64,
    #[serde(default = "default_extra_margin")]
    pub extra_margin: i64,
}

/// A named Raman shift window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLimits {
    pub name: String,
    pub min: i64,
    pub max: i64,
    pub extra_margin: i64,
}

impl RegionLimits {
    pub fn new(name: impl Into<String>, min: i64, max: i64, extra_margin: i64) -> Self {
        RegionLimits {
            name: name.into(),
            min,
            max,
            extra_margin,
        }
    }

    /// The clipping window `[min - margin, max + margin]`.
    pub fn window(&self) -> (f64, f64) {
        (
            (self.min - self.extra_margin) as f64,
            (self.max + self.extra_margin) as f64,
        )
    }

    pub fn is_normalization(&self) -> bool {
        self.name == NORMALIZATION_REGION
    }
}

/// All configured regions, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, RegionBounds>")]
pub struct RegionConfig {
    regions: BTreeMap<String, RegionLimits>,
}

impl From<BTreeMap<String, RegionBounds>> for RegionConfig {
    fn from(resolved: BTreeMap<String, RegionBounds>) -> Self {
        Self::from_resolved(resolved)
    }
}

impl RegionConfig {
    /// Build from the resolved `name -> {min, max, extra_margin}` mapping.
    pub fn from_resolved(resolved: BTreeMap<String, RegionBounds>) -> Self {
        let regions = resolved
            .into_iter()
            .map(|(name, b)| {
                let limits = RegionLimits::new(name.clone(), b.min, b.max, b.extra_margin);
                (name, limits)
            })
            .collect();
        RegionConfig { regions }
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn empty() -> Self {
        RegionConfig {
            regions: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, limits: RegionLimits) {
        self.regions.insert(limits.name.clone(), limits);
    }

    pub fn get(&self, name: &str) -> Option<&RegionLimits> {
        self.regions.get(name)
    }

    /// The normalization reference window, if configured.
    pub fn normalization(&self) -> Option<&RegionLimits> {
        self.regions.get(NORMALIZATION_REGION)
    }

    /// General regions; the normalization window is not listed.
    pub fn regions(&self) -> impl Iterator<Item = &RegionLimits> {
        self.regions.values().filter(|r| !r.is_normalization())
    }

    /// Every configured window, normalization included.
    pub fn all(&self) -> impl Iterator<Item = &RegionLimits> {
        self.regions.values()
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        let mut config = RegionConfig::empty();
        for (name, min, max, margin) in [
            ("full", 200, 3600, DEFAULT_EXTRA_MARGIN),
            ("full_first_and_second", 800, 3500, DEFAULT_EXTRA_MARGIN),
            ("low", 150, 850, 10),
            ("first_order", 900, 2000, DEFAULT_EXTRA_MARGIN),
            ("mid", 1850, 2150, 10),
            ("normalization", 1500, 1675, 10),
            ("second_order", 2150, 3380, DEFAULT_EXTRA_MARGIN),
        ] {
            config.insert(RegionLimits::new(name, min, max, margin));
        }
        config
    }
}

// ---------------------------------------------------------------------------
// Identity overrides
// ---------------------------------------------------------------------------

/// Literal lookup tables applied on top of the filename heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityOverrides {
    /// Parsed sample id -> replacement id.
    pub sample_ids: BTreeMap<String, String>,
    /// Directory name anywhere above the file -> group code.
    pub group_path_segments: BTreeMap<String, String>,
    /// Stems containing one of these are that reference sample at position 0.
    pub reference_ids: Vec<String>,
}

impl Default for IdentityOverrides {
    fn default() -> Self {
        let sample_ids = [("David", "DW"), ("stephen", "SP"), ("Alish", "AS"), ("Aish", "AS")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let group_path_segments = [("Raman Data for fitting David", "SH")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IdentityOverrides {
            sample_ids,
            group_path_segments,
            reference_ids: vec!["Si-ref".to_string()],
        }
    }
}

impl IdentityOverrides {
    pub fn none() -> Self {
        IdentityOverrides {
            sample_ids: BTreeMap::new(),
            group_path_segments: BTreeMap::new(),
            reference_ids: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Despike
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DespikeSettings {
    /// Half-width of the rolling median window.
    pub window: usize,
    /// Spike threshold in units of the robust spread.
    pub threshold: f64,
    /// Residuals at or below this absolute value are never spikes.
    pub min_amplitude: f64,
    pub max_passes: usize,
}

impl Default for DespikeSettings {
    fn default() -> Self {
        DespikeSettings {
            window: 3,
            threshold: 6.0,
            min_amplitude: 0.0,
            max_passes: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Directory scanned on a cold start.
    pub directory: Option<PathBuf>,
    pub suffixes: Vec<String>,
    /// Path components (below `directory`) starting with any of these are skipped.
    pub exclusions: Vec<String>,
    /// Persisted mirror location; `None` keeps the index in memory only.
    pub index_file: Option<PathBuf>,
    pub force_reindex: bool,
    pub persist: bool,
    /// On a warm start, rescan `directory` and require it to match the mirror.
    pub verify_against_scan: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            directory: None,
            suffixes: vec![".txt".to_string()],
            exclusions: vec![".".to_string()],
            index_file: None,
            force_reindex: false,
            persist: true,
            verify_against_scan: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub regions: RegionConfig,
    pub overrides: IdentityOverrides,
    pub despike: DespikeSettings,
    pub index: IndexOptions,
    /// Regions aggregated and handed to the fit dispatcher.
    pub fit_regions: Vec<String>,
    /// Fan samples out over the rayon thread pool.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            regions: RegionConfig::default(),
            overrides: IdentityOverrides::default(),
            despike: DespikeSettings::default(),
            index: IndexOptions::default(),
            fit_regions: vec!["first_order".to_string(), "second_order".to_string()],
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
