use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// SamplePosition – where on the sample a file was measured
// ---------------------------------------------------------------------------

/// Position of a measurement on its sample.
///
/// Positions are integers extracted from the file stem. The one exception is a
/// two-token stem whose second token carries no digits (`"Si_ref"`): that token
/// is kept verbatim as a label.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePosition {
    Index(i64),
    Label(String),
}

// -- Manual Eq/Ord so positions can be sorted and deduplicated --

impl Eq for SamplePosition {}

impl PartialOrd for SamplePosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SamplePosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use SamplePosition::*;
        match (self, other) {
            (Index(a), Index(b)) => a.cmp(b),
            (Label(a), Label(b)) => a.cmp(b),
            // Numbered positions sort before labelled ones.
            (Index(_), Label(_)) => std::cmp::Ordering::Less,
            (Label(_), Index(_)) => std::cmp::Ordering::Greater,
        }
    }
}

impl std::hash::Hash for SamplePosition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SamplePosition::Index(i) => i.hash(state),
            SamplePosition::Label(s) => s.hash(state),
        }
    }
}

impl fmt::Display for SamplePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplePosition::Index(i) => write!(f, "{i}"),
            SamplePosition::Label(s) => write!(f, "{s}"),
        }
    }
}

impl Default for SamplePosition {
    fn default() -> Self {
        SamplePosition::Index(0)
    }
}

impl SamplePosition {
    /// Read a position back from its persisted text form.
    ///
    /// Labels never consist of digits only (digits would have been extracted as
    /// an index), so the text form round-trips.
    pub fn from_cell(cell: &str) -> Self {
        match cell.parse::<i64>() {
            Ok(i) => SamplePosition::Index(i),
            Err(_) => SamplePosition::Label(cell.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// FileRecord – one row of the spectrum index
// ---------------------------------------------------------------------------

/// Identity of the physical sample a file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleInfo {
    pub id: String,
    pub position: SamplePosition,
    pub group: String,
}

/// Filesystem facts about a spectrum file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Not every filesystem records creation time.
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Hex-encoded sha256 of the file contents.
    pub content_hash: String,
}

/// A discovered spectrum file together with its derived identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub filename_id: String,
    pub sample: SampleInfo,
    pub file_metadata: FileMetadata,
}

// ---------------------------------------------------------------------------
// Spectrum – a wavelength/intensity trace
// ---------------------------------------------------------------------------

/// A single spectrum, either a whole file or one clipped region of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Raman shift axis (x), ascending.
    pub ramanshift: Vec<f64>,
    /// Intensity axis (y) – same length as `ramanshift`.
    pub intensity: Vec<f64>,
    /// Processing stage, e.g. `raw` or `clean_first_order`.
    pub label: String,
    /// `None` for the whole, unsplit spectrum.
    pub region_name: Option<String>,
    /// File the data was read from.
    pub source: PathBuf,
}

impl Spectrum {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.ramanshift.len()
    }

    /// Whether the spectrum holds no points.
    pub fn is_empty(&self) -> bool {
        self.ramanshift.is_empty()
    }

    /// Lowest and highest Raman shift, if any.
    pub fn coverage(&self) -> Option<(f64, f64)> {
        Some((*self.ramanshift.first()?, *self.ramanshift.last()?))
    }

    /// Same axis and provenance, new intensities.
    pub fn with_intensity(&self, intensity: Vec<f64>) -> Self {
        debug_assert_eq!(intensity.len(), self.ramanshift.len());
        Spectrum {
            ramanshift: self.ramanshift.clone(),
            intensity,
            label: self.label.clone(),
            region_name: self.region_name.clone(),
            source: self.source.clone(),
        }
    }

    /// Largest finite intensity.
    pub fn max_intensity(&self) -> Option<f64> {
        self.intensity
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .max_by(|a, b| a.total_cmp(b))
    }
}

/// A spectrum as read from disk, before any processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpectrum {
    pub spectrum: Spectrum,
    /// Hex sha256 over the parsed (sorted, numeric) representation.
    pub spectrum_hash: String,
}

impl RawSpectrum {
    pub fn source(&self) -> &Path {
        &self.spectrum.source
    }
}
