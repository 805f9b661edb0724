/// Signal processing: raw spectrum in, clean per-region spectra out.
///
/// ```text
///   RawSpectrum
///        │
///        ▼
///   despike ──▶ split ──▶ baseline ──▶ normalize
///                 │                       ▲
///                 └── normalization ──────┘
///                     window (factor only)
///        │
///        ▼
///   CleanSpectrum  region → clean_<region>
/// ```

pub mod baseline;
pub mod despike;
pub mod normalize;
pub mod processor;
pub mod split;

pub use processor::{CleanSpectrum, SpectrumProcessor};
