/// Data layer: file identity, the spectrum index, and loading.
///
/// Architecture:
/// ```text
///   directory of spectrum files          index.csv mirror
///        │                                     │
///        ▼                                     ▼
///   ┌───────────────────────┐            ┌──────────┐
///   │ identity + metadata   │ FileRecord │  index    │ validate / persist
///   └───────────────────────┘ ─────────▶ └──────────┘
///                                              │
///                                              ▼
///                                        ┌──────────┐
///                                        │  filter   │ union selection, grouping
///                                        └──────────┘
///                                              │
///                                              ▼
///                                        ┌──────────┐
///                                        │  loader   │ file → RawSpectrum
///                                        └──────────┘
/// ```

pub mod filter;
pub mod identity;
pub mod index;
pub mod loader;
pub mod metadata;
pub mod model;
