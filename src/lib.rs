//! Batch indexing, cleaning and aggregation of Raman spectra.
//!
//! A directory of spectrum files is indexed ([`data::index`]), every file is
//! assigned a sample identity from its name ([`data::identity`]), and each
//! sample's spectra are despiked, split into regions, baseline-corrected and
//! normalized ([`processing`]) before being averaged per region
//! ([`aggregate`]) and handed to a [`fitting::FitDispatcher`].

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod fitting;
pub mod pipeline;
pub mod processing;

pub use aggregate::{aggregate_region, AggregatedSpectrum};
pub use config::PipelineConfig;
pub use data::index::SpectrumIndex;
pub use data::loader::read_spectrum;
pub use pipeline::{Pipeline, PipelineResults};
pub use processing::{CleanSpectrum, SpectrumProcessor};
