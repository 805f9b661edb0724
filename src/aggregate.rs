//! Element-wise averaging of one region across the files of a sample.

use std::path::PathBuf;

use log::debug;

use crate::data::model::Spectrum;
use crate::error::AggregationError;
use crate::processing::processor::{clean_label, CleanSpectrum};

/// Relative tolerance when comparing sampling grids.
const GRID_TOLERANCE: f64 = 1e-9;

/// Mean spectrum of a region together with the files that went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSpectrum {
    pub region_name: String,
    pub spectrum: Spectrum,
    /// Contributing files, in input order.
    pub sources: Vec<PathBuf>,
}

fn same_grid(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            (x - y).abs() <= GRID_TOLERANCE * x.abs().max(y.abs()).max(1.0)
        })
}

/// Average `region` over every clean spectrum that has it.
///
/// Returns `Ok(None)` when no spectrum carries the region, and a
/// [`AggregationError::GridMismatch`] when the contributors were not sampled on
/// the same Raman shift grid.
pub fn aggregate_region(
    region: &str,
    spectra: &[CleanSpectrum],
) -> Result<Option<AggregatedSpectrum>, AggregationError> {
    let parts: Vec<&Spectrum> = spectra.iter().filter_map(|s| s.region(region)).collect();
    let Some(first) = parts.first() else {
        debug!("region '{region}': no contributors");
        return Ok(None);
    };

    let offending: Vec<PathBuf> = parts
        .iter()
        .filter(|p| !same_grid(&first.ramanshift, &p.ramanshift))
        .map(|p| p.source.clone())
        .collect();
    if !offending.is_empty() {
        return Err(AggregationError::GridMismatch {
            region: region.to_string(),
            reference: first.source.clone(),
            offending,
        });
    }

    let count = parts.len() as f64;
    let mut mean = vec![0.0; first.len()];
    for part in &parts {
        for (acc, v) in mean.iter_mut().zip(&part.intensity) {
            *acc += v;
        }
    }
    mean.iter_mut().for_each(|v| *v /= count);

    Ok(Some(AggregatedSpectrum {
        region_name: region.to_string(),
        spectrum: Spectrum {
            ramanshift: first.ramanshift.clone(),
            intensity: mean,
            label: format!("{}_mean", clean_label(region)),
            region_name: Some(region.to_string()),
            source: first.source.clone(),
        },
        sources: parts.iter().map(|p| p.source.clone()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use approx::assert_relative_eq;

    use super::*;

    fn clean(source: &str, ramanshift: Vec<f64>, intensity: Vec<f64>) -> CleanSpectrum {
        let spectrum = Spectrum {
            ramanshift,
            intensity,
            label: clean_label("first_order"),
            region_name: Some("first_order".into()),
            source: PathBuf::from(source),
        };
        CleanSpectrum {
            source: PathBuf::from(source),
            regions: BTreeMap::from([("first_order".to_string(), spectrum)]),
            normalization_factor: Some(1.0),
        }
    }

    #[test]
    fn identical_spectra_average_to_themselves() {
        let x = vec![900.0, 901.0, 902.0];
        let y = vec![0.1, 0.7, 0.3];
        let spectra = vec![
            clean("a.txt", x.clone(), y.clone()),
            clean("b.txt", x.clone(), y.clone()),
            clean("c.txt", x.clone(), y.clone()),
        ];
        let mean = aggregate_region("first_order", &spectra).unwrap().unwrap();
        assert_eq!(mean.spectrum.ramanshift, x);
        for (m, v) in mean.spectrum.intensity.iter().zip(&y) {
            assert_relative_eq!(*m, *v, max_relative = 1e-12);
        }
        assert_eq!(mean.spectrum.label, "clean_first_order_mean");
        assert_eq!(mean.sources.len(), 3);
    }

    #[test]
    fn mean_is_element_wise() {
        let x = vec![1.0, 2.0];
        let spectra = vec![
            clean("a.txt", x.clone(), vec![1.0, 4.0]),
            clean("b.txt", x, vec![3.0, 0.0]),
        ];
        let mean = aggregate_region("first_order", &spectra).unwrap().unwrap();
        assert_eq!(mean.spectrum.intensity, vec![2.0, 2.0]);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let spectra = vec![
            clean("a.txt", vec![1.0, 2.0, 3.0], vec![0.0; 3]),
            clean("b.txt", vec![1.0, 2.0], vec![0.0; 2]),
            clean("c.txt", vec![1.0, 2.5, 3.0], vec![0.0; 3]),
        ];
        let err = aggregate_region("first_order", &spectra).unwrap_err();
        assert_eq!(
            err,
            AggregationError::GridMismatch {
                region: "first_order".into(),
                reference: PathBuf::from("a.txt"),
                offending: vec![PathBuf::from("b.txt"), PathBuf::from("c.txt")],
            }
        );
    }

    #[test]
    fn absent_region_has_no_mean() {
        let spectra = vec![clean("a.txt", vec![1.0], vec![1.0])];
        assert_eq!(aggregate_region("second_order", &spectra).unwrap(), None);
        assert_eq!(aggregate_region("first_order", &[]).unwrap(), None);
    }
}
