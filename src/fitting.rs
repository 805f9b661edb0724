//! Hand-off point to peak fitting.
//!
//! Fitting itself lives outside this crate. The pipeline only selects the
//! model definitions per region and passes each aggregated spectrum to a
//! [`FitDispatcher`].

use std::collections::BTreeMap;
use std::fmt;

use log::warn;

use crate::aggregate::AggregatedSpectrum;

/// `region -> model name -> model definition`.
pub type ModelCollection<M> = BTreeMap<String, BTreeMap<String, M>>;

/// Identifies one (group, sample) unit of work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    pub group: String,
    pub sample_id: String,
}

impl SampleKey {
    pub fn new(group: impl Into<String>, sample_id: impl Into<String>) -> Self {
        SampleKey {
            group: group.into(),
            sample_id: sample_id.into(),
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.group, self.sample_id)
    }
}

/// Keep only the requested regions and, when `model_names` is non-empty, only
/// the named models within them.
pub fn select_models<M: Clone>(
    models: &ModelCollection<M>,
    regions: &[String],
    model_names: &[String],
) -> ModelCollection<M> {
    let mut selected = ModelCollection::new();
    for region in regions {
        let Some(available) = models.get(region) else {
            warn!("no models defined for region '{region}'");
            continue;
        };
        let chosen: BTreeMap<String, M> = available
            .iter()
            .filter(|(name, _)| model_names.is_empty() || model_names.contains(*name))
            .map(|(name, model)| (name.clone(), model.clone()))
            .collect();
        if chosen.is_empty() {
            warn!("none of {model_names:?} is defined for region '{region}'");
            continue;
        }
        selected.insert(region.clone(), chosen);
    }
    selected
}

/// Fits the models of one region to an aggregated spectrum.
///
/// Implementations are called from the rayon pool when the pipeline runs in
/// parallel, hence the `Sync` bounds.
pub trait FitDispatcher: Send + Sync {
    type Model: Send + Sync;
    type Output: Send;

    /// Returns one result per model name.
    fn fit(
        &self,
        key: &SampleKey,
        spectrum: &AggregatedSpectrum,
        models: &BTreeMap<String, Self::Model>,
    ) -> BTreeMap<String, Self::Output>;
}

/// Dispatcher for runs that stop after aggregation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFit;

impl FitDispatcher for NoFit {
    type Model = ();
    type Output = ();

    fn fit(
        &self,
        _key: &SampleKey,
        _spectrum: &AggregatedSpectrum,
        _models: &BTreeMap<String, ()>,
    ) -> BTreeMap<String, ()> {
        BTreeMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> ModelCollection<u32> {
        BTreeMap::from([
            (
                "first_order".to_string(),
                BTreeMap::from([("2peaks".to_string(), 2), ("5peaks".to_string(), 5)]),
            ),
            (
                "second_order".to_string(),
                BTreeMap::from([("4peaks".to_string(), 4)]),
            ),
        ])
    }

    #[test]
    fn selects_requested_regions() {
        let selected = select_models(&collection(), &["first_order".to_string()], &[]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["first_order"].len(), 2);
    }

    #[test]
    fn model_names_narrow_the_selection() {
        let selected = select_models(
            &collection(),
            &["first_order".to_string(), "second_order".to_string()],
            &["5peaks".to_string()],
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["first_order"].keys().collect::<Vec<_>>(), vec!["5peaks"]);
    }

    #[test]
    fn unknown_regions_are_skipped() {
        assert!(select_models(&collection(), &["low".to_string()], &[]).is_empty());
    }

    #[test]
    fn key_displays_as_group_then_sample() {
        assert_eq!(SampleKey::new("DW", "DW38").to_string(), "DW DW38");
    }
}
