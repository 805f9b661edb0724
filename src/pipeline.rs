use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::aggregate::{aggregate_region, AggregatedSpectrum};
use crate::config::PipelineConfig;
use crate::data::filter::{group_by_group, group_by_sample, SampleSelection};
use crate::data::index::SpectrumIndex;
use crate::data::loader::read_spectrum;
use crate::data::model::{FileRecord, RawSpectrum};
use crate::error::SampleError;
use crate::fitting::{select_models, FitDispatcher, ModelCollection, SampleKey};
use crate::processing::{CleanSpectrum, SpectrumProcessor};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Everything produced for one sample, handed on to export and plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport<O> {
    /// Raw spectra, ordered by position.
    pub raw: Vec<RawSpectrum>,
    /// Clean spectra, same order as `raw`.
    pub clean: Vec<CleanSpectrum>,
    /// Region mean spectra, keyed by region name.
    pub aggregated: BTreeMap<String, AggregatedSpectrum>,
    /// `region -> model name -> fit output`.
    pub fit_results: BTreeMap<String, BTreeMap<String, O>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome<O> {
    pub key: SampleKey,
    /// Source files of the sample, ordered by position.
    pub files: Vec<PathBuf>,
    /// Failures carry `"<group> <sample>: <message>"`.
    pub result: Result<SampleReport<O>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome<O> {
    pub group: String,
    pub samples: Vec<SampleOutcome<O>>,
}

/// Outcomes of a run, groups and samples in encounter order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResults<O> {
    pub groups: Vec<GroupOutcome<O>>,
}

impl<O> PipelineResults<O> {
    pub fn samples(&self) -> impl Iterator<Item = &SampleOutcome<O>> {
        self.groups.iter().flat_map(|g| g.samples.iter())
    }

    pub fn sample(&self, group: &str, sample_id: &str) -> Option<&SampleOutcome<O>> {
        self.samples()
            .find(|s| s.key.group == group && s.key.sample_id == sample_id)
    }

    /// Recorded per-sample error messages.
    pub fn errors(&self) -> Vec<&str> {
        self.samples()
            .filter_map(|s| s.result.as_ref().err().map(String::as_str))
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.samples().filter(|s| s.result.is_ok()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs selection, processing, aggregation and fitting over an index.
pub struct Pipeline<D: FitDispatcher> {
    config: PipelineConfig,
    processor: SpectrumProcessor,
    dispatcher: D,
    models: ModelCollection<D::Model>,
}

impl<D> Pipeline<D>
where
    D: FitDispatcher,
    D::Model: Clone,
{
    /// Models are narrowed to the configured fit regions up front.
    pub fn new(config: PipelineConfig, dispatcher: D, models: ModelCollection<D::Model>) -> Self {
        let models = select_models(&models, &config.fit_regions, &[]);
        Pipeline {
            processor: SpectrumProcessor::from_config(&config),
            config,
            dispatcher,
            models,
        }
    }
}

impl<D: FitDispatcher> Pipeline<D> {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, index: &SpectrumIndex, selection: &SampleSelection) -> PipelineResults<D::Output> {
        let selected = selection.apply(index.records());
        if selected.is_empty() {
            warn!("selection {selection:?} matched no records");
            return PipelineResults { groups: Vec::new() };
        }

        let units: Vec<(SampleKey, Vec<&FileRecord>)> = group_by_group(selected)
            .into_iter()
            .flat_map(|(group, members)| {
                group_by_sample(members)
                    .into_iter()
                    .map(move |(sample_id, files)| (SampleKey::new(group.clone(), sample_id), files))
            })
            .collect();
        info!("running {} samples", units.len());

        let outcomes: Vec<SampleOutcome<D::Output>> = if self.config.parallel {
            units
                .into_par_iter()
                .map(|(key, files)| self.run_sample(key, files))
                .collect()
        } else {
            units
                .into_iter()
                .map(|(key, files)| self.run_sample(key, files))
                .collect()
        };

        let mut groups: Vec<GroupOutcome<D::Output>> = Vec::new();
        for outcome in outcomes {
            match groups.last_mut() {
                Some(last) if last.group == outcome.key.group => last.samples.push(outcome),
                _ => groups.push(GroupOutcome {
                    group: outcome.key.group.clone(),
                    samples: vec![outcome],
                }),
            }
        }
        let results = PipelineResults { groups };
        info!(
            "{} samples succeeded, {} failed",
            results.succeeded(),
            results.errors().len()
        );
        results
    }

    fn run_sample(&self, key: SampleKey, mut records: Vec<&FileRecord>) -> SampleOutcome<D::Output> {
        records.sort_by(|a, b| a.sample.position.cmp(&b.sample.position));
        let files = records.iter().map(|r| r.path.clone()).collect();
        let result = self.process_sample(&key, &records).map_err(|e| {
            let message = format!("{key}: {e}");
            error!("{message}");
            message
        });
        SampleOutcome { key, files, result }
    }

    /// `records` must already be ordered by position.
    fn process_sample(
        &self,
        key: &SampleKey,
        records: &[&FileRecord],
    ) -> Result<SampleReport<D::Output>, SampleError> {
        if records.is_empty() {
            return Err(SampleError::Empty);
        }
        let duplicates = duplicate_positions(records);
        if !duplicates.is_empty() {
            return Err(SampleError::DuplicatePosition {
                positions: duplicates,
            });
        }

        let raw = records
            .iter()
            .map(|r| read_spectrum(&r.path))
            .collect::<Result<Vec<_>, _>>()?;
        let clean: Vec<CleanSpectrum> = raw.iter().map(|r| self.processor.process(r)).collect();

        let mut aggregated = BTreeMap::new();
        for region in &self.config.fit_regions {
            match aggregate_region(region, &clean)? {
                Some(mean) => {
                    aggregated.insert(region.clone(), mean);
                }
                None => debug!("{key}: no spectra cover region '{region}'"),
            }
        }

        let mut fit_results = BTreeMap::new();
        for (region, mean) in &aggregated {
            if let Some(models) = self.models.get(region) {
                fit_results.insert(region.clone(), self.dispatcher.fit(key, mean, models));
            }
        }

        Ok(SampleReport {
            raw,
            clean,
            aggregated,
            fit_results,
        })
    }
}

/// Positions claimed by more than one record, in sorted order.
fn duplicate_positions(records: &[&FileRecord]) -> Vec<String> {
    let mut positions: Vec<_> = records.iter().map(|r| &r.sample.position).collect();
    positions.sort();
    let mut duplicates: Vec<String> = positions
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| w[0].to_string())
        .collect();
    duplicates.dedup();
    duplicates
}
