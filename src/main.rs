mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use cli::Cli;
use rusty_raman::config::PipelineConfig;
use rusty_raman::data::filter::SampleSelection;
use rusty_raman::data::index::SpectrumIndex;
use rusty_raman::data::loader::SpectrumFormat;
use rusty_raman::fitting::{ModelCollection, NoFit};
use rusty_raman::pipeline::Pipeline;

const DEFAULT_INDEX_FILE: &str = "raman_index.csv";

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PipelineConfig::from_json_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(directory) = &cli.directory {
        config.index.directory = Some(directory.clone());
    }
    if let Some(index_file) = &cli.index_file {
        config.index.index_file = Some(index_file.clone());
    }
    if config.index.index_file.is_none() {
        config.index.index_file = config
            .index
            .directory
            .as_ref()
            .map(|d| d.join(DEFAULT_INDEX_FILE));
    }
    if cli.all_formats {
        config.index.suffixes = SpectrumFormat::all_suffixes();
    }
    config.index.force_reindex |= cli.force_reindex;
    config.parallel |= cli.parallel;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let index = SpectrumIndex::load_or_build(&config.index, &config.overrides)
        .context("building the spectrum index")?;
    info!("index holds {} files", index.len());

    let selection = SampleSelection::new(cli.groups.clone(), cli.samples.clone());
    let pipeline = Pipeline::new(config, NoFit, ModelCollection::new());
    let results = pipeline.run(&index, &selection);

    for group in &results.groups {
        for sample in &group.samples {
            match &sample.result {
                Ok(report) => println!(
                    "{}\t{}\t{} files\tregions: {}",
                    group.group,
                    sample.key.sample_id,
                    sample.files.len(),
                    report.aggregated.keys().cloned().collect::<Vec<_>>().join(",")
                ),
                Err(message) => println!("{}\t{}\tFAILED\t{message}", group.group, sample.key.sample_id),
            }
        }
    }
    println!(
        "{} samples processed, {} failed",
        results.succeeded(),
        results.errors().len()
    );
    Ok(())
}
