use std::io::Write;
use std::path::Path;

use approx::assert_relative_eq;

use rusty_raman::config::{IdentityOverrides, IndexOptions, PipelineConfig};
use rusty_raman::data::filter::SampleSelection;
use rusty_raman::data::model::SamplePosition;
use rusty_raman::error::{IndexError, IndexValidationError};
use rusty_raman::fitting::{ModelCollection, NoFit};
use rusty_raman::{read_spectrum, Pipeline, SpectrumIndex, SpectrumProcessor};

fn write_spectrum(path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    for i in 0..1600 {
        let x = 150.0 + i as f64 * 2.0;
        let y = 40.0
            + 0.01 * x
            + 300.0 * (-(x - 1350.0_f64).powi(2) / 800.0).exp()
            + 500.0 * (-(x - 1590.0_f64).powi(2) / 400.0).exp()
            + 200.0 * (-(x - 2700.0_f64).powi(2) / 1200.0).exp();
        writeln!(file, "{x}\t{y}").unwrap();
    }
}

fn options(dir: &Path) -> IndexOptions {
    IndexOptions {
        directory: Some(dir.to_path_buf()),
        index_file: Some(dir.join("index.csv")),
        ..IndexOptions::default()
    }
}

#[test]
fn three_positions_of_one_sample_aggregate_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["A1_1.txt", "A1_2.txt", "A1_3.txt"] {
        write_spectrum(&dir.path().join(name));
    }

    let config = PipelineConfig::default();
    let index = SpectrumIndex::load_or_build(&options(dir.path()), &config.overrides).unwrap();
    assert_eq!(index.len(), 3);
    for (record, position) in index.records().iter().zip(1..) {
        assert_eq!(record.sample.id, "A1");
        assert_eq!(record.sample.group, "A");
        assert_eq!(record.sample.position, SamplePosition::Index(position));
    }

    let processor = SpectrumProcessor::from_config(&config);
    let single = processor.process(&read_spectrum(&dir.path().join("A1_1.txt")).unwrap());

    let pipeline = Pipeline::new(config, NoFit, ModelCollection::new());
    let results = pipeline.run(&index, &SampleSelection::default());
    assert!(results.errors().is_empty(), "{:?}", results.errors());

    let report = results.sample("A", "A1").unwrap().result.as_ref().unwrap();
    assert_eq!(report.raw.len(), 3);
    let mean = &report.aggregated["first_order"];
    assert_eq!(mean.sources.len(), 3);

    let expected = single.region("first_order").unwrap();
    assert_eq!(mean.spectrum.ramanshift, expected.ramanshift);
    for (m, e) in mean.spectrum.intensity.iter().zip(&expected.intensity) {
        assert_relative_eq!(*m, *e, epsilon = 1e-12, max_relative = 1e-9);
    }
}

#[test]
fn mirror_with_foreign_headers_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_spectrum(&dir.path().join("A1_1.txt"));
    let opts = options(dir.path());
    let index_file = opts.index_file.clone().unwrap();
    std::fs::write(
        &index_file,
        format!("path,id\n{},A1\n", dir.path().join("A1_1.txt").display()),
    )
    .unwrap();

    let err = SpectrumIndex::load_or_build(&opts, &IdentityOverrides::default()).unwrap_err();
    assert!(
        matches!(
            err,
            IndexError::Validation(IndexValidationError::HeaderMismatch { .. })
        ),
        "unexpected error: {err}"
    );
}

#[test]
fn silicon_reference_keeps_its_full_name() {
    let dir = tempfile::tempdir().unwrap();
    write_spectrum(&dir.path().join("Si-ref.txt"));
    let index =
        SpectrumIndex::load_or_build(&options(dir.path()), &IdentityOverrides::default()).unwrap();

    let record = &index.records()[0];
    assert_eq!(record.sample.id, "Si-ref");
    assert_eq!(record.sample.position, SamplePosition::Index(0));

    let reloaded = SpectrumIndex::load(&dir.path().join("index.csv")).unwrap();
    assert_eq!(reloaded, index);
}

#[test]
fn selecting_a_group_and_an_id_runs_both() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["A1_1.txt", "B2_1.txt", "C3_1.txt"] {
        write_spectrum(&dir.path().join(name));
    }
    let config = PipelineConfig::default();
    let index = SpectrumIndex::load_or_build(&options(dir.path()), &config.overrides).unwrap();
    let pipeline = Pipeline::new(config, NoFit, ModelCollection::new());

    let selection = SampleSelection::new(vec!["A".to_string()], vec!["C3".to_string()]);
    let results = pipeline.run(&index, &selection);
    let groups: Vec<&str> = results.groups.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(groups, vec!["A", "C"]);
}

#[test]
fn numbered_reference_files_are_separate_positions() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["Si-ref_1.txt", "Si-ref_2.txt"] {
        write_spectrum(&dir.path().join(name));
    }
    let config = PipelineConfig::default();
    let index = SpectrumIndex::load_or_build(&options(dir.path()), &config.overrides).unwrap();
    let positions: Vec<&SamplePosition> =
        index.records().iter().map(|r| &r.sample.position).collect();
    assert_eq!(
        positions,
        vec![&SamplePosition::Index(1), &SamplePosition::Index(2)]
    );

    let pipeline = Pipeline::new(config, NoFit, ModelCollection::new());
    let results = pipeline.run(&index, &SampleSelection::default());
    assert!(results.errors().is_empty(), "{:?}", results.errors());
    let report = results.sample("Si", "Si-ref").unwrap().result.as_ref().unwrap();
    assert_eq!(report.raw.len(), 2);
}
