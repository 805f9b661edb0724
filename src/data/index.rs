//! Catalog of discovered spectrum files.
//!
//! The index is either built from a directory scan or reloaded from its CSV
//! mirror. Whenever a mirror and a live record set meet they must agree
//! exactly; any disagreement is an [`IndexValidationError`].

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info, warn};
use walkdir::WalkDir;

use super::filter::{group_by_group, group_by_sample, select};
use super::identity::{filename_id, resolve_sample};
use super::metadata::collect_file_metadata;
use super::model::{FileMetadata, FileRecord, SampleInfo, SamplePosition};
use crate::config::{IdentityOverrides, IndexOptions};
use crate::error::{IndexError, IndexValidationError};

/// Column layout of the persisted mirror, one column per flattened
/// [`FileRecord`] field.
pub const INDEX_COLUMNS: [&str; 9] = [
    "path",
    "filename_id",
    "sample_id",
    "sample_position",
    "sample_group",
    "file_size",
    "file_created",
    "file_modified",
    "file_hash",
];

// ---------------------------------------------------------------------------
// IndexTable – the tabular mirror
// ---------------------------------------------------------------------------

/// Text table with named columns, exactly as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl IndexTable {
    pub fn from_records(records: &[FileRecord]) -> Self {
        IndexTable {
            headers: INDEX_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: records.iter().map(record_to_row).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn read(path: &Path) -> Result<Self, IndexError> {
        let csv_err = |source| IndexError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let headers = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(IndexTable { headers, rows })
    }

    /// Write the whole table or nothing: rows go to a temporary file next to
    /// `path`, which then replaces `path` in one rename.
    pub fn write(&self, path: &Path) -> Result<(), IndexError> {
        let io_err = |source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            let csv_err = |source| IndexError::Csv {
                path: path.to_path_buf(),
                source,
            };
            writer.write_record(&self.headers).map_err(csv_err)?;
            for row in &self.rows {
                writer.write_record(row).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file_mut().flush().map_err(io_err)?;
        tmp.persist(path).map_err(|source| IndexError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Rebuild records; the headers must be exactly [`INDEX_COLUMNS`].
    pub fn to_records(&self) -> Result<Vec<FileRecord>, IndexError> {
        if self.headers != INDEX_COLUMNS {
            return Err(IndexValidationError::HeaderMismatch {
                expected: INDEX_COLUMNS.iter().map(|c| c.to_string()).collect(),
                found: self.headers.clone(),
            }
            .into());
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| row_to_record(i, row))
            .collect()
    }
}

fn format_timestamp(ts: &Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

fn parse_timestamp(row: usize, cell: &str) -> Result<Option<DateTime<Utc>>, IndexError> {
    if cell.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(cell)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| IndexError::MalformedRow {
            row,
            message: format!("bad timestamp '{cell}': {e}"),
        })
}

fn record_to_row(record: &FileRecord) -> Vec<String> {
    let meta = &record.file_metadata;
    vec![
        record.path.display().to_string(),
        record.filename_id.clone(),
        record.sample.id.clone(),
        record.sample.position.to_string(),
        record.sample.group.clone(),
        meta.size.to_string(),
        format_timestamp(&meta.created),
        format_timestamp(&meta.modified),
        meta.content_hash.clone(),
    ]
}

fn row_to_record(row_no: usize, row: &[String]) -> Result<FileRecord, IndexError> {
    let [path, filename_id, id, position, group, size, created, modified, hash] = row else {
        return Err(IndexError::MalformedRow {
            row: row_no,
            message: format!("expected {} cells, found {}", INDEX_COLUMNS.len(), row.len()),
        });
    };
    let size = size.parse::<u64>().map_err(|e| IndexError::MalformedRow {
        row: row_no,
        message: format!("bad file size '{size}': {e}"),
    })?;

    Ok(FileRecord {
        path: PathBuf::from(path),
        filename_id: filename_id.clone(),
        sample: SampleInfo {
            id: id.clone(),
            position: SamplePosition::from_cell(position),
            group: group.clone(),
        },
        file_metadata: FileMetadata {
            size,
            created: parse_timestamp(row_no, created)?,
            modified: parse_timestamp(row_no, modified)?,
            content_hash: hash.clone(),
        },
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Require a live record set and a persisted mirror to agree exactly.
pub fn validate(records: &[FileRecord], mirror: &IndexTable) -> Result<(), IndexValidationError> {
    validate_tables(&IndexTable::from_records(records), mirror)
}

/// Compare headers, then row count, then every row.
pub fn validate_tables(live: &IndexTable, mirror: &IndexTable) -> Result<(), IndexValidationError> {
    if live.headers != mirror.headers {
        return Err(IndexValidationError::HeaderMismatch {
            expected: live.headers.clone(),
            found: mirror.headers.clone(),
        });
    }
    if live.len() != mirror.len() {
        return Err(IndexValidationError::RowCountMismatch {
            expected: live.len(),
            found: mirror.len(),
        });
    }
    let rows: Vec<String> = live
        .rows
        .iter()
        .zip(&mirror.rows)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, (a, b))| format!("row {i}: {a:?} != {b:?}"))
        .collect();
    if !rows.is_empty() {
        return Err(IndexValidationError::RowMismatch { rows });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// Recursively find files ending in one of `suffixes`.
///
/// A file is dropped when any path component below `directory` starts with one
/// of `exclusions` (by default `"."`, i.e. hidden files and directories).
pub fn find_files(
    directory: &Path,
    suffixes: &[String],
    exclusions: &[String],
) -> Result<Vec<PathBuf>, IndexError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|source| IndexError::Walk {
            path: directory.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            found.push(entry.into_path());
        }
    }
    if found.is_empty() {
        warn!(
            "no files with suffixes {suffixes:?} were found in {}",
            directory.display()
        );
        return Ok(found);
    }

    let kept: Vec<PathBuf> = found
        .iter()
        .filter(|path| !is_excluded(directory, path, exclusions))
        .cloned()
        .collect();
    if kept.is_empty() {
        warn!(
            "all {} files in {} were excluded by {exclusions:?}",
            found.len(),
            directory.display()
        );
    }
    info!("found {} files in {}", kept.len(), directory.display());
    Ok(kept)
}

fn is_excluded(root: &Path, path: &Path, exclusions: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|part| {
        let part = part.as_os_str().to_string_lossy();
        exclusions.iter().any(|ex| part.starts_with(ex.as_str()))
    })
}

impl FileRecord {
    /// Derive identity and collect metadata for one file.
    pub fn collect(path: &Path, overrides: &IdentityOverrides) -> Result<Self, IndexError> {
        let sample = resolve_sample(path, overrides).map_err(|source| IndexError::Identity {
            path: path.to_path_buf(),
            source,
        })?;
        let file_metadata = collect_file_metadata(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(FileRecord {
            path: path.to_path_buf(),
            filename_id: filename_id(path),
            sample,
            file_metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// SpectrumIndex
// ---------------------------------------------------------------------------

/// The ordered record set, read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumIndex {
    records: Vec<FileRecord>,
}

impl SpectrumIndex {
    /// Keep the first record for each path.
    pub fn from_records(records: Vec<FileRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.path.clone()))
            .collect();
        SpectrumIndex { records }
    }

    /// Cold start: scan `directory`.
    ///
    /// Files whose identity or metadata cannot be derived are logged and left
    /// out; they never abort the scan.
    pub fn build(
        directory: &Path,
        suffixes: &[String],
        exclusions: &[String],
        overrides: &IdentityOverrides,
    ) -> Result<Self, IndexError> {
        let files = find_files(directory, suffixes, exclusions)?;
        Ok(Self::from_files(&files, overrides))
    }

    /// Index an explicit list of files, skipping the ones that fail.
    pub fn from_files(files: &[PathBuf], overrides: &IdentityOverrides) -> Self {
        let mut records = Vec::with_capacity(files.len());
        for path in files {
            match FileRecord::collect(path, overrides) {
                Ok(record) => records.push(record),
                Err(e) => error!("skipping file: {e}"),
            }
        }
        info!("indexed {} of {} files", records.len(), files.len());
        Self::from_records(records)
    }

    /// Scan `options.directory`, leaving out the mirror file itself.
    fn scan(options: &IndexOptions, overrides: &IdentityOverrides) -> Result<Self, IndexError> {
        let directory = options.directory.as_deref().ok_or(IndexError::NoSource)?;
        let mut files = find_files(directory, &options.suffixes, &options.exclusions)?;
        if let Some(own) = options.index_file.as_ref().and_then(|f| f.canonicalize().ok()) {
            files.retain(|p| p.canonicalize().map_or(true, |p| p != own));
        }
        Ok(Self::from_files(&files, overrides))
    }

    /// Warm start: reconstruct records from a persisted mirror.
    pub fn load(index_file: &Path) -> Result<Self, IndexError> {
        let table = IndexTable::read(index_file)?;
        let index = Self::from_records(table.to_records()?);
        info!(
            "loaded {} records from {}",
            index.len(),
            index_file.display()
        );
        Ok(index)
    }

    /// Reload from `options.index_file` when it exists (unless forced to
    /// reindex), otherwise scan `options.directory` and persist the result.
    pub fn load_or_build(
        options: &IndexOptions,
        overrides: &IdentityOverrides,
    ) -> Result<Self, IndexError> {
        match &options.index_file {
            Some(file) if file.exists() && !options.force_reindex => {
                return Self::warm_start(file, options, overrides);
            }
            Some(file) if file.exists() => {
                warn!("index file {} exists and will be overwritten", file.display());
            }
            Some(file) => {
                info!("index file {} does not exist yet", file.display());
            }
            None => {
                debug!("no index file given, index will not be reloaded or persisted");
            }
        }

        let index = Self::scan(options, overrides)?;

        // The mirror must reload into the same records before it is written.
        let table = index.to_table();
        validate(&table.to_records()?, &table)?;

        if let (true, Some(file)) = (options.persist, &options.index_file) {
            // A forced reindex always replaces the mirror, empty or not.
            if index.is_empty() && !options.force_reindex {
                warn!("index is empty, not persisting {}", file.display());
            } else {
                index.persist(file)?;
            }
        }
        Ok(index)
    }

    fn warm_start(
        file: &Path,
        options: &IndexOptions,
        overrides: &IdentityOverrides,
    ) -> Result<Self, IndexError> {
        let mirror = IndexTable::read(file)?;
        let index = Self::from_records(mirror.to_records()?);
        if options.verify_against_scan {
            if options.directory.is_some() {
                let scanned = Self::scan(options, overrides)?;
                validate(scanned.records(), &mirror)?;
                debug!("index file {} matches a fresh scan", file.display());
            } else {
                warn!("cannot verify {} without a directory to scan", file.display());
            }
        }
        info!("loaded {} records from {}", index.len(), file.display());
        Ok(index)
    }

    pub fn to_table(&self) -> IndexTable {
        IndexTable::from_records(&self.records)
    }

    /// Check this index against a persisted mirror.
    pub fn validate_against(&self, mirror: &IndexTable) -> Result<(), IndexValidationError> {
        validate(&self.records, mirror)
    }

    pub fn persist(&self, index_file: &Path) -> Result<(), IndexError> {
        self.to_table().write(index_file)?;
        info!(
            "persisted {} records to {}",
            self.records.len(),
            index_file.display()
        );
        Ok(())
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// See [`select`]: both filters together yield a union.
    pub fn select(&self, sample_groups: &[String], sample_ids: &[String]) -> Vec<&FileRecord> {
        select(&self.records, sample_groups, sample_ids)
    }

    pub fn group_by_group(&self) -> Vec<(String, Vec<&FileRecord>)> {
        group_by_group(&self.records)
    }

    pub fn group_by_sample(&self) -> Vec<(String, Vec<&FileRecord>)> {
        group_by_sample(&self.records)
    }
}
