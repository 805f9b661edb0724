use std::collections::HashSet;
use std::path::Path;

use log::debug;

use super::model::FileRecord;

// ---------------------------------------------------------------------------
// Selection: which groups and sample ids take part in a run
// ---------------------------------------------------------------------------

/// Requested sample groups and sample ids. Both empty means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSelection {
    pub sample_groups: Vec<String>,
    pub sample_ids: Vec<String>,
}

impl SampleSelection {
    pub fn new(sample_groups: Vec<String>, sample_ids: Vec<String>) -> Self {
        SampleSelection {
            sample_groups,
            sample_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_groups.is_empty() && self.sample_ids.is_empty()
    }

    pub fn apply<'a>(&self, records: &'a [FileRecord]) -> Vec<&'a FileRecord> {
        select(records, &self.sample_groups, &self.sample_ids)
    }
}

/// Return the records matching the requested groups and ids.
///
/// * no filters → every record, in index order
/// * groups only → records whose group is requested
/// * ids only → records whose sample id is requested
/// * both → the group matches followed by the id matches not already taken,
///   i.e. the **union** of the two subsets, never their intersection
pub fn select<'a>(
    records: &'a [FileRecord],
    sample_groups: &[String],
    sample_ids: &[String],
) -> Vec<&'a FileRecord> {
    if sample_groups.is_empty() && sample_ids.is_empty() {
        debug!("no selection filters, selected all {} records", records.len());
        return records.iter().collect();
    }

    let mut taken: HashSet<&Path> = HashSet::new();
    let mut selection = Vec::new();

    let by_group = records
        .iter()
        .filter(|r| sample_groups.contains(&r.sample.group));
    let by_id = records.iter().filter(|r| sample_ids.contains(&r.sample.id));

    for record in by_group.chain(by_id) {
        if taken.insert(record.path.as_path()) {
            selection.push(record);
        }
    }

    debug!("selected {} of {} records", selection.len(), records.len());
    selection
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Partition by a key, keeping keys and members in first-encounter order.
fn partition_by<'a, I, F>(records: I, key: F) -> Vec<(String, Vec<&'a FileRecord>)>
where
    I: IntoIterator<Item = &'a FileRecord>,
    F: Fn(&FileRecord) -> &str,
{
    let mut partitions: Vec<(String, Vec<&'a FileRecord>)> = Vec::new();
    for record in records {
        let k = key(record);
        match partitions.iter_mut().find(|(name, _)| name == k) {
            Some((_, members)) => members.push(record),
            None => partitions.push((k.to_string(), vec![record])),
        }
    }
    partitions
}

/// Records partitioned by sample group.
pub fn group_by_group<'a, I>(records: I) -> Vec<(String, Vec<&'a FileRecord>)>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    partition_by(records, |r| r.sample.group.as_str())
}

/// Records partitioned by sample id.
pub fn group_by_sample<'a, I>(records: I) -> Vec<(String, Vec<&'a FileRecord>)>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    partition_by(records, |r| r.sample.id.as_str())
}
