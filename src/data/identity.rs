//! Filename -> (sample id, position, group) heuristic.
//!
//! The rules are deliberately approximate and must stay exactly as they are:
//! grouping downstream depends on matching them character for character.

use std::path::Path;

use sha2::{Digest, Sha256};

use super::model::{SampleInfo, SamplePosition};
use crate::config::IdentityOverrides;
use crate::error::IdentityError;

/// Separators tried in this order; the first one present in the stem wins.
pub const STEM_SEPARATORS: [char; 3] = ['_', ' ', '-'];

/// Maximum length of a derived group code.
pub const MAX_GROUP_LEN: usize = 4;

const FILENAME_HASH_LEN: usize = 10;

/// Split a file stem into sample id and position.
pub fn parse_stem(stem: &str) -> Result<(String, SamplePosition), IdentityError> {
    let Some(separator) = STEM_SEPARATORS.iter().copied().find(|s| stem.contains(*s)) else {
        return Ok((stem.to_string(), SamplePosition::Index(0)));
    };
    let tokens: Vec<&str> = stem.split(separator).collect();

    match tokens.len() {
        0 | 1 => Ok((stem.to_string(), SamplePosition::Index(0))),
        2 => {
            let digits = extract_digits(tokens[1]);
            let position = if digits.is_empty() {
                SamplePosition::Label(tokens[1].to_string())
            } else {
                SamplePosition::Index(parse_digits(stem, &digits)?)
            };
            Ok((tokens[0].to_string(), position))
        }
        n => {
            let last = tokens[n - 1];
            let digits = extract_digits(last);
            if digits.is_empty() {
                return Err(IdentityError::MissingPositionDigits {
                    stem: stem.to_string(),
                    token: last.to_string(),
                });
            }
            let id = tokens[..n - 1].join("_");
            Ok((id, SamplePosition::Index(parse_digits(stem, &digits)?)))
        }
    }
}

fn extract_digits(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn parse_digits(stem: &str, digits: &str) -> Result<i64, IdentityError> {
    digits
        .parse::<i64>()
        .map_err(|_| IdentityError::PositionOverflow {
            stem: stem.to_string(),
            digits: digits.to_string(),
        })
}

/// Reference samples are matched literally before any splitting happens.
fn reference_sample(stem: &str, overrides: &IdentityOverrides) -> Option<String> {
    overrides
        .reference_ids
        .iter()
        .find(|reference| stem == reference.as_str())
        .cloned()
}

/// Leading alphabetic run of the sample id, at most [`MAX_GROUP_LEN`] characters.
pub fn group_from_sample_id(sample_id: &str) -> String {
    sample_id
        .chars()
        .take_while(|c| c.is_alphabetic())
        .take(MAX_GROUP_LEN)
        .collect()
}

/// Resolve the full sample identity of a file, applying the override tables.
pub fn resolve_sample(path: &Path, overrides: &IdentityOverrides) -> Result<SampleInfo, IdentityError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (parsed_id, position) = match reference_sample(&stem, overrides) {
        Some(reference) => (reference, SamplePosition::Index(0)),
        None => parse_stem(&stem)?,
    };

    let id = overrides
        .sample_ids
        .get(&parsed_id)
        .cloned()
        .unwrap_or(parsed_id);

    let mut group = group_from_sample_id(&id);
    if let Some(parent) = path.parent() {
        for (segment, code) in &overrides.group_path_segments {
            if parent.components().any(|c| c.as_os_str() == segment.as_str()) {
                group = code.clone();
            }
        }
    }

    Ok(SampleInfo { id, position, group })
}

/// Stable id for a file: its stem plus a short hash of the full path.
pub fn filename_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hash = hex::encode(digest);
    format!("{stem}_{}", &hash[..FILENAME_HASH_LEN])
}
