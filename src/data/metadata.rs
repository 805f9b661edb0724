use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};

use super::model::FileMetadata;

/// Timestamps are kept at the precision the index mirror stores.
const TIMESTAMP_DIGITS: u16 = 6;

/// Collect size, timestamps and content hash of a file.
pub fn collect_file_metadata(path: &Path) -> io::Result<FileMetadata> {
    let meta = std::fs::metadata(path)?;
    Ok(FileMetadata {
        size: meta.len(),
        created: meta.created().ok().map(to_utc),
        modified: meta.modified().ok().map(to_utc),
        content_hash: hash_file(path)?,
    })
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time).trunc_subsecs(TIMESTAMP_DIGITS)
}

/// Hex sha256 of a file, read in fixed-size chunks.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn metadata_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1_1.txt");
        std::fs::write(&path, "100\t1\n200\t2\n").unwrap();

        let first = collect_file_metadata(&path).unwrap();
        assert_eq!(first.size, 12);
        assert_eq!(first.content_hash.len(), 64);
        assert!(first.modified.is_some());

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "300\t3").unwrap();
        let second = collect_file_metadata(&path).unwrap();
        assert_ne!(first.content_hash, second.content_hash);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(collect_file_metadata(Path::new("/no/such/file.txt")).is_err());
    }
}
