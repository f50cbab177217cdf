//! Byte-range reads of a completed job's output artifact.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};

use crate::job::{JobId, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} is {status}; no artifact to serve")]
    NotCompleted { id: JobId, status: JobStatus },

    #[error("artifact file missing: {0}")]
    MissingFile(PathBuf),

    #[error("malformed range {0:?}")]
    Malformed(String),

    #[error("range {range:?} not satisfiable for {total} bytes")]
    Unsatisfiable { range: String, total: u64 },

    #[error("artifact read: {0}")]
    Io(#[from] io::Error),
}

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `bytes start-end/total`, for a Content-Range reply.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parses `bytes=a-b`, `bytes=a-` or `bytes=-n` against a file of `total` bytes.
///
/// The end is clamped to the last byte. Only the first range of a list is used.
pub fn parse_range_header(header: &str, total: u64) -> Result<ByteRange, ArtifactError> {
    let malformed = || ArtifactError::Malformed(header.to_string());
    let unsatisfiable = || ArtifactError::Unsatisfiable {
        range: header.to_string(),
        total,
    };

    let ranges = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(malformed)?;
    let first = ranges.split(',').next().unwrap_or("").trim();
    let (a, b) = first.split_once('-').ok_or_else(malformed)?;
    let (a, b) = (a.trim(), b.trim());
    let parse = |s: &str| s.parse::<u64>().map_err(|_| malformed());

    if total == 0 {
        return Err(unsatisfiable());
    }
    let last = total - 1;
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Err(malformed()),
        (true, false) => {
            let n = parse(b)?;
            if n == 0 {
                return Err(unsatisfiable());
            }
            Ok(ByteRange {
                start: total.saturating_sub(n),
                end: last,
            })
        }
        (false, true) => {
            let start = parse(a)?;
            if start > last {
                return Err(unsatisfiable());
            }
            Ok(ByteRange { start, end: last })
        }
        (false, false) => {
            let start = parse(a)?;
            let end = parse(b)?;
            if start > end {
                return Err(malformed());
            }
            if start > last {
                return Err(unsatisfiable());
            }
            Ok(ByteRange {
                start,
                end: end.min(last),
            })
        }
    }
}

/// An open artifact positioned at the requested range.
#[derive(Debug)]
pub struct ArtifactRead {
    pub path: PathBuf,
    pub file_name: String,
    pub total_len: u64,
    pub range: ByteRange,
    /// True when a range was requested (a 206-style reply).
    pub partial: bool,
    pub reader: Take<File>,
}

/// Opens `path` for the requested range (whole file when `range` is None).
pub async fn open_range(path: &Path, range: Option<&str>) -> Result<ArtifactRead, ArtifactError> {
    let mut file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::MissingFile(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let total_len = file.metadata().await?.len();

    let (range, partial) = match range {
        Some(h) => (parse_range_header(h, total_len)?, true),
        None if total_len == 0 => (ByteRange { start: 0, end: 0 }, false),
        None => (
            ByteRange {
                start: 0,
                end: total_len - 1,
            },
            false,
        ),
    };
    if range.start > 0 {
        file.seek(SeekFrom::Start(range.start)).await?;
    }
    let limit = if total_len == 0 { 0 } else { range.len() };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ArtifactRead {
        path: path.to_path_buf(),
        file_name,
        total_len,
        range,
        partial,
        reader: file.take(limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_forms() {
        assert_eq!(
            parse_range_header("bytes=0-99", 1000).unwrap(),
            ByteRange { start: 0, end: 99 }
        );
        assert_eq!(
            parse_range_header("bytes=900-", 1000).unwrap(),
            ByteRange { start: 900, end: 999 }
        );
        assert_eq!(
            parse_range_header("bytes=-100", 1000).unwrap(),
            ByteRange { start: 900, end: 999 }
        );
        assert_eq!(
            parse_range_header("bytes=-5000", 1000).unwrap(),
            ByteRange { start: 0, end: 999 }
        );
        assert_eq!(
            parse_range_header("bytes=500-5000", 1000).unwrap(),
            ByteRange { start: 500, end: 999 }
        );
        assert_eq!(
            parse_range_header("bytes=0-0, 5-9", 10).unwrap().len(),
            1
        );
    }

    #[test]
    fn bad_ranges() {
        assert!(matches!(
            parse_range_header("items=0-1", 10),
            Err(ArtifactError::Malformed(_))
        ));
        assert!(matches!(
            parse_range_header("bytes=5-2", 10),
            Err(ArtifactError::Malformed(_))
        ));
        assert!(matches!(
            parse_range_header("bytes=x-2", 10),
            Err(ArtifactError::Malformed(_))
        ));
        assert!(matches!(
            parse_range_header("bytes=10-", 10),
            Err(ArtifactError::Unsatisfiable { .. })
        ));
        assert!(matches!(
            parse_range_header("bytes=-0", 10),
            Err(ArtifactError::Unsatisfiable { .. })
        ));
    }

    #[tokio::test]
    async fn reads_only_the_requested_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut read = open_range(&path, Some("bytes=2-5")).await.unwrap();
        assert!(read.partial);
        assert_eq!(read.total_len, 10);
        assert_eq!(read.range.content_range(read.total_len), "bytes 2-5/10");
        let mut buf = Vec::new();
        read.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"2345");

        let mut whole = open_range(&path, None).await.unwrap();
        assert!(!whole.partial);
        assert_eq!(whole.file_name, "song.mp3");
        let mut buf = Vec::new();
        whole.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"0123456789");
    }

    #[tokio::test]
    async fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_range(&dir.path().join("gone.mp3"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::MissingFile(_)));
    }
}
