//! Chunk identifiers and their file-name-safe string form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, Result};

/// Identifies one unit of comparison work.
///
/// `table_index` selects the table within the run; `bucket_index_left`
/// and `bucket_index_right` name the coarse bucket range the chunk was
/// split from; `chunk_index` is the position within that bucket's
/// sub-split and `chunk_cnt` the total number of chunks produced there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkId {
    pub table_index: usize,
    pub bucket_index_left: usize,
    pub bucket_index_right: usize,
    pub chunk_index: usize,
    pub chunk_cnt: usize,
}

impl ChunkId {
    pub fn new(
        table_index: usize,
        bucket_index_left: usize,
        bucket_index_right: usize,
        chunk_index: usize,
        chunk_cnt: usize,
    ) -> Self {
        Self {
            table_index,
            bucket_index_left,
            bucket_index_right,
            chunk_index,
            chunk_cnt,
        }
    }

    /// File-name-safe key: `"<table>:<bucket_left>-<bucket_right>:<chunk>"`.
    ///
    /// `chunk_cnt` is bucket bookkeeping and is not part of the identity
    /// encoded here.
    pub fn to_file_name(&self) -> String {
        format!(
            "{}:{}-{}:{}",
            self.table_index, self.bucket_index_left, self.bucket_index_right, self.chunk_index
        )
    }

    /// Parse the file-name form back into an id (`chunk_cnt` is 0).
    pub fn from_file_name(name: &str) -> Result<Self> {
        let invalid = || DiffError::InvalidChunkId(name.to_string());

        let mut parts = name.split(':');
        let table_index = parts.next().ok_or_else(invalid)?;
        let buckets = parts.next().ok_or_else(invalid)?;
        let chunk_index = parts.next().ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let (left, right) = buckets.split_once('-').ok_or_else(invalid)?;

        Ok(Self {
            table_index: table_index.parse().map_err(|_| invalid())?,
            bucket_index_left: left.parse().map_err(|_| invalid())?,
            bucket_index_right: right.parse().map_err(|_| invalid())?,
            chunk_index: chunk_index.parse().map_err(|_| invalid())?,
            chunk_cnt: 0,
        })
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_file_name() {
        let id = ChunkId::new(1, 2, 3, 4, 10);
        assert_eq!(id.to_file_name(), "1:2-3:4");
    }

    #[test]
    fn test_from_file_name() {
        let id = ChunkId::from_file_name("11:12-13:14").unwrap();
        assert_eq!(id.table_index, 11);
        assert_eq!(id.bucket_index_left, 12);
        assert_eq!(id.bucket_index_right, 13);
        assert_eq!(id.chunk_index, 14);
    }

    #[test]
    fn test_round_trip() {
        let id = ChunkId::new(7, 0, 0, 42, 0);
        assert_eq!(ChunkId::from_file_name(&id.to_file_name()).unwrap(), id);
    }

    #[test]
    fn test_invalid_forms() {
        for bad in ["", "1:2:3", "1:2-3", "a:2-3:4", "1:2-3:4:5", "1:23:4"] {
            assert!(ChunkId::from_file_name(bad).is_err(), "{bad:?}");
        }
    }
}
