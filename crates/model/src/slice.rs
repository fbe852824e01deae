//! Slice descriptor
//!
//! A slice is the part of a file written by one writer on one volume.

use std::path::PathBuf;

use sluice_config::EncodingConfig;

use crate::column::Columns;
use crate::key::SliceKey;

/// Base name of the slice data file, the compression extension is appended
pub const SLICE_FILENAME: &str = "slice.csv";

/// Backup of the completed writes counter
pub const COMPLETED_COUNT_FILE: &str = "completed_count";

/// Backup of the compressed size meter
pub const COMPRESSED_SIZE_FILE: &str = "compressed_size";

/// Backup of the uncompressed size meter
pub const UNCOMPRESSED_SIZE_FILE: &str = "uncompressed_size";

/// One output file currently being written
#[derive(Debug, Clone)]
pub struct Slice {
    /// Slice identity
    pub key: SliceKey,
    /// Column mapping, one CSV column per entry
    pub columns: Columns,
    /// Encoder, buffers, compression and sync policy
    pub encoding: EncodingConfig,
    /// Bytes to pre-allocate for the data file, 0 = volume default
    pub allocated_disk_space: u64,
}

impl Slice {
    /// Create a slice with the volume default allocation
    pub fn new(key: SliceKey, columns: Columns, encoding: EncodingConfig) -> Self {
        Self {
            key,
            columns,
            encoding,
            allocated_disk_space: 0,
        }
    }

    /// Slice directory relative to the volume root
    pub fn dir_path(&self) -> PathBuf {
        self.key.dir_path()
    }

    /// Data file name, e.g. `slice.csv.gz`
    pub fn filename(&self) -> String {
        format!(
            "{}{}",
            SLICE_FILENAME,
            self.encoding.compression.kind.file_extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::key::VolumeId;
    use crate::time::parse_time;
    use sluice_config::CompressionConfig;

    fn test_slice(compression: CompressionConfig) -> Slice {
        let key = SliceKey {
            project_id: 1,
            branch_id: 2,
            source_id: "src".into(),
            sink_id: "sink".into(),
            file_opened_at: parse_time("2000-01-01T00:00:00.000Z").unwrap(),
            volume_id: VolumeId::new("vol"),
            slice_opened_at: parse_time("2000-01-01T01:00:00.000Z").unwrap(),
        };
        let columns = Columns::new(vec![Column::Body {
            name: "body".into(),
            primary_key: false,
        }])
        .unwrap();
        let encoding = EncodingConfig {
            compression,
            ..Default::default()
        };
        Slice::new(key, columns, encoding)
    }

    #[test]
    fn test_filename() {
        assert_eq!(test_slice(CompressionConfig::none()).filename(), "slice.csv");
        assert_eq!(test_slice(CompressionConfig::default()).filename(), "slice.csv.gz");
        assert_eq!(test_slice(CompressionConfig::zstd()).filename(), "slice.csv.zstd");
    }

    #[test]
    fn test_dir_path() {
        let slice = test_slice(CompressionConfig::none());
        assert_eq!(
            slice.dir_path(),
            PathBuf::from("1/2/src/sink/2000-01-01T00-00-00-000Z/2000-01-01T01-00-00-000Z")
        );
    }
}
