//! Slice identity

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::format_time;

/// Identifier of a disk volume, stored in the volume's `volume-id` file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(String);

impl VolumeId {
    /// Wrap an existing ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Composite key of a slice
///
/// Displayed as
/// `project/branch/source/sink/fileOpenedAt/volume/sliceOpenedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceKey {
    /// Project the data belongs to
    pub project_id: u64,
    /// Branch within the project
    pub branch_id: u64,
    /// Source the records came from
    pub source_id: String,
    /// Sink the records are mapped for
    pub sink_id: String,
    /// When the parent file was opened
    pub file_opened_at: DateTime<Utc>,
    /// Volume the slice is stored on
    pub volume_id: VolumeId,
    /// When this slice was opened
    pub slice_opened_at: DateTime<Utc>,
}

impl SliceKey {
    /// Slice directory relative to the volume root
    ///
    /// Timestamps have `:` and `.` replaced by `-` to keep the path portable.
    pub fn dir_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(self.project_id.to_string());
        path.push(self.branch_id.to_string());
        path.push(&self.source_id);
        path.push(&self.sink_id);
        path.push(path_safe_time(&self.file_opened_at));
        path.push(path_safe_time(&self.slice_opened_at));
        path
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}/{}",
            self.project_id,
            self.branch_id,
            self.source_id,
            self.sink_id,
            format_time(&self.file_opened_at),
            self.volume_id,
            format_time(&self.slice_opened_at),
        )
    }
}

fn path_safe_time(t: &DateTime<Utc>) -> String {
    format_time(t).replace([':', '.'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_time;

    fn test_key() -> SliceKey {
        SliceKey {
            project_id: 123,
            branch_id: 456,
            source_id: "my-source".into(),
            sink_id: "my-sink".into(),
            file_opened_at: parse_time("2000-01-01T19:00:00.000Z").unwrap(),
            volume_id: VolumeId::new("my-volume"),
            slice_opened_at: parse_time("2000-01-01T20:00:00.000Z").unwrap(),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            test_key().to_string(),
            "123/456/my-source/my-sink/2000-01-01T19:00:00.000Z/my-volume/2000-01-01T20:00:00.000Z"
        );
    }

    #[test]
    fn test_dir_path() {
        assert_eq!(
            test_key().dir_path(),
            PathBuf::from(
                "123/456/my-source/my-sink/2000-01-01T19-00-00-000Z/2000-01-01T20-00-00-000Z"
            )
        );
    }

    #[test]
    fn test_volume_id_serde_transparent() {
        let json = serde_json::to_string(&VolumeId::new("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }
}
