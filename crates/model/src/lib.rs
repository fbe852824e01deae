//! Sluice - Model
//!
//! Shared data model of the local write path: slice keys, the slice
//! descriptor, column mapping and the record capability consumed by columns.
//!
//! # Overview
//!
//! ```text
//! Record ──render──> Columns ──> [Value, Value, ...] ──> encoder
//! ```
//!
//! A [`Slice`] describes one output file currently being written. Its
//! [`SliceKey`] identifies it across project, branch, source, sink, file,
//! volume and slice open time.

mod column;
mod error;
mod key;
mod path;
mod record;
mod slice;
mod time;
mod value;

pub use column::{Column, Columns, ID_PLACEHOLDER, Template, TemplateLanguage};
pub use error::{ModelError, Result};
pub use key::{SliceKey, VolumeId};
pub use path::JsonPath;
pub use record::{Record, StaticRecord};
pub use slice::{
    COMPLETED_COUNT_FILE, COMPRESSED_SIZE_FILE, SLICE_FILENAME, Slice, UNCOMPRESSED_SIZE_FILE,
};
pub use time::{TIME_FORMAT, format_time, parse_time};
pub use value::Value;
