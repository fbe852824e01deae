//! Minimal JSON path: dot-separated keys with `[n]` array indexes
//!
//! `key1[1].key3` selects `"val3"` from `{"key1":[{},{"key3":"val3"}]}`.
//! The empty path selects the whole document.

use serde_json::Value as JsonValue;

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parsed JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse a path, the empty string is the document root
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |message: &str| ModelError::InvalidPath {
            path: path.to_owned(),
            message: message.to_owned(),
        };

        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self { segments });
        }

        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if key.is_empty() && rest.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_owned()));
            }
            while !rest.is_empty() {
                let Some(end) = rest.find(']') else {
                    return Err(invalid("unclosed bracket"));
                };
                if !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after index"));
                }
                let index = rest[1..end]
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                segments.push(Segment::Index(index));
                rest = &rest[end + 1..];
            }
        }

        Ok(Self { segments })
    }

    /// Select the value at the path
    pub fn lookup<'a>(&self, root: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(index) => current.as_array()?.get(*index),
            })
    }
}
