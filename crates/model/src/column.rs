//! Column mapping
//!
//! Each column renders one cell of the output row from a [`Record`].
//! Columns serialize as `{"type": "...", "name": "...", ...}`.
//!
//! | Type | Renders |
//! |------|---------|
//! | `uuid-v7` | A new time-ordered UUID |
//! | `datetime` | Record timestamp, `2000-01-01T01:00:00.000Z` |
//! | `ip` | Client address |
//! | `body` | Raw body bytes |
//! | `headers` | JSON object of first header values |
//! | `id` | Placeholder replaced by the staging layer |
//! | `template` | Template evaluated by the record |
//! | `path` | JSON value selected from the body |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ModelError, Result};
use crate::path::JsonPath;
use crate::record::Record;
use crate::time::format_time;
use crate::value::Value;

/// Rendered by `id` columns, replaced by a sequence number during import
pub const ID_PLACEHOLDER: &str = "<<~~id~~>>";

/// Expression language of a template column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateLanguage {
    /// Jsonnet
    Jsonnet,
}

impl fmt::Display for TemplateLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jsonnet => f.write_str("jsonnet"),
        }
    }
}

/// Template of a template column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Expression language
    pub language: TemplateLanguage,
    /// Template source
    pub content: String,
}

/// One output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Column {
    /// Time-ordered UUID
    #[serde(rename = "uuid-v7")]
    Uuid {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Record timestamp
    #[serde(rename = "datetime")]
    Datetime {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Client IP address
    #[serde(rename = "ip")]
    Ip {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Raw body
    #[serde(rename = "body")]
    Body {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Headers as a JSON object
    #[serde(rename = "headers")]
    Headers {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Row ID placeholder
    #[serde(rename = "id")]
    Id {
        name: String,
        #[serde(default)]
        primary_key: bool,
    },
    /// Template evaluated against the record
    #[serde(rename = "template")]
    Template {
        name: String,
        #[serde(default)]
        primary_key: bool,
        template: Template,
    },
    /// Value selected from the JSON body
    #[serde(rename = "path")]
    Path {
        name: String,
        #[serde(default)]
        primary_key: bool,
        #[serde(default)]
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(default)]
        raw_string: bool,
    },
}

impl Column {
    /// Column name
    pub fn name(&self) -> &str {
        match self {
            Self::Uuid { name, .. }
            | Self::Datetime { name, .. }
            | Self::Ip { name, .. }
            | Self::Body { name, .. }
            | Self::Headers { name, .. }
            | Self::Id { name, .. }
            | Self::Template { name, .. }
            | Self::Path { name, .. } => name,
        }
    }

    /// Whether the column is part of the primary key
    pub fn is_primary_key(&self) -> bool {
        match self {
            Self::Uuid { primary_key, .. }
            | Self::Datetime { primary_key, .. }
            | Self::Ip { primary_key, .. }
            | Self::Body { primary_key, .. }
            | Self::Headers { primary_key, .. }
            | Self::Id { primary_key, .. }
            | Self::Template { primary_key, .. }
            | Self::Path { primary_key, .. } => *primary_key,
        }
    }

    /// Type tag as used in JSON
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Uuid { .. } => "uuid-v7",
            Self::Datetime { .. } => "datetime",
            Self::Ip { .. } => "ip",
            Self::Body { .. } => "body",
            Self::Headers { .. } => "headers",
            Self::Id { .. } => "id",
            Self::Template { .. } => "template",
            Self::Path { .. } => "path",
        }
    }

    /// Render the cell for the record
    pub fn render(&self, record: &dyn Record) -> Result<Value> {
        match self {
            Self::Uuid { .. } => Ok(Value::String(uuid::Uuid::now_v7().to_string())),
            Self::Datetime { .. } => Ok(Value::String(format_time(&record.timestamp()))),
            Self::Ip { .. } => Ok(record
                .client_ip()
                .map(|ip| ip.to_canonical().to_string())
                .into()),
            Self::Body { .. } => Ok(Value::Bytes(record.body()?)),
            Self::Headers { .. } => {
                let mut first = BTreeMap::new();
                for (name, value) in record.headers() {
                    first.entry(name.as_str()).or_insert(value.as_str());
                }
                Ok(Value::String(serde_json::to_string(&first)?))
            }
            Self::Id { .. } => Ok(Value::String(ID_PLACEHOLDER.to_owned())),
            Self::Template { template, .. } => {
                record.render_template(template.language, &template.content)
            }
            Self::Path {
                path,
                default_value,
                raw_string,
                ..
            } => render_path(record, path, default_value.as_deref(), *raw_string),
        }
    }
}

fn render_path(
    record: &dyn Record,
    path: &str,
    default_value: Option<&str>,
    raw_string: bool,
) -> Result<Value> {
    let body = record.body_json()?;
    let selected = JsonPath::parse(path)?.lookup(&body).cloned();

    let value = match (selected, default_value) {
        (Some(v), _) => v,
        (None, Some(default)) => JsonValue::String(default.to_owned()),
        (None, None) => return Err(ModelError::PathNotFound(path.to_owned())),
    };

    match value {
        JsonValue::String(s) if raw_string => Ok(Value::String(s)),
        other => Ok(Value::String(serde_json::to_string(&other)?)),
    }
}

/// Ordered column set; render order equals column order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Columns(Vec<Column>);

impl Columns {
    /// Create a validated column set
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let columns = Self(columns);
        columns.validate()?;
        Ok(columns)
    }

    /// Check that there is at least one column and names are unique
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(ModelError::NoColumns);
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.0 {
            if !seen.insert(column.name()) {
                return Err(ModelError::DuplicateColumn(column.name().to_owned()));
            }
        }
        Ok(())
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no columns
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate columns in order
    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.0.iter()
    }

    /// Column names in order
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Column::name).collect()
    }

    /// Column at `index`
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.0.get(index)
    }
}

impl<'a> IntoIterator for &'a Columns {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[path = "column_test.rs"]
mod column_test;
