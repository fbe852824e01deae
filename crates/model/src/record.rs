//! Record capability consumed by columns
//!
//! The mapping layer decides how fields were derived (HTTP request, queue
//! message, ...). Columns only need these accessors.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::column::TemplateLanguage;
use crate::error::{ModelError, Result};
use crate::value::Value;

/// A record to be rendered into one table row
pub trait Record: Send + Sync {
    /// When the record was received
    fn timestamp(&self) -> DateTime<Utc>;

    /// Address of the client that sent the record
    fn client_ip(&self) -> Option<IpAddr>;

    /// Headers in the order received, names as sent
    fn headers(&self) -> &[(String, String)];

    /// Raw body
    fn body(&self) -> Result<Bytes>;

    /// Body parsed as JSON
    fn body_json(&self) -> Result<JsonValue> {
        Ok(serde_json::from_slice(&self.body()?)?)
    }

    /// Evaluate a template against the record
    fn render_template(&self, language: TemplateLanguage, content: &str) -> Result<Value> {
        let _ = content;
        Err(ModelError::TemplateUnsupported(language.to_string()))
    }
}

type TemplateFn = dyn Fn(&StaticRecord, TemplateLanguage, &str) -> Result<Value> + Send + Sync;

/// In-memory record with fixed fields
///
/// # Example
///
/// ```
/// use sluice_model::StaticRecord;
///
/// let record = StaticRecord::new(chrono::Utc::now())
///     .with_header("Content-Type", "application/json")
///     .with_body(r#"{"a":1}"#);
/// ```
#[derive(Clone)]
pub struct StaticRecord {
    timestamp: DateTime<Utc>,
    client_ip: Option<IpAddr>,
    headers: Vec<(String, String)>,
    body: Bytes,
    template: Option<Arc<TemplateFn>>,
}

impl StaticRecord {
    /// Create an empty record received at `timestamp`
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            client_ip: None,
            headers: Vec::new(),
            body: Bytes::new(),
            template: None,
        }
    }

    /// Set the client address
    #[must_use]
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the template engine used by template columns
    #[must_use]
    pub fn with_template_engine<F>(mut self, engine: F) -> Self
    where
        F: Fn(&StaticRecord, TemplateLanguage, &str) -> Result<Value> + Send + Sync + 'static,
    {
        self.template = Some(Arc::new(engine));
        self
    }
}

impl fmt::Debug for StaticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRecord")
            .field("timestamp", &self.timestamp)
            .field("client_ip", &self.client_ip)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("template", &self.template.is_some())
            .finish()
    }
}

impl Record for StaticRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn body(&self) -> Result<Bytes> {
        Ok(self.body.clone())
    }

    fn render_template(&self, language: TemplateLanguage, content: &str) -> Result<Value> {
        match &self.template {
            Some(engine) => engine(self, language, content),
            None => Err(ModelError::TemplateUnsupported(language.to_string())),
        }
    }
}
