//! Aggregated errors
//!
//! Multi-stage operations (chain flush/close, event dispatch, volume close)
//! run every step and collect all failures instead of stopping at the first.

use std::error::Error;
use std::fmt;

/// Boxed error used for callbacks and heterogeneous stages
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Ordered collection of errors
///
/// A single error displays as itself, more errors as a `- ` list.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<BoxError>,
}

impl MultiError {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error
    pub fn push(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    /// Append the error of a failed result
    pub fn check<E: Into<BoxError>>(&mut self, result: Result<(), E>) {
        if let Err(err) = result {
            self.push(err);
        }
    }

    /// Whether no error was collected
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of collected errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Collected errors in order
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    /// Message prefixed by `prefix`, lists start on a new line
    pub fn prefixed(&self, prefix: &str) -> String {
        if self.errors.len() == 1 {
            format!("{}: {}", prefix, self)
        } else {
            format!("{}:\n{}", prefix, self)
        }
    }

    /// `Ok` if empty, otherwise the collection itself
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.errors.as_slice() {
            return write!(f, "{}", single);
        }
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            // Nested lists are indented under their bullet
            let text = err.to_string().replace('\n', "\n  ");
            write!(f, "- {}", text)?;
        }
        Ok(())
    }
}

impl Error for MultiError {}

impl From<BoxError> for MultiError {
    fn from(err: BoxError) -> Self {
        Self { errors: vec![err] }
    }
}
