//! Rendered column values
//!
//! A column renders a record into a [`Value`]; the encoder turns the value
//! into bytes with [`Value::write_text`]. Numbers use locale-independent,
//! shortest round-trip formatting.

use std::io::Write as _;

use bytes::Bytes;

/// A single rendered cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing value, written as an empty string
    #[default]
    Null,
    /// Boolean, written as `true` / `false`
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number, shortest representation without exponent
    Float(f64),
    /// UTF-8 text
    String(String),
    /// Raw bytes, written unchanged
    Bytes(Bytes),
}

impl Value {
    /// Append the textual form of the value to `out`
    pub fn write_text(&self, out: &mut Vec<u8>) {
        // Writing into a Vec cannot fail
        let _ = match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(out, "{}", v),
            Self::Int(v) => write!(out, "{}", v),
            Self::UInt(v) => write!(out, "{}", v),
            Self::Float(v) => write!(out, "{}", v),
            Self::String(v) => {
                out.extend_from_slice(v.as_bytes());
                Ok(())
            }
            Self::Bytes(v) => {
                out.extend_from_slice(v);
                Ok(())
            }
        };
    }

    /// Textual form of the value
    pub fn to_text(&self) -> String {
        let mut out = Vec::new();
        self.write_text(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::from(true).to_text(), "true");
        assert_eq!(Value::from(false).to_text(), "false");
        assert_eq!(Value::from(-42i64).to_text(), "-42");
        assert_eq!(Value::from(u64::MAX).to_text(), "18446744073709551615");
        assert_eq!(Value::from("foo").to_text(), "foo");
        assert_eq!(Value::from(b"a,b".to_vec()).to_text(), "a,b");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_float_minimal_digits() {
        assert_eq!(Value::from(42.1).to_text(), "42.1");
        assert_eq!(Value::from(1.0).to_text(), "1");
        assert_eq!(Value::from(0.000001).to_text(), "0.000001");
        assert_eq!(Value::from(1e21).to_text(), "1000000000000000000000");
    }

    #[test]
    fn test_text_parses_back() {
        for v in [0.1, -2.5, 123456.789, f64::MAX, f64::MIN_POSITIVE, 1e-7] {
            let parsed: f64 = Value::from(v).to_text().parse().unwrap();
            assert_eq!(parsed, v);
        }
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            let parsed: i64 = Value::from(v).to_text().parse().unwrap();
            assert_eq!(parsed, v);
        }
        for v in [true, false] {
            let parsed: bool = Value::from(v).to_text().parse().unwrap();
            assert_eq!(parsed, v);
        }
    }
}
