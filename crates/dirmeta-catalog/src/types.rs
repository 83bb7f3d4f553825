//! Identifiers, value types and metadata values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a directory in the namespace tree
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirId(u64);

impl DirId {
    /// The root directory ID (always 1)
    pub const ROOT: DirId = DirId(1);

    /// Creates a new DirId from a raw u64 value
    pub fn new(id: u64) -> Self {
        DirId(id)
    }

    /// Returns the raw u64 value of this directory ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a declared metadata field
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(u64);

impl FieldId {
    /// Creates a new FieldId from a raw u64 value
    pub fn new(id: u64) -> Self {
        FieldId(id)
    }

    /// Returns the raw u64 value of this field ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a metadata set
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SetId(u64);

impl SetId {
    /// Creates a new SetId from a raw u64 value
    pub fn new(id: u64) -> Self {
        SetId(id)
    }

    /// Returns the raw u64 value of this set ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a file inside a directory, owned by the tree collaborator
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(u64);

impl FileId {
    /// Creates a new FileId from a raw u64 value
    pub fn new(id: u64) -> Self {
        FileId(id)
    }

    /// Returns the raw u64 value of this file ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Value type of a metadata field, parsed from its declared type string
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed integer column (INT, BIGINT, ...)
    Integer,
    /// Floating point column (FLOAT, DOUBLE, DECIMAL, ...)
    Float,
    /// Text column, optionally bounded (VARCHAR(n), TEXT)
    Text {
        /// Maximum length in characters, if bounded
        max_len: Option<usize>,
    },
    /// ISO-8601 date or timestamp, compared lexically
    DateTime,
    /// Reference to a metadata set by name
    MetaSet,
}

/// Declared type name that marks a field as a metadata-set reference.
pub const META_SET_TYPE: &str = "MetaSet";

/// Storage type backing MetaSet fields.
pub const META_SET_STORAGE_TYPE: &str = "VARCHAR(64)";

impl ValueType {
    /// Parses a declared type string such as `VARCHAR(32)` or `INT`.
    /// Returns None for unsupported types.
    pub fn parse(declared: &str) -> Option<Self> {
        let trimmed = declared.trim();
        if trimmed.eq_ignore_ascii_case(META_SET_TYPE) {
            return Some(ValueType::MetaSet);
        }
        let upper = trimmed.to_ascii_uppercase();
        let (base, arg) = match upper.find('(') {
            Some(open) => {
                let close = upper.rfind(')')?;
                if close < open || close != upper.len() - 1 {
                    return None;
                }
                (upper[..open].trim(), Some(upper[open + 1..close].trim()))
            }
            None => (upper.as_str(), None),
        };

        match base {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => {
                Some(ValueType::Integer)
            }
            "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => Some(ValueType::Float),
            "VARCHAR" | "CHAR" => {
                let len = arg?.parse::<usize>().ok()?;
                Some(ValueType::Text { max_len: Some(len) })
            }
            "TEXT" | "STRING" if arg.is_none() => Some(ValueType::Text { max_len: None }),
            "DATE" | "DATETIME" | "TIMESTAMP" => Some(ValueType::DateTime),
            _ => None,
        }
    }

    /// Returns true for types compared numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    /// Coerces a value to this type, returning a reason on failure.
    pub fn coerce(&self, value: &MetaValue, strict_len: bool) -> Result<MetaValue, String> {
        match (self, value) {
            (ValueType::Integer, MetaValue::Integer(i)) => Ok(MetaValue::Integer(*i)),
            (ValueType::Integer, MetaValue::Float(f)) => {
                // i64::MAX as f64 rounds up to 2^63, which is out of range.
                if !f.is_finite() || f.fract() != 0.0 {
                    Err(format!("{} is not an integer", f))
                } else if *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                    Err(format!("{} is out of integer range", f))
                } else {
                    Ok(MetaValue::Integer(*f as i64))
                }
            }
            (ValueType::Integer, MetaValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(MetaValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", s)),
            (ValueType::Float, MetaValue::Integer(i)) => Ok(MetaValue::Float(*i as f64)),
            (ValueType::Float, MetaValue::Float(f)) => Ok(MetaValue::Float(*f)),
            (ValueType::Float, MetaValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(MetaValue::Float)
                .map_err(|_| format!("'{}' is not a number", s)),
            (ValueType::Text { max_len }, v) => {
                let text = v.to_string();
                match max_len {
                    Some(max) if strict_len && text.chars().count() > *max => Err(format!(
                        "length {} exceeds maximum {}",
                        text.chars().count(),
                        max
                    )),
                    _ => Ok(MetaValue::Text(text)),
                }
            }
            (ValueType::DateTime, v) => Ok(MetaValue::Text(v.to_string())),
            (ValueType::MetaSet, MetaValue::Text(s)) => Ok(MetaValue::Text(s.clone())),
            (ValueType::MetaSet, v) => Err(format!("{} is not a metadata set name", v)),
        }
    }
}

/// A scalar metadata value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl MetaValue {
    /// Returns the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting and ordered comparisons.
    /// Numbers compare numerically with each other and sort before text.
    pub fn total_cmp(&self, other: &MetaValue) -> Ordering {
        match (self, other) {
            (MetaValue::Integer(a), MetaValue::Integer(b)) => a.cmp(b),
            (MetaValue::Integer(a), MetaValue::Float(b)) => (*a as f64).total_cmp(b),
            (MetaValue::Float(a), MetaValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            (MetaValue::Float(a), MetaValue::Float(b)) => a.total_cmp(b),
            (MetaValue::Text(a), MetaValue::Text(b)) => a.cmp(b),
            (MetaValue::Text(_), _) => Ordering::Greater,
            (_, MetaValue::Text(_)) => Ordering::Less,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Integer(i) => write!(f, "{}", i),
            MetaValue::Float(v) => write!(f, "{}", v),
            MetaValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Integer(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Integer(v as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

/// Definition of a declared metadata field as stored in the registry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field identifier
    pub id: FieldId,
    /// Unique field name
    pub name: String,
    /// Declared type string, kept verbatim
    pub declared_type: String,
    /// Parsed value type
    pub value_type: ValueType,
}

impl FieldDef {
    /// Returns true if values of this field name metadata sets.
    pub fn is_meta_set(&self) -> bool {
        self.value_type == ValueType::MetaSet
    }
}

/// Where a value reported for a directory comes from
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// Set directly on the directory
    Own,
    /// Inherited from a strict ancestor
    Inherited,
    /// Non-indexed parameter
    Parameter,
}

/// Value reported for a key: a single value or, for parameters with
/// several rows, a list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Exactly one value
    Single(MetaValue),
    /// Several parameter rows for the same key
    List(Vec<MetaValue>),
}

impl FieldValue {
    /// Returns the single value, if this is not a list.
    pub fn as_single(&self) -> Option<&MetaValue> {
        match self {
            FieldValue::Single(v) => Some(v),
            FieldValue::List(_) => None,
        }
    }
}

/// Opaque caller identity passed through to future extensions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(pub BTreeMap<String, String>);

impl Credentials {
    /// Creates empty credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns the caller's user name if one was supplied.
    pub fn user(&self) -> Option<&str> {
        self.0.get("username").map(String::as_str)
    }
}

/// A file reported by the directory tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// File identifier
    pub file_id: FileId,
    /// Directory containing the file
    pub dir: DirId,
    /// File name (may carry a path; only the base name is used)
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(ValueType::parse("INT"), Some(ValueType::Integer));
        assert_eq!(ValueType::parse("bigint"), Some(ValueType::Integer));
        assert_eq!(ValueType::parse("DOUBLE"), Some(ValueType::Float));
        assert_eq!(ValueType::parse("DECIMAL(10,2)"), Some(ValueType::Float));
        assert_eq!(
            ValueType::parse("VARCHAR(32)"),
            Some(ValueType::Text { max_len: Some(32) })
        );
        assert_eq!(ValueType::parse("TEXT"), Some(ValueType::Text { max_len: None }));
        assert_eq!(ValueType::parse("DATETIME"), Some(ValueType::DateTime));
        assert_eq!(ValueType::parse("MetaSet"), Some(ValueType::MetaSet));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(ValueType::parse("BLOB"), None);
        assert_eq!(ValueType::parse("VARCHAR"), None);
        assert_eq!(ValueType::parse("VARCHAR(x)"), None);
        assert_eq!(ValueType::parse("VARCHAR(3"), None);
    }

    #[test]
    fn test_coerce_integer() {
        let t = ValueType::Integer;
        assert_eq!(t.coerce(&"42".into(), true).unwrap(), MetaValue::Integer(42));
        assert_eq!(t.coerce(&MetaValue::Float(3.0), true).unwrap(), MetaValue::Integer(3));
        assert!(t.coerce(&MetaValue::Float(3.5), true).is_err());
        assert!(t.coerce(&"red".into(), true).is_err());
    }

    #[test]
    fn test_coerce_integer_rejects_out_of_range_floats() {
        let t = ValueType::Integer;
        assert!(t.coerce(&MetaValue::Float(1e20), true).is_err());
        assert!(t.coerce(&MetaValue::Float(-1e20), true).is_err());
        assert!(t.coerce(&MetaValue::Float(9_223_372_036_854_775_808.0), true).is_err());
        assert_eq!(
            t.coerce(&MetaValue::Float(-9_223_372_036_854_775_808.0), true).unwrap(),
            MetaValue::Integer(i64::MIN)
        );
        assert!(t.coerce(&MetaValue::Float(f64::INFINITY), true).is_err());
    }

    #[test]
    fn test_coerce_text_length() {
        let t = ValueType::Text { max_len: Some(3) };
        assert_eq!(t.coerce(&"abc".into(), true).unwrap(), MetaValue::Text("abc".into()));
        assert!(t.coerce(&"abcd".into(), true).is_err());
        assert!(t.coerce(&"abcd".into(), false).is_ok());
        assert_eq!(t.coerce(&MetaValue::Integer(7), true).unwrap(), MetaValue::Text("7".into()));
    }

    #[test]
    fn test_total_cmp_mixed_numbers() {
        assert_eq!(
            MetaValue::Integer(2).total_cmp(&MetaValue::Float(2.5)),
            Ordering::Less
        );
        assert_eq!(
            MetaValue::Text("a".into()).total_cmp(&MetaValue::Integer(100)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_dir_id_display() {
        assert_eq!(format!("{}", DirId::new(42)), "42");
        assert_eq!(DirId::ROOT.as_u64(), 1);
    }
}
