//! Field-path parsing
//!
//! Filter and sort paths address a field, optionally one hash subkey, and
//! optionally carry an explicit equality marker: `field`, `field__eq`,
//! `field__subkey`, `field__subkey__eq`. Parsing is purely syntactic; whether
//! the shape fits the field's declared kind is checked by the planner against
//! the schema.

use super::errors::{QueryError, QueryResult};

/// Separator between path segments
const SEPARATOR: &str = "__";

/// Suffix marking explicit equality (the only supported operator)
const EQ_SUFFIX: &str = "eq";

/// A parsed filter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The path as written, kept for error reporting
    pub raw: String,
    /// Base field name
    pub field: String,
    /// Hash subkey, when the path has two segments
    pub subkey: Option<String>,
    /// Whether the `__eq` marker was written out
    pub explicit_eq: bool,
}

impl FieldPath {
    /// Parses `field[__subkey][__eq]`.
    ///
    /// A lone `eq` is a field name, not a marker; the marker only counts
    /// when something precedes it.
    pub fn parse(raw: &str) -> QueryResult<Self> {
        let mut segments: Vec<&str> = raw.split(SEPARATOR).collect();

        let explicit_eq = segments.len() > 1 && segments.last() == Some(&EQ_SUFFIX);
        if explicit_eq {
            segments.pop();
        }

        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(QueryError::MalformedPath {
                path: raw.to_string(),
                reason: "empty path segment".to_string(),
            });
        }

        match segments.as_slice() {
            [field] => Ok(Self {
                raw: raw.to_string(),
                field: (*field).to_string(),
                subkey: None,
                explicit_eq,
            }),
            [field, subkey] => Ok(Self {
                raw: raw.to_string(),
                field: (*field).to_string(),
                subkey: Some((*subkey).to_string()),
                explicit_eq,
            }),
            _ => Err(QueryError::MalformedPath {
                path: raw.to_string(),
                reason: "too many segments".to_string(),
            }),
        }
    }
}
