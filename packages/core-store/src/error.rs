//! Error types for the core layer.

use crate::path::{Path, PathError};

/// Errors raised while resolving a path against a document.
///
/// Reads and deletes never fail on missing locations; only writes that would
/// have to reshape existing data end up here.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Path could not be parsed.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// A component along the path holds a scalar, which cannot have children.
    #[error("cannot write '{path}': component '{component}' holds a {found}, not a container")]
    NotAContainer {
        path: Path,
        component: String,
        found: &'static str,
    },

    /// A sequence was addressed with something other than an index.
    #[error("cannot write '{path}': '{component}' is not a sequence index")]
    InvalidIndex { path: Path, component: String },

    /// A sequence write would leave a gap.
    #[error("cannot write '{path}': index {index} out of bounds (len={len})")]
    IndexOutOfBounds { path: Path, index: usize, len: usize },
}

/// Name of a JSON value's shape, for error messages.
pub fn kind_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;
    use std::error::Error as StdError;

    #[test]
    fn not_a_container_display() {
        let e = Error::NotAContainer {
            path: path!("user.name.first"),
            component: "name".to_string(),
            found: "string",
        };
        let display = e.to_string();
        assert!(display.contains("user.name.first"));
        assert!(display.contains("'name'"));
        assert!(display.contains("string"));
    }

    #[test]
    fn index_out_of_bounds_display() {
        let e = Error::IndexOutOfBounds {
            path: path!("fruits.5"),
            index: 5,
            len: 2,
        };
        assert!(e.to_string().contains("len=2"));
    }

    #[test]
    fn path_error_conversion() {
        let e: Error = PathError::Empty { raw: ".".to_string() }.into();
        assert!(matches!(e, Error::Path(_)));
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn kind_names() {
        assert_eq!(kind_name(&json!(null)), "null");
        assert_eq!(kind_name(&json!(1)), "number");
        assert_eq!(kind_name(&json!([])), "sequence");
        assert_eq!(kind_name(&json!({})), "mapping");
    }
}
