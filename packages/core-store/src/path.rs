//! Dotted path type addressing locations inside a document.

use std::fmt;

/// Errors related to path parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path string had no segments once empty ones were dropped.
    Empty { raw: String },
    /// A segment could not be used at its position.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty { raw } => {
                write!(f, "path '{}' does not name any key", raw)
            }
            PathError::InvalidComponent {
                component,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path component '{}' at position {}: {}",
                    component, position, message
                )
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A parsed dotted path.
///
/// `"user.address.city"` addresses `doc["user"]["address"]["city"]`. The first
/// component is always a top-level document key.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// Parse a dotted path string.
    ///
    /// # Path Syntax
    ///
    /// - Components are separated by `.`
    /// - Empty components are ignored (normalizes `..`, leading and trailing dots)
    /// - At least one component must remain
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jsondb_core_store::Path;
    ///
    /// let path = Path::parse("user.age").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(path.top_level(), "user");
    ///
    /// assert_eq!(Path::parse("user.age.").unwrap(), Path::parse("user.age").unwrap());
    /// assert!(Path::parse("...").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let components: Vec<String> = s
            .split('.')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        if components.is_empty() {
            return Err(PathError::Empty { raw: s.to_string() });
        }

        Ok(Path { components })
    }

    /// Build a single-component path addressing a top-level key verbatim.
    ///
    /// Unlike [`Path::parse`], dots inside `key` are not treated as separators.
    pub fn top_level_key(key: &str) -> Result<Self, PathError> {
        if key.is_empty() {
            return Err(PathError::Empty {
                raw: key.to_string(),
            });
        }
        Ok(Path {
            components: vec![key.to_string()],
        })
    }

    /// The top-level document key this path lives under.
    pub fn top_level(&self) -> &str {
        &self.components[0]
    }

    /// Number of components. Always at least one.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Components leading to the parent container, and the final component.
    pub fn split_last(&self) -> (&[String], &str) {
        let (last, parents) = self
            .components
            .split_last()
            .map(|(last, parents)| (last.as_str(), parents))
            .unwrap_or(("", &[][..]));
        (parents, last)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

impl std::ops::Index<usize> for Path {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use jsondb_core_store::path;
///
/// let p = path!("user.address.city");
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}
