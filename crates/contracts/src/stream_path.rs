//! StreamPath - Cheap-to-clone `node/output` identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::GraphError;

const SEPARATOR: char = '/';

/// Hierarchical stream name: `producer-node/output-name`.
///
/// Internally uses `Arc<str>` so cloning only increments a reference count.
/// Paths are created once at wiring time and cloned into every consumer.
///
/// # Examples
/// ```
/// use contracts::StreamPath;
///
/// let path = StreamPath::parse("gps/position").unwrap();
/// assert_eq!(path.node(), "gps");
/// assert_eq!(path.output(), "position");
/// ```
#[derive(Clone)]
pub struct StreamPath {
    full: Arc<str>,
    split: usize,
}

impl StreamPath {
    /// Build a path from its two components
    pub fn new(node: &str, output: &str) -> Result<Self, GraphError> {
        Self::parse(&format!("{node}{SEPARATOR}{output}"))
    }

    /// Parse `node/output`; both components must be non-empty and the output may not
    /// contain another separator.
    pub fn parse(s: &str) -> Result<Self, GraphError> {
        let s = s.trim();
        let split = s.find(SEPARATOR).ok_or_else(|| GraphError::InvalidPath {
            path: s.to_string(),
            message: "expected 'node/output'".into(),
        })?;
        let (node, output) = (&s[..split], &s[split + 1..]);
        if node.is_empty() || output.is_empty() || output.contains(SEPARATOR) {
            return Err(GraphError::InvalidPath {
                path: s.to_string(),
                message: "node and output names must be non-empty".into(),
            });
        }
        Ok(Self {
            full: Arc::from(s),
            split,
        })
    }

    /// Producer node name
    #[inline]
    pub fn node(&self) -> &str {
        &self.full[..self.split]
    }

    /// Output name on the producer
    #[inline]
    pub fn output(&self) -> &str {
        &self.full[self.split + 1..]
    }

    /// Full `node/output` string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl AsRef<str> for StreamPath {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.full
    }
}

impl Borrow<str> for StreamPath {
    #[inline]
    fn borrow(&self) -> &str {
        &self.full
    }
}

impl TryFrom<&str> for StreamPath {
    type Error = GraphError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl fmt::Display for StreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl fmt::Debug for StreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamPath({:?})", self.full)
    }
}

impl PartialEq for StreamPath {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.full, &other.full) || self.full == other.full
    }
}

impl Eq for StreamPath {}

impl PartialEq<str> for StreamPath {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.full.as_ref() == other
    }
}

impl PartialEq<&str> for StreamPath {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.full.as_ref() == *other
    }
}

// Hash - same as str hash so maps can be queried with &str
impl Hash for StreamPath {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full.hash(state)
    }
}

impl Serialize for StreamPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> Deserialize<'de> for StreamPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
