//! Stream path resolver.
//!
//! Maps `node/output` paths to live stream handles. Read-mostly: consumers resolve on
//! wiring and rewire events, the graph mutates it only when nodes come and go.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{GraphError, StreamPath, StreamType, StreamValue};
use tracing::debug;

use crate::stream::{AnyStream, StreamReader};

/// Shared registry of every published stream in a graph
#[derive(Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<RwLock<HashMap<StreamPath, AnyStream>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a stream under `path`, returning the handle it replaced
    pub fn register(&self, path: StreamPath, stream: AnyStream) -> Option<AnyStream> {
        debug!(path = %path, stream_type = %stream.stream_type(), rate = stream.rate(), "Stream registered");
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, stream)
    }

    /// Remove every stream published by `node`
    pub fn unregister_node(&self, node: &str) -> usize {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        let before = streams.len();
        streams.retain(|path, _| path.node() != node);
        let removed = before - streams.len();
        debug!(node, removed, "Streams unregistered");
        removed
    }

    pub fn lookup(&self, path: &str) -> Option<AnyStream> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Resolve `path` to a typed reader.
    ///
    /// Fails with `UnresolvedPath` when nothing is published there and with
    /// `StreamTypeMismatch` when the published stream carries another type.
    pub fn resolve<T: StreamValue>(
        &self,
        path: &StreamPath,
        expected: StreamType,
    ) -> Result<StreamReader<T>, GraphError> {
        let stream = self
            .lookup(path.as_str())
            .ok_or_else(|| GraphError::unresolved(path.as_str()))?;

        let mismatch = || GraphError::StreamTypeMismatch {
            path: path.to_string(),
            expected,
            actual: stream.stream_type(),
        };
        if stream.stream_type() != expected {
            return Err(mismatch());
        }
        stream.downcast::<T>().ok_or_else(mismatch)
    }

    /// All published paths, sorted
    pub fn paths(&self) -> Vec<StreamPath> {
        let mut paths: Vec<_> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        paths
    }

    pub fn len(&self) -> usize {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("streams", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::OutputStream;

    fn path(s: &str) -> StreamPath {
        StreamPath::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_registered_stream() {
        let registry = StreamRegistry::new();
        let stream = OutputStream::<f64>::new(StreamType::Pressure, 25);
        registry.register(path("baro/pressure"), stream.erase());

        let reader = registry
            .resolve::<f64>(&path("baro/pressure"), StreamType::Pressure)
            .unwrap();
        stream.push_sample(99.8, true);
        assert_eq!(reader.get_last_sample().value, 99.8);
    }

    #[test]
    fn test_resolve_missing_is_unresolved() {
        let registry = StreamRegistry::new();
        let err = registry
            .resolve::<f64>(&path("baro/pressure"), StreamType::Pressure)
            .err().unwrap();
        assert!(matches!(err, GraphError::UnresolvedPath { .. }));
    }

    #[test]
    fn test_resolve_type_mismatch() {
        let registry = StreamRegistry::new();
        let stream = OutputStream::<f64>::new(StreamType::Temperature, 25);
        registry.register(path("baro/temperature"), stream.erase());

        let err = registry
            .resolve::<f64>(&path("baro/temperature"), StreamType::Pressure)
            .err().unwrap();
        assert!(matches!(
            err,
            GraphError::StreamTypeMismatch {
                expected: StreamType::Pressure,
                actual: StreamType::Temperature,
                ..
            }
        ));
    }

    #[test]
    fn test_unregister_node() {
        let registry = StreamRegistry::new();
        let a = OutputStream::<f64>::new(StreamType::Pressure, 25);
        let b = OutputStream::<f64>::new(StreamType::Temperature, 25);
        let c = OutputStream::<f64>::new(StreamType::Voltage, 5);
        registry.register(path("baro/pressure"), a.erase());
        registry.register(path("baro/temperature"), b.erase());
        registry.register(path("adc/voltage"), c.erase());

        assert_eq!(registry.unregister_node("baro"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("adc/voltage"));
        assert_eq!(registry.paths(), vec![path("adc/voltage")]);
    }
}
