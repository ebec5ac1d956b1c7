//! Node capability interface.

use std::time::Duration;

use contracts::{GraphError, StreamPath, StreamType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::registry::StreamRegistry;
use crate::stream::AnyStream;

/// Introspection record for one declared input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputInfo {
    pub name: String,
    pub stream_type: StreamType,
    /// Rate the node wants this input at
    pub rate: u32,
    pub path: Option<StreamPath>,
    pub resolved: bool,
}

/// Introspection record for one output
#[derive(Debug, Clone)]
pub struct OutputInfo {
    pub name: String,
    pub stream_type: StreamType,
    pub rate: u32,
    pub stream: AnyStream,
}

impl OutputInfo {
    pub fn new(name: impl Into<String>, stream: AnyStream) -> Self {
        Self {
            name: name.into(),
            stream_type: stream.stream_type(),
            rate: stream.rate(),
            stream,
        }
    }
}

/// Contract every processing node implements.
///
/// Lifecycle sequencing is enforced by [`crate::NodeHost`]; implementations can assume
/// `init` ran before anything else and that `process` is only called after `start`.
pub trait Node: Send {
    /// Registered type name, e.g. `"gravity_filter"`
    fn type_name(&self) -> &'static str;

    /// Validate the descriptor and allocate inputs/outputs at their declared rates
    fn init(&mut self, descriptor: &Value) -> Result<(), GraphError>;

    fn get_descriptor(&self) -> Value;

    /// Replace the runtime config; on error the previous config stays in effect
    fn set_config(&mut self, config: &Value) -> Result<(), GraphError>;

    fn get_config(&self) -> Value;

    /// Stamp output streams so the first `dt` is well defined
    fn start(&mut self, time_point: Duration) -> Result<(), GraphError> {
        for output in self.get_outputs() {
            output.stream.set_time_point(time_point);
        }
        Ok(())
    }

    /// Wire input `index`; `UnresolvedPath` means deferred, not failed
    fn set_input_stream_path(
        &mut self,
        index: usize,
        _path: &StreamPath,
        _registry: &StreamRegistry,
    ) -> Result<(), GraphError> {
        Err(GraphError::InputIndexOutOfRange {
            node: self.type_name().to_string(),
            index,
            count: 0,
        })
    }

    /// Re-resolve wired inputs; returns how many remain unresolved
    fn rewire(&mut self, _registry: &StreamRegistry) -> usize {
        0
    }

    fn get_inputs(&self) -> Vec<InputInfo> {
        Vec::new()
    }

    fn get_outputs(&self) -> Vec<OutputInfo>;

    /// One tick of work
    fn process(&mut self) -> Result<(), GraphError>;
}

/// Deserialize and validate a descriptor, mapping failures to `InvalidDescriptor`
pub fn parse_descriptor<D>(node: &str, value: &Value) -> Result<D, GraphError>
where
    D: DeserializeOwned + Validate,
{
    let descriptor: D = serde_json::from_value(value.clone())
        .map_err(|e| GraphError::invalid_descriptor(node, e.to_string()))?;
    descriptor
        .validate()
        .map_err(|e| GraphError::invalid_descriptor(node, flatten_errors(&e)))?;
    Ok(descriptor)
}

/// Deserialize and validate a runtime config, mapping failures to `InvalidConfig`
pub fn parse_config<C>(node: &str, value: &Value) -> Result<C, GraphError>
where
    C: DeserializeOwned + Validate,
{
    let config: C = serde_json::from_value(value.clone())
        .map_err(|e| GraphError::invalid_config(node, e.to_string()))?;
    config
        .validate()
        .map_err(|e| GraphError::invalid_config(node, flatten_errors(&e)))?;
    Ok(config)
}

/// Serialize a record for introspection; serialization of plain config structs cannot fail
pub fn to_value<S: Serialize>(record: &S) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

fn flatten_errors(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let codes: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            format!("{field}: {}", codes.join(", "))
        })
        .collect();
    if fields.is_empty() {
        return errors.to_string();
    }
    fields.sort();
    fields.join("; ")
}
