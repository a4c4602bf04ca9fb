//! The tool registry: name → descriptor + typed handler.
//!
//! A registry is built once at startup with [`ToolRegistry::register`], then
//! frozen behind an `Arc` and shared read-only by every request. Registration
//! order is preserved and is the order `tools/list` reports.
//!
//! # Argument preparation
//!
//! Handlers never see raw JSON. Before a handler runs, the registry turns the
//! untyped wire arguments into the handler's input type in three steps:
//!
//! 1. Top-level `default` values declared in the input schema fill in absent
//!    properties.
//! 2. The result is validated against the declared JSON Schema, so type
//!    mismatches, missing required fields and range violations are rejected
//!    with the offending field named.
//! 3. Integer-typed properties are brought into the signed 64-bit range.
//!    JSON Schema counts `3.0` as an integer, serde does not, so integral
//!    floats are rewritten as integers and anything beyond `i64` is rejected
//!    with the field named.
//! 4. The prepared value is decoded into `H::Input` with serde.

use std::future::Future;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RegistryError, ToolError};
use crate::mcp::context::CallContext;

/// A tool's public description, as listed by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// The contract every tool implementation fulfils.
///
/// `Input` is what the handler receives after defaulting, validation and
/// decoding. `Output` is encoded back to JSON by the dispatcher. Errors are
/// reported to the client by their `Display` text.
pub trait ToolHandler: Send + Sync + 'static {
    /// Decoded, defaulted input.
    type Input: DeserializeOwned + Send;
    /// Typed result.
    type Output: Serialize;
    /// Failure reported to the client verbatim.
    type Error: std::fmt::Display;

    /// Runs the tool.
    fn call(
        &self,
        ctx: &CallContext,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

/// Object-safe view of a [`ToolHandler`] working on JSON values.
trait ErasedHandler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        arguments: Value,
    ) -> BoxFuture<'a, Result<Value, ToolError>>;
}

struct Typed<H>(H);

impl<H: ToolHandler> ErasedHandler for Typed<H> {
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        arguments: Value,
    ) -> BoxFuture<'a, Result<Value, ToolError>> {
        Box::pin(async move {
            let input: H::Input = serde_json::from_value(arguments).map_err(|e| decode_error(&e))?;

            let output = self
                .0
                .call(ctx, input)
                .await
                .map_err(|e| ToolError::HandlerFailed {
                    message: e.to_string(),
                })?;

            serde_json::to_value(output).map_err(|e| ToolError::HandlerFailed {
                message: format!("failed to encode tool output: {e}"),
            })
        })
    }
}

/// A registered tool: descriptor, compiled schema, defaults and handler.
pub struct RegisteredTool {
    descriptor: ToolDescriptor,
    validator: Validator,
    defaults: Map<String, Value>,
    integer_fields: Vec<String>,
    handler: Box<dyn ErasedHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("descriptor", &self.descriptor)
            .field("defaults", &self.defaults)
            .field("integer_fields", &self.integer_fields)
            .finish_non_exhaustive()
    }
}

impl RegisteredTool {
    /// The tool's public description.
    #[must_use]
    pub const fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Applies declared defaults and validates raw wire arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] naming the first offending
    /// field when the arguments do not satisfy the input schema.
    pub fn prepare_arguments(&self, raw: Value) -> Result<Value, ToolError> {
        let mut arguments = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::InvalidArguments {
                    field: None,
                    message: format!("arguments must be a JSON object, got {}", kind_of(&other)),
                })
            }
        };

        for (name, default) in &self.defaults {
            if !arguments.contains_key(name) {
                arguments.insert(name.clone(), default.clone());
            }
        }

        let mut arguments = Value::Object(arguments);
        if let Some(error) = self.validator.iter_errors(&arguments).next() {
            return Err(describe_violation(&error));
        }
        if let Value::Object(map) = &mut arguments {
            self.normalize_integers(map)?;
        }
        Ok(arguments)
    }

    fn normalize_integers(&self, arguments: &mut Map<String, Value>) -> Result<(), ToolError> {
        for field in &self.integer_fields {
            let Some(Value::Number(number)) = arguments.get(field) else {
                continue;
            };
            if number.is_i64() {
                continue;
            }
            let Some(integer) = number.as_f64().and_then(exact_i64) else {
                return Err(ToolError::invalid_field(
                    field.clone(),
                    format!("`{field}`: {number} is out of range for a 64-bit integer"),
                ));
            };
            arguments.insert(field.clone(), Value::from(integer));
        }
        Ok(())
    }

    /// Decodes prepared arguments and runs the handler.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if decoding fails, or
    /// [`ToolError::HandlerFailed`] carrying the handler's message.
    pub async fn invoke(&self, ctx: &CallContext, arguments: Value) -> Result<Value, ToolError> {
        self.handler.invoke(ctx, arguments).await
    }
}

/// Converts the first schema violation into an error naming the field.
fn describe_violation(error: &jsonschema::ValidationError<'_>) -> ToolError {
    if let ValidationErrorKind::Required { property } = &error.kind {
        let field = property
            .as_str()
            .map_or_else(|| property.to_string(), str::to_string);
        return ToolError::InvalidArguments {
            message: format!("missing required field `{field}`"),
            field: Some(field),
        };
    }

    let pointer = error.instance_path.to_string();
    let field = pointer
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".");

    if field.is_empty() {
        ToolError::InvalidArguments {
            field: None,
            message: error.to_string(),
        }
    } else {
        ToolError::InvalidArguments {
            message: format!("`{field}`: {error}"),
            field: Some(field),
        }
    }
}

/// Converts an integral float to `i64` when it fits exactly.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn exact_i64(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < -(i64::MIN as f64);
    (in_range && value.trunc() == value).then_some(value as i64)
}

/// Maps a serde decode failure, naming the field where serde reports one.
fn decode_error(error: &serde_json::Error) -> ToolError {
    let message = error.to_string();
    let field = ["missing field `", "unknown field `"]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))
        .and_then(|rest| rest.split('`').next())
        .map(str::to_string);
    match field {
        Some(field) => ToolError::InvalidArguments {
            message: format!("`{field}`: {message}"),
            field: Some(field),
        },
        None => ToolError::InvalidArguments {
            field: None,
            message,
        },
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Insertion-ordered table of tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if `name` is taken, or
    /// [`RegistryError::InvalidSchema`] if `input_schema` is not an object
    /// schema that compiles.
    pub fn register<H: ToolHandler>(
        &mut self,
        name: &str,
        description: &str,
        input_schema: Value,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool {
                name: name.to_string(),
            });
        }

        if input_schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(RegistryError::InvalidSchema {
                name: name.to_string(),
                message: "top-level type must be \"object\"".to_string(),
            });
        }

        let validator =
            jsonschema::validator_for(&input_schema).map_err(|e| RegistryError::InvalidSchema {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let defaults = input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter_map(|(field, spec)| {
                        spec.get("default").map(|d| (field.clone(), d.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let integer_fields = input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter(|(_, spec)| spec.get("type").and_then(Value::as_str) == Some("integer"))
                    .map(|(field, _)| field.clone())
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(tool = name, "registered tool");

        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                descriptor: ToolDescriptor {
                    name: name.to_string(),
                    description: description.to_string(),
                    input_schema,
                },
                validator,
                defaults,
                integer_fields,
                handler: Box::new(Typed(handler)),
            },
        );
        Ok(())
    }

    /// Returns all descriptors in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::ToolNotFound`] if no tool has this name.
    pub fn resolve(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.tools.get(name).ok_or_else(|| ToolError::ToolNotFound {
            name: name.to_string(),
        })
    }

    /// Names of all registered tools in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::mcp::protocol::RequestId;

    #[derive(Debug, Deserialize)]
    struct EchoInput {
        text: String,
        repeat: u32,
    }

    #[derive(Debug, Serialize)]
    struct EchoOutput {
        text: String,
    }

    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    impl ToolHandler for Echo {
        type Input = EchoInput;
        type Output = EchoOutput;
        type Error = String;

        async fn call(&self, _ctx: &CallContext, input: EchoInput) -> Result<EchoOutput, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.text == "fail" {
                return Err("echo refused".to_string());
            }
            Ok(EchoOutput {
                text: input.text.repeat(input.repeat as usize),
            })
        }
    }

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "repeat": { "type": "integer", "minimum": 1, "maximum": 3, "default": 2 }
            },
            "required": ["text"]
        })
    }

    fn registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "echo",
                "Repeats text",
                echo_schema(),
                Echo {
                    calls: calls.clone(),
                },
            )
            .unwrap();
        (registry, calls)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut registry, calls) = registry();
        let err = registry
            .register("echo", "again", echo_schema(), Echo { calls })
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool { name } if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn non_object_schema_is_rejected() {
        let (mut registry, calls) = registry();
        let err = registry
            .register("bad", "bad", json!({"type": "string"}), Echo { calls })
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[test]
    fn resolve_unknown_tool() {
        let (registry, _) = registry();
        let err = registry.resolve("nonexistent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
        assert_eq!(err.to_string(), "tool not found: nonexistent");
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let prepared = tool.prepare_arguments(json!({"text": "a"})).unwrap();
        assert_eq!(prepared["repeat"], 2);
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let prepared = tool
            .prepare_arguments(json!({"text": "a", "repeat": 3}))
            .unwrap();
        assert_eq!(prepared["repeat"], 3);
    }

    #[test]
    fn missing_required_field_is_named() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let err = tool.prepare_arguments(json!({})).unwrap_err();
        let ToolError::InvalidArguments { field, message } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(field.as_deref(), Some("text"));
        assert!(message.contains("text"));
    }

    #[test]
    fn type_mismatch_is_named() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let err = tool.prepare_arguments(json!({"text": 5})).unwrap_err();
        let ToolError::InvalidArguments { field, .. } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(field.as_deref(), Some("text"));
    }

    #[test]
    fn range_violation_is_named() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let err = tool
            .prepare_arguments(json!({"text": "a", "repeat": 9}))
            .unwrap_err();
        let ToolError::InvalidArguments { field, .. } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(field.as_deref(), Some("repeat"));
    }

    #[test]
    fn integral_floats_become_integers() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let prepared = tool
            .prepare_arguments(json!({"text": "a", "repeat": 3.0}))
            .unwrap();
        assert_eq!(prepared["repeat"], json!(3));
        assert!(prepared["repeat"].is_i64());
    }

    #[test]
    fn oversized_integer_is_named() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "count",
                "Counts",
                json!({
                    "type": "object",
                    "properties": { "limit": { "type": "integer" } }
                }),
                Echo { calls },
            )
            .unwrap();
        let tool = registry.resolve("count").unwrap();

        for huge in [json!(1e300), json!(u64::MAX)] {
            let err = tool.prepare_arguments(json!({ "limit": huge })).unwrap_err();
            let ToolError::InvalidArguments { field, message } = err else {
                panic!("expected InvalidArguments");
            };
            assert_eq!(field.as_deref(), Some("limit"));
            assert!(message.starts_with("`limit`:"), "{message}");
        }
    }

    #[test]
    fn exact_i64_bounds() {
        assert_eq!(exact_i64(3.0), Some(3));
        assert_eq!(exact_i64(-2.0), Some(-2));
        assert_eq!(exact_i64(2.5), None);
        assert_eq!(exact_i64(9.3e18), None);
        assert_eq!(exact_i64(f64::NAN), None);
    }

    #[tokio::test]
    async fn decode_errors_name_missing_fields() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let ctx = CallContext::new(RequestId::Number(1));
        // Skips preparation, so the schema default for `repeat` is not applied.
        let err = tool.invoke(&ctx, json!({"text": "a"})).await.unwrap_err();
        let ToolError::InvalidArguments { field, .. } = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(field.as_deref(), Some("repeat"));
    }

    #[test]
    fn null_arguments_become_empty_object() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        // Still fails, but on the required field rather than on the shape.
        let err = tool.prepare_arguments(Value::Null).unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn array_arguments_are_rejected() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let err = tool.prepare_arguments(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[tokio::test]
    async fn invoke_runs_handler() {
        let (registry, calls) = registry();
        let tool = registry.resolve("echo").unwrap();
        let ctx = CallContext::new(RequestId::Number(1));
        let args = tool.prepare_arguments(json!({"text": "ab"})).unwrap();
        let out = tool.invoke(&ctx, args).await.unwrap();
        assert_eq!(out, json!({"text": "abab"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_errors_are_wrapped_verbatim() {
        let (registry, _) = registry();
        let tool = registry.resolve("echo").unwrap();
        let ctx = CallContext::new(RequestId::Number(1));
        let args = tool.prepare_arguments(json!({"text": "fail"})).unwrap();
        let err = tool.invoke(&ctx, args).await.unwrap_err();
        assert_eq!(
            err,
            ToolError::HandlerFailed {
                message: "echo refused".to_string()
            }
        );
    }

    #[test]
    fn list_preserves_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(
                    name,
                    "test",
                    echo_schema(),
                    Echo {
                        calls: calls.clone(),
                    },
                )
                .unwrap();
        }
        let names: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.list(), registry.list());
    }
}
