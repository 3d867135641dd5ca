//! 函数注册表：按名称管理可调用函数，并校验模型生成的参数。
//!
//! Function registry that resolves symbolic tool-call requests from the
//! model into concrete results. Functions are registered once during setup
//! with an explicit parameter schema; afterwards the registry is shared
//! read-only across conversations, so concurrent lookups need no locking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

use crate::error::BoxError;
use crate::types::ToolDescriptor;
use crate::{Error, Result};

/// Async callable unit behind a registered function name.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> std::result::Result<Value, BoxError>;
}

/// Adapter turning an async closure into a [`FunctionHandler`].
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> FunctionHandler for HandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, BoxError>> + Send,
{
    async fn call(&self, arguments: Value) -> std::result::Result<Value, BoxError> {
        (self.0)(arguments).await
    }
}

/// Name, description and parameter schema of one registerable function.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub schema: FunctionSchema,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: FunctionSchema::object(),
        }
    }

    pub fn schema(mut self, schema: FunctionSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// Explicit parameter schema, built value-by-value at registration.
///
/// Renders to a draft-07 JSON Schema object for both outbound tool
/// descriptions and inbound argument validation.
#[derive(Debug, Clone, Default)]
pub struct FunctionSchema {
    parameters: Vec<ParameterSpec>,
}

impl FunctionSchema {
    /// Empty object schema; functions without parameters use this as-is.
    pub fn object() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Render as a JSON Schema value.
    pub fn to_value(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.to_value());
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        let mut schema = json!({
            "type": "object",
            "properties": Value::Object(properties),
        });
        if !required.is_empty() {
            schema["required"] = Value::Array(required);
        }
        schema
    }
}

/// One named parameter in a [`FunctionSchema`].
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    name: String,
    kind: ParameterKind,
    description: Option<String>,
    required: bool,
    allowed_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParameterKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Integer => "integer",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Object => "object",
            ParameterKind::Array => "array",
        }
    }
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: false,
            allowed_values: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::Boolean)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict a string parameter to an enumerated set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    fn to_value(&self) -> Value {
        let mut spec = json!({ "type": self.kind.type_name() });
        if let Some(ref description) = self.description {
            spec["description"] = Value::String(description.clone());
        }
        if !self.allowed_values.is_empty() {
            spec["enum"] = Value::Array(
                self.allowed_values
                    .iter()
                    .map(|v| Value::String(v.clone()))
                    .collect(),
            );
        }
        spec
    }
}

struct Registration {
    descriptor: ToolDescriptor,
    compiled: JSONSchema,
    handler: Arc<dyn FunctionHandler>,
}

/// Named function registry, read-only after setup.
///
/// `describe_all` returns descriptors in registration order, so repeated
/// calls produce identical output unless something new is registered.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Registration>,
    by_name: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its spec'd name.
    pub fn register<H>(&mut self, spec: FunctionSpec, handler: H) -> Result<()>
    where
        H: FunctionHandler + 'static,
    {
        if self.by_name.contains_key(&spec.name) {
            return Err(Error::DuplicateFunction { name: spec.name });
        }
        let parameters = spec.schema.to_value();
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&parameters)
            .map_err(|e| Error::argument_decode(&spec.name, format!("invalid schema: {}", e)))?;
        let descriptor = ToolDescriptor {
            name: spec.name.clone(),
            description: Some(spec.description),
            parameters,
        };
        self.by_name.insert(spec.name, self.entries.len());
        self.entries.push(Registration {
            descriptor,
            compiled,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Decode `raw_arguments`, validate them against the declared schema and
    /// run the handler.
    pub async fn invoke(&self, name: &str, raw_arguments: &str) -> Result<Value> {
        let entry = self
            .by_name
            .get(name)
            .map(|i| &self.entries[*i])
            .ok_or_else(|| Error::unknown_function(name))?;

        // Models emit an empty string for zero-parameter functions.
        let arguments: Value = if raw_arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw_arguments)
                .map_err(|e| Error::argument_decode(name, e.to_string()))?
        };

        if let Err(mut violations) = entry.compiled.validate(&arguments) {
            let reason = violations
                .next()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "arguments did not match the declared schema".to_string());
            return Err(Error::argument_decode(name, reason));
        }

        tracing::debug!(function = name, "invoking registered function");
        entry
            .handler
            .call(arguments)
            .await
            .map_err(|e| Error::handler_execution(name, e))
    }

    /// Descriptors of every registered function, in registration order.
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
