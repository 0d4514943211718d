//! Parameter and result validation against JSON-Schema (Draft-07).
//!
//! Schemas are compiled once, at registration time. A schema that fails to
//! compile is a configuration fault; a value that fails a compiled schema is
//! reported as the first violation message.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use rpcbase_protocol::is_reserved;
use serde_json::{Value, json};

use crate::error::ServiceError;

/// Raw schemas for one method, as supplied by the embedding application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodSchema {
    pub params: Option<Value>,
    pub result: Option<Value>,
}

impl MethodSchema {
    pub fn params(schema: Value) -> Self {
        Self {
            params: Some(schema),
            result: None,
        }
    }

    pub fn with_result(mut self, schema: Value) -> Self {
        self.result = Some(schema);
        self
    }

    pub(crate) fn compile(&self, method: &str) -> Result<CompiledMethodSchema, ServiceError> {
        Ok(CompiledMethodSchema {
            params: self
                .params
                .as_ref()
                .map(|raw| Schema::compile(method, raw.clone(), raw.clone()))
                .transpose()?,
            result: self
                .result
                .as_ref()
                .map(|raw| Schema::compile(method, raw.clone(), raw.clone()))
                .transpose()?,
        })
    }
}

/// A compiled schema together with the raw document it came from.
pub struct Schema {
    raw: Value,
    validator: Validator,
}

impl Schema {
    /// Compile `document`. `raw` is the schema as the author wrote it, kept for
    /// introspection; it differs from `document` when the schema lives inside
    /// a larger service document.
    fn compile(method: &str, raw: Value, document: Value) -> Result<Self, ServiceError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&document)
            .map_err(|e| ServiceError::InvalidSchema {
                method: method.to_string(),
                details: e.to_string(),
            })?;
        Ok(Self { raw, validator })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Returns the first violation message, if any.
    pub fn check(&self, instance: &Value) -> Result<(), String> {
        match self.validator.iter_errors(instance).next() {
            Some(error) => Err(error.to_string()),
            None => Ok(()),
        }
    }

    /// Value validated in place of absent `params`: `[]` for array schemas,
    /// `{}` otherwise.
    fn placeholder(&self) -> Value {
        match self.raw.get("type").and_then(Value::as_str) {
            Some("array") => json!([]),
            _ => json!({}),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("raw", &self.raw).finish_non_exhaustive()
    }
}

/// Compiled schemas attached to a registered method.
#[derive(Debug, Default)]
pub struct CompiledMethodSchema {
    pub params: Option<Schema>,
    pub result: Option<Schema>,
}

impl CompiledMethodSchema {
    pub fn check_params(&self, params: Option<&Value>) -> Result<(), String> {
        let Some(schema) = &self.params else {
            return Ok(());
        };
        let instance = match params {
            Some(p) => Cow::Borrowed(p),
            None => Cow::Owned(schema.placeholder()),
        };
        schema.check(&instance)
    }

    pub fn check_result(&self, result: &Value) -> Result<(), String> {
        match &self.result {
            Some(schema) => schema.check(result),
            None => Ok(()),
        }
    }
}

/// A service description document: a JSON-Schema whose
/// `definitions.methods.<name>` entries describe each method's `params` and
/// `result`.
#[derive(Debug, Clone)]
pub struct ServiceSchema {
    document: Value,
    methods: HashMap<String, Arc<CompiledMethodSchema>>,
}

impl ServiceSchema {
    /// Validate and compile a service document loaded by the caller.
    pub fn from_value(document: Value) -> Result<Self, ServiceError> {
        let invalid = |details: &str| ServiceError::InvalidSchema {
            method: "definitions.methods".into(),
            details: details.into(),
        };

        if !document.is_object() {
            return Err(invalid("service schema must be a JSON object"));
        }

        let names: Vec<String> = match document.pointer("/definitions/methods") {
            None => Vec::new(),
            Some(Value::Object(methods)) => methods.keys().cloned().collect(),
            Some(_) => return Err(invalid("\"definitions.methods\" must be an object")),
        };

        if let Some(name) = names.iter().find(|n| is_reserved(n)) {
            return Err(ServiceError::ReservedMethodName(name.clone()));
        }

        let definitions = document
            .get("definitions")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let mut methods = HashMap::with_capacity(names.len());
        for name in names {
            let compiled = CompiledMethodSchema {
                params: compile_member(&name, "params", &document, &definitions)?,
                result: compile_member(&name, "result", &document, &definitions)?,
            };
            methods.insert(name, Arc::new(compiled));
        }

        Ok(Self { document, methods })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Names under `definitions.methods`, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn method(&self, name: &str) -> Option<Arc<CompiledMethodSchema>> {
        self.methods.get(name).cloned()
    }
}

/// Compile `definitions.methods.<name>.<member>` against the whole document so
/// that `$ref`s into `#/definitions` resolve.
fn compile_member(
    name: &str,
    member: &str,
    document: &Value,
    definitions: &Value,
) -> Result<Option<Schema>, ServiceError> {
    let pointer = format!("/definitions/methods/{}/{member}", escape_pointer(name));
    let Some(raw) = document.pointer(&pointer) else {
        return Ok(None);
    };
    let wrapper = json!({
        "definitions": definitions,
        "allOf": [{ "$ref": format!("#{pointer}") }],
    });
    Schema::compile(name, raw.clone(), wrapper).map(Some)
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
