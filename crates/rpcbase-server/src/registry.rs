//! MethodRegistry — maps method names to handlers and their schemas.
//!
//! Entries are added during setup and live as long as the service. There is
//! no removal: the registry is append-only.

use std::collections::BTreeMap;
use std::sync::Arc;

use rpcbase_protocol::HandlerResult;
use serde_json::Value;
use tracing::info;

use crate::error::ServiceError;
use crate::schema::CompiledMethodSchema;

/// A registered handler. It receives the request's `params` (if any) and the
/// caller-supplied metadata, which the dispatcher never inspects.
pub type BoxedHandler<M> = Box<dyn Fn(Option<Value>, &M) -> HandlerResult + Send + Sync>;

/// A handler paired with its optional schemas.
pub struct MethodEntry<M> {
    name: String,
    handler: BoxedHandler<M>,
    schema: Option<Arc<CompiledMethodSchema>>,
}

impl<M> MethodEntry<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&CompiledMethodSchema> {
        self.schema.as_deref()
    }

    pub(crate) fn handler(&self) -> &BoxedHandler<M> {
        &self.handler
    }
}

impl<M> std::fmt::Debug for MethodEntry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Append-only map of method name to [`MethodEntry`].
pub struct MethodRegistry<M> {
    methods: BTreeMap<String, MethodEntry<M>>,
}

impl<M> MethodRegistry<M> {
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    /// Add a method. A name that is already taken leaves the registry
    /// unchanged and fails with [`ServiceError::DuplicateMethodName`].
    pub fn register(
        &mut self,
        name: String,
        handler: BoxedHandler<M>,
        schema: Option<Arc<CompiledMethodSchema>>,
    ) -> Result<(), ServiceError> {
        if self.methods.contains_key(&name) {
            return Err(ServiceError::DuplicateMethodName(name));
        }

        info!(
            "Registering method: {} (schema: {})",
            name,
            if schema.is_some() { "yes" } else { "no" }
        );
        self.methods.insert(
            name.clone(),
            MethodEntry {
                name,
                handler,
                schema,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&MethodEntry<M>> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<M> Default for MethodRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
