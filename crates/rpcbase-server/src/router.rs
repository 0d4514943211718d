//! JSON-RPC service — validates payloads, routes them to registered
//! methods, and builds the responses.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rpcbase_protocol::{
    ErrorCode, ErrorResponse, Failure, HandlerResult, MethodError, Methods, RequestContext,
    RequestId, Response, SERVER_ERROR_RANGE, SuccessResponse, is_reserved,
};
use rpcbase_transport::RequestHandler;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ServiceConfig;
use crate::envelope::{self, EMPTY_BATCH};
use crate::error::ServiceError;
use crate::registry::{MethodEntry, MethodRegistry};
use crate::schema::{MethodSchema, ServiceSchema};

/// What a call produces when a reply is due.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Single(Response),
    /// Non-empty, in request order.
    Batch(Vec<Response>),
}

impl From<Reply> for Value {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Single(response) => response.into(),
            Reply::Batch(responses) => {
                Value::Array(responses.into_iter().map(Value::from).collect())
            }
        }
    }
}

/// Result of running one request up to the response builder.
type Outcome = Result<Value, Failure>;

/// The JSON-RPC service — owns the method registry and dispatches calls.
///
/// `M` is the metadata type handed through to every handler untouched.
pub struct JsonRpcService<M = ()> {
    config: ServiceConfig,
    registry: MethodRegistry<M>,
    schema: Option<ServiceSchema>,
}

impl<M: 'static> JsonRpcService<M> {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            config,
            registry: MethodRegistry::new(),
            schema: None,
        }
    }

    /// Attach a service description. Methods registered afterwards without
    /// an explicit schema use the document's `definitions.methods.<name>`,
    /// and `rpc.discover` answers with the document.
    ///
    /// Only one description can be attached; a second attempt fails with
    /// [`ServiceError::SchemaAlreadySet`] and leaves the service unchanged.
    pub fn set_schema(&mut self, schema: ServiceSchema) -> Result<(), ServiceError> {
        if self.schema.is_some() {
            return Err(ServiceError::SchemaAlreadySet);
        }
        let document = schema.document().clone();
        self.registry.register(
            Methods::RPC_DISCOVER.to_string(),
            Box::new(move |_params: Option<Value>, _metadata: &M| -> HandlerResult {
                Ok(document.clone())
            }),
            None,
        )?;
        self.schema = Some(schema);
        Ok(())
    }

    /// Register a handler under `name`.
    ///
    /// Fails without changing the service when the name is taken, reserved,
    /// or the schema does not compile.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
        schema: Option<MethodSchema>,
    ) -> Result<(), ServiceError>
    where
        F: Fn(Option<Value>, &M) -> HandlerResult + Send + Sync + 'static,
    {
        let name = name.into();
        if is_reserved(&name) {
            return Err(ServiceError::ReservedMethodName(name));
        }
        if self.registry.contains(&name) {
            return Err(ServiceError::DuplicateMethodName(name));
        }

        let compiled = match schema {
            Some(schema) => Some(Arc::new(schema.compile(&name)?)),
            None => self.schema.as_ref().and_then(|s| s.method(&name)),
        };
        self.registry.register(name, Box::new(handler), compiled)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn service_schema(&self) -> Option<&ServiceSchema> {
        self.schema.as_ref()
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn lookup(&self, name: &str) -> Option<&MethodEntry<M>> {
        self.registry.lookup(name)
    }

    /// Process raw JSON text. `Ok(None)` means no reply is due.
    pub fn call(&self, payload: &str, metadata: &M) -> Result<Option<String>, ServiceError> {
        let value = match serde_json::from_str::<Value>(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!("Parse error: {e}");
                let response = self.error_response(RequestId::Null, Failure::Parse(e.to_string()));
                return Ok(Some(Value::from(response).to_string()));
            }
        };
        Ok(self.handle(value, metadata)?.map(|reply| Value::from(reply).to_string()))
    }

    /// Process an already-decoded payload. `Ok(None)` means no reply is due.
    pub fn call_value(&self, payload: Value, metadata: &M) -> Result<Option<Value>, ServiceError> {
        Ok(self.handle(payload, metadata)?.map(Value::from))
    }

    /// Process a decoded payload and return the typed reply.
    pub fn handle(&self, payload: Value, metadata: &M) -> Result<Option<Reply>, ServiceError> {
        match payload {
            Value::Array(items) => self.call_batch(items, metadata),
            single => Ok(self.call_single(single, metadata)?.map(Reply::Single)),
        }
    }

    fn call_batch(&self, items: Vec<Value>, metadata: &M) -> Result<Option<Reply>, ServiceError> {
        if items.is_empty() {
            let failure = Failure::InvalidRequest(EMPTY_BATCH.into());
            return Ok(Some(Reply::Single(self.error_response(RequestId::Null, failure))));
        }

        debug!("Dispatching batch of {} requests", items.len());
        let mut responses = Vec::with_capacity(items.len());
        for item in items {
            if let Some(response) = self.call_single(item, metadata)? {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Reply::Batch(responses)))
        }
    }

    fn call_single(&self, value: Value, metadata: &M) -> Result<Option<Response>, ServiceError> {
        let request = match envelope::validate(value, &self.config) {
            Ok(request) => request,
            Err(rejection) => {
                debug!("Rejected request envelope: {}", rejection.failure);
                return Ok(Some(self.error_response(rejection.id, rejection.failure)));
            }
        };

        let method = request.method;
        let outcome = self.execute(&method, request.params, metadata)?;

        let Some(id) = request.id else {
            if let Err(failure) = &outcome {
                debug!("Not answering notification {method}: {failure}");
            }
            return Ok(None);
        };

        Ok(Some(match outcome {
            Ok(result) => self.success_response(id, result),
            Err(failure) => self.error_response(id, failure),
        }))
    }

    /// Route, validate params, invoke, and optionally validate the result.
    fn execute(&self, method: &str, params: Option<Value>, metadata: &M) -> Result<Outcome, ServiceError> {
        let Some(entry) = self.registry.lookup(method) else {
            debug!("Method not found: {method}");
            return Ok(Err(Failure::MethodNotFound {
                available: self.registry.names(),
            }));
        };

        if let Some(schema) = entry.schema() {
            if let Err(details) = schema.check_params(params.as_ref()) {
                debug!("Invalid params for {method}: {details}");
                return Ok(Err(Failure::InvalidParams(details)));
            }
        }

        debug!("Invoking {method}");
        let result = match invoke(entry, params, metadata) {
            Ok(result) => result,
            Err(err) => return self.map_method_error(method, err).map(Err),
        };

        if self.config.debug {
            if let Some(schema) = entry.schema() {
                if let Err(details) = schema.check_result(&result) {
                    error!("Result of {method} violates its schema: {details}");
                    return Err(ServiceError::ResultSchemaViolation {
                        method: method.to_string(),
                        details,
                    });
                }
            }
        }

        Ok(Ok(result))
    }

    fn map_method_error(&self, method: &str, err: MethodError) -> Result<Failure, ServiceError> {
        match err {
            MethodError::InvalidParams(details) => {
                debug!("Method {method} rejected its params: {details}");
                Ok(Failure::InvalidParams(details))
            }
            MethodError::Server {
                code,
                message,
                data,
            } => {
                let code = code.unwrap_or(ErrorCode::DEFAULT_SERVER_ERROR);
                if !SERVER_ERROR_RANGE.contains(&code) {
                    error!("Method {method} declared out-of-range error code {code}");
                    return Err(ServiceError::InvalidServerErrorCode {
                        method: method.to_string(),
                        code,
                    });
                }
                warn!("Method {method} failed: {message}");
                Ok(Failure::Server {
                    code,
                    method: method.to_string(),
                    details: message,
                    context: data,
                })
            }
        }
    }

    fn success_response(&self, id: RequestId, result: Value) -> Response {
        Response::Success(SuccessResponse {
            jsonrpc: self.config.version.to_string(),
            id,
            result,
        })
    }

    fn error_response(&self, id: RequestId, failure: Failure) -> Response {
        Response::Error(ErrorResponse {
            jsonrpc: self.config.version.to_string(),
            id,
            error: failure.into_error_object(),
        })
    }
}

impl<M: 'static> Default for JsonRpcService<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the handler, turning a panic into a server error.
fn invoke<M>(entry: &MethodEntry<M>, params: Option<Value>, metadata: &M) -> HandlerResult {
    let handler = entry.handler();
    match panic::catch_unwind(AssertUnwindSafe(|| handler(params, metadata))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Method {} panicked: {message}", entry.name());
            Err(MethodError::server(format!("panicked: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl RequestHandler for JsonRpcService<RequestContext> {
    type Error = ServiceError;

    fn handle_payload(
        &self,
        payload: &str,
        context: &RequestContext,
    ) -> Result<Option<String>, ServiceError> {
        self.call(payload, context)
    }
}
