//! Service-level functional tests.
//!
//! Drives the dispatch core through the transport's `RequestHandler` entry
//! point, exactly as a connection does, without opening a socket.

use rpcbase_protocol::{MethodError, RequestContext};
use rpcbase_server::{JsonRpcService, MethodSchema, ServiceConfig, ServiceError, ServiceSchema};
use rpcbase_transport::RequestHandler;
use serde_json::{Value, json};

fn context() -> RequestContext {
    RequestContext::new("client-1").with_peer_addr("127.0.0.1:50000")
}

fn handle(service: &JsonRpcService<RequestContext>, payload: &str) -> Option<Value> {
    service
        .handle_payload(payload, &context())
        .unwrap()
        .map(|text| serde_json::from_str(&text).unwrap())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

mod metadata {
    use super::*;

    fn svc() -> JsonRpcService<RequestContext> {
        let mut s: JsonRpcService<RequestContext> = JsonRpcService::new();
        s.register(
            "whoami",
            |_params, ctx: &RequestContext| Ok(json!({"id": ctx.client_id, "peer": ctx.peer_addr})),
            None,
        )
        .unwrap();
        s
    }

    #[test]
    fn context_reaches_the_handler() {
        let resp = handle(&svc(), r#"{"jsonrpc":"2.0","id":1,"method":"whoami"}"#).unwrap();
        assert_eq!(resp["result"]["id"], "client-1");
        assert_eq!(resp["result"]["peer"], "127.0.0.1:50000");
    }

    #[test]
    fn context_reaches_every_batch_element() {
        let resp = handle(
            &svc(),
            r#"[{"jsonrpc":"2.0","id":1,"method":"whoami"},{"jsonrpc":"2.0","id":2,"method":"whoami"}]"#,
        )
        .unwrap();
        let responses = resp.as_array().unwrap();
        assert_eq!(responses.len(), 2);
        for response in responses {
            assert_eq!(response["result"]["id"], "client-1");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Described services
// ─────────────────────────────────────────────────────────────────────────────

mod described {
    use super::*;

    fn document() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Greeter",
            "definitions": {
                "name": {"type": "string", "minLength": 1},
                "methods": {
                    "greet": {
                        "params": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {"name": {"$ref": "#/definitions/name"}}
                        },
                        "result": {"type": "string"}
                    }
                }
            }
        })
    }

    fn svc(config: ServiceConfig) -> JsonRpcService<RequestContext> {
        let schema = ServiceSchema::from_value(document()).unwrap();
        let mut s: JsonRpcService<RequestContext> = JsonRpcService::with_config(config);
        s.set_schema(schema).unwrap();
        s.register(
            "greet",
            |params, _ctx| {
                let name = params
                    .as_ref()
                    .and_then(|p| p["name"].as_str())
                    .ok_or_else(|| MethodError::invalid_params("name is required"))?;
                Ok(json!(format!("Hello, {name}!")))
            },
            None,
        )
        .unwrap();
        s
    }

    #[test]
    fn greet_validates_against_the_document() {
        let s = svc(ServiceConfig::default());

        let ok = handle(&s, r#"{"jsonrpc":"2.0","id":1,"method":"greet","params":{"name":"Ada"}}"#)
            .unwrap();
        assert_eq!(ok["result"], "Hello, Ada!");

        let err = handle(&s, r#"{"jsonrpc":"2.0","id":2,"method":"greet","params":{"name":""}}"#)
            .unwrap();
        assert_eq!(err["error"]["code"], -32602);
        assert!(err["error"]["data"]["details"].is_string());

        let err = handle(&s, r#"{"jsonrpc":"2.0","id":3,"method":"greet"}"#).unwrap();
        assert_eq!(err["error"]["code"], -32602);
    }

    #[test]
    fn discover_lists_the_document() {
        let s = svc(ServiceConfig::default());
        let resp = handle(&s, r#"{"jsonrpc":"2.0","id":"d","method":"rpc.discover"}"#).unwrap();
        assert_eq!(resp["result"], document());
        assert_eq!(s.method_names(), vec!["greet".to_string(), "rpc.discover".to_string()]);
    }

    #[test]
    fn schema_compiled_at_registration_time() {
        let mut s = svc(ServiceConfig::default());
        let err = s
            .register(
                "bad",
                |_params, _ctx| Ok(Value::Null),
                Some(MethodSchema::params(json!({"type": "not-a-type"}))),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSchema { .. }));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

mod configuration {
    use super::*;

    fn svc(config: ServiceConfig) -> JsonRpcService<RequestContext> {
        let mut s: JsonRpcService<RequestContext> = JsonRpcService::with_config(config);
        s.register("ping", |_params, _ctx| Ok(json!("pong")), None).unwrap();
        s
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.version, "2.0");
        assert!(!config.debug);
        assert!(!config.allow_missing_version);
    }

    #[test]
    fn legacy_clients_without_version() {
        let payload = r#"{"id":1,"method":"ping"}"#;

        let strict = handle(&svc(ServiceConfig::default()), payload).unwrap();
        assert_eq!(strict["error"]["code"], -32600);

        let legacy = svc(ServiceConfig::default().with_missing_version_allowed(true));
        let resp = handle(&legacy, payload).unwrap();
        assert_eq!(resp["jsonrpc"], "2.0");
        assert_eq!(resp["result"], "pong");
    }

    #[test]
    fn configuration_faults_surface_as_errors() {
        let mut s = svc(ServiceConfig::default());
        s.register(
            "bad_code",
            |_params, _ctx| Err(MethodError::server("x").with_code(-31000)),
            None,
        )
        .unwrap();
        let err = s
            .handle_payload(r#"{"jsonrpc":"2.0","id":1,"method":"bad_code"}"#, &context())
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::InvalidServerErrorCode {
                method: "bad_code".into(),
                code: -31000
            }
        );
        assert!(err.to_string().contains("-31000"));
    }
}
