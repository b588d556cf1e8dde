//! End-to-end exchanges against [`Server`] through its [`MessageHandler`]
//! impl, the same entry point every transport calls. Each test below
//! corresponds to one of the runtime's seed scenarios: a two-call
//! initialize/list session, a pre-initialize rejection, a parse error, a
//! batch with one malformed entry, and a filtered notification broadcast.

use std::sync::Arc;
use std::time::Duration;

use mcp_runtime::providers::MathTool;
use mcp_runtime::registry::{Component, ComponentKind, ComponentMetadata};
use mcp_runtime::server::{Server, ServerConfig};
use mcp_runtime::transport::{MessageContext, MessageHandler};
use serde_json::{json, Value};

fn context() -> MessageContext {
    MessageContext {
        transport_tag: "test".to_string(),
        client_id: None,
    }
}

async fn send(server: &Arc<Server>, request: Value) -> Value {
    let bytes = serde_json::to_vec(&request).unwrap();
    let response = server
        .handle_message(bytes, context())
        .await
        .expect("request produces a response");
    serde_json::from_slice(&response).unwrap()
}

#[tokio::test]
async fn initialize_then_tools_list() {
    let server = Server::new(ServerConfig::default());
    server
        .registry()
        .register(
            ComponentKind::Tool,
            "math",
            Component::Tool(Arc::new(MathTool::new())),
            ComponentMetadata::default(),
            false,
        )
        .await
        .unwrap();

    let init = send(
        &server,
        json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "T", "version": "1"}
            },
            "id": 1
        }),
    )
    .await;
    assert!(init["result"]["protocolVersion"].is_string());
    assert!(init["result"]["serverInfo"].is_object());
    assert_eq!(init["id"], 1);

    let list = send(&server, json!({"jsonrpc": "2.0", "method": "tools/list", "id": 2})).await;
    assert_eq!(list["id"], 2);
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "math");
}

#[tokio::test]
async fn uninitialized_call_fails_with_invalid_request() {
    let server = Server::new(ServerConfig::default());
    let response = send(
        &server,
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "x", "arguments": {}},
            "id": 7
        }),
    )
    .await;
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn malformed_bytes_produce_a_parse_error() {
    let server = Server::new(ServerConfig::default());
    let response = server
        .handle_message(b"not json".to_vec(), context())
        .await
        .expect("a parse error still produces a response");
    let response: Value = serde_json::from_slice(&response).unwrap();
    assert_eq!(response["error"]["code"], -32700);
    assert!(response["id"].is_null());
}

#[tokio::test]
async fn batch_with_one_malformed_entry_keeps_the_other_two() {
    let server = Server::new(ServerConfig::default());
    let batch = json!([
        {
            "jsonrpc": "2.0",
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "T", "version": "1"}
            },
            "id": 1
        },
        {"jsonrpc": "2.0", "id": 2},
        {"jsonrpc": "2.0", "method": "ping", "id": 3}
    ]);

    let bytes = serde_json::to_vec(&batch).unwrap();
    let response = server
        .handle_message(bytes, context())
        .await
        .expect("batch with at least one request produces a response");
    let responses: Vec<Value> = serde_json::from_slice(&response).unwrap();

    assert_eq!(responses.len(), 3);
    assert!(responses[0]["result"].is_object());
    assert_eq!(responses[1]["error"]["code"], -32600);
    assert!(responses[2]["result"].is_object());
}

#[tokio::test]
async fn broadcast_respects_per_subscriber_filters() {
    use mcp_runtime::notifications::{Filter, NotificationOptions};
    use mcp_runtime::protocol::NotificationType;

    let server = Server::new(ServerConfig::default());
    let hub = server
        .notifications()
        .expect("notifications are enabled by default");

    hub.subscribe("client-a", vec![NotificationType::ToolsListChanged], None);
    hub.subscribe("client-b", vec![], None);
    let mut filter = Filter::new();
    filter.insert("options.priority".to_string(), json!("high"));
    hub.update_filter("client-b", filter);

    let id = hub
        .broadcast(
            NotificationType::ToolsListChanged,
            json!({}),
            Some(NotificationOptions {
                priority: "low".to_string(),
                ..NotificationOptions::from_defaults(&server.config().notification_defaults)
            }),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(20)).await;

    let statuses = hub.get_delivery_status(&id);
    // client-a matches by type (no bound transport, so it lands terminal as
    // failed-exhausted rather than delivered); client-b is filtered out and
    // never gets a delivery-status entry at all.
    assert_eq!(statuses.len(), 1);
    assert!(statuses.get("client-a").unwrap().state.is_terminal());
    assert!(!statuses.contains_key("client-b"));
}
