mod common;

use serde_json::{Value, json};
use smm_core::ClientOptions;
use smm_mcp_runtime::server::MCP_PROTOCOL_VERSION;
use smm_mcp_runtime::{McpServer, ToolRegistry};
use tokio::io::BufReader;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

async fn read_only_server(mock: &MockServer) -> McpServer {
    let client = client_with(mock, bearer(), ClientOptions::default()).await;
    McpServer::new(client, ToolRegistry::standard())
}

fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

#[tokio::test]
async fn initialize_and_list_hide_write_tools() {
    let mock = MockServer::start().await;
    let server = read_only_server(&mock).await;

    let responses = server
        .handle_incoming_message(rpc(1, "initialize", json!({})))
        .await;
    assert_eq!(responses[0]["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);

    let responses = server
        .handle_incoming_message(rpc(2, "tools/list", json!({})))
        .await;
    let names: Vec<&str> = responses[0]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert!(names.contains(&"get_brokers"));
    assert!(!names.contains(&"create_topics"));
}

#[tokio::test]
async fn tool_results_come_back_redacted() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/admin/brokers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "host": "kafka-1", "sslKeystorePasswd": "changeit" }
        ])))
        .expect(1)
        .mount(&mock)
        .await;
    let server = read_only_server(&mock).await;

    let responses = server
        .handle_incoming_message(rpc(
            3,
            "tools/call",
            json!({ "name": "get_brokers", "arguments": {} }),
        ))
        .await;
    let result = &responses[0]["result"];
    assert_eq!(result.get("isError"), None);
    assert_eq!(result["structuredContent"]["status"], "ok");
    assert_eq!(
        result["structuredContent"]["data"],
        json!([{ "id": 1, "host": "kafka-1", "sslKeystorePasswd": "***REDACTED***" }])
    );
}

#[tokio::test]
async fn tool_failures_are_error_envelopes_not_rpc_errors() {
    let mock = MockServer::start().await;
    let server = read_only_server(&mock).await;

    let responses = server
        .handle_incoming_message(rpc(
            4,
            "tools/call",
            json!({ "name": "create_topics", "arguments": { "topics_config": [{ "name": "x" }] } }),
        ))
        .await;
    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["status"], "error");
    assert_eq!(result["structuredContent"]["error"]["error"], "read_only_violation");
    assert!(recorded(&mock).await.is_empty());
}

#[tokio::test]
async fn notifications_get_no_reply_and_unknown_methods_do() {
    let mock = MockServer::start().await;
    let server = read_only_server(&mock).await;

    let responses = server
        .handle_incoming_message(json!([
            { "jsonrpc": "2.0", "method": "notifications/initialized" },
            rpc(5, "sampling/createMessage", json!({}))
        ]))
        .await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["error"]["code"], -32601);
}

#[tokio::test]
async fn stdio_loop_answers_in_the_framing_it_was_asked_in() {
    let mock = MockServer::start().await;
    let server = read_only_server(&mock).await;

    let body = serde_json::to_string(&rpc(6, "ping", json!({}))).unwrap();
    let input = format!(
        "Content-Length: {}\r\n\r\n{}{}\n",
        body.len(),
        body,
        serde_json::to_string(&rpc(7, "ping", json!({}))).unwrap()
    );
    let mut reader = BufReader::new(input.as_bytes());
    let mut output = Vec::new();
    server.serve(&mut reader, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    let (headers, rest) = output.split_once("\r\n\r\n").unwrap();
    let length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();
    let (framed, newline) = rest.split_at(length);

    let first: Value = serde_json::from_str(framed).unwrap();
    assert_eq!(first["id"], 6);
    assert!(newline.ends_with('\n'));
    let second: Value = serde_json::from_str(newline.trim_end()).unwrap();
    assert_eq!(second["id"], 7);
    assert_eq!(second["result"], json!({}));
}

#[tokio::test]
async fn unparseable_line_gets_a_parse_error_and_the_loop_continues() {
    let mock = MockServer::start().await;
    let server = read_only_server(&mock).await;

    let input = format!(
        "{{\"jsonrpc\": \"2.0\", \"id\": \n{}\n",
        serde_json::to_string(&rpc(8, "ping", json!({}))).unwrap()
    );
    let mut reader = BufReader::new(input.as_bytes());
    let mut output = Vec::new();
    server.serve(&mut reader, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    let replies: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"]["code"], -32700);
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[1]["id"], 8);
    assert_eq!(replies[1]["result"], json!({}));
}
