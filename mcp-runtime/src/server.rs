use serde_json::{Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::args::ToolArgs;
use crate::client::ServiceClient;
use crate::error::SmmError;
use crate::redact::redact;
use crate::tools::ToolRegistry;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "smm-mcp";

/// How a message arrived; the reply goes back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` header block followed by the JSON body.
    ContentLength,
    /// One JSON document per line.
    Newline,
}

pub struct McpServer {
    client: ServiceClient,
    registry: ToolRegistry,
    session_id: String,
}

impl McpServer {
    pub fn new(client: ServiceClient, registry: ToolRegistry) -> Self {
        Self {
            client,
            registry,
            session_id: format!("stdio-{}", Uuid::now_v7()),
        }
    }

    pub async fn serve_stdio(&self) -> Result<(), String> {
        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(&mut reader, &mut stdout).await
    }

    pub async fn serve<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            session_id = %self.session_id,
            read_only = self.client.is_read_only(),
            "mcp server listening on stdio"
        );

        while let Some((payload, framing)) = read_frame(reader)
            .await
            .map_err(|e| format!("Failed to read MCP message: {e}"))?
        {
            let replies = match serde_json::from_slice::<Value>(&payload) {
                Ok(incoming) => self.handle_incoming_message(incoming).await,
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, error = %e, "unparseable mcp message");
                    vec![Fault::parse_error(e).into_reply(Value::Null)]
                }
            };
            for reply in replies {
                write_message(writer, &reply, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        tracing::info!(session_id = %self.session_id, "mcp input closed");
        Ok(())
    }

    /// Answer one decoded message or batch. Notifications and client
    /// replies produce nothing.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let messages = match incoming {
            Value::Array(batch) if batch.is_empty() => {
                return vec![Fault::invalid_request("batch must not be empty").into_reply(Value::Null)];
            }
            Value::Array(batch) => batch,
            single => vec![single],
        };

        let mut replies = Vec::with_capacity(messages.len());
        for message in messages {
            let reply = match Incoming::decode(message) {
                Incoming::Call { id, method, params } => {
                    Some(rpc_reply(id, self.dispatch(&method, params).await))
                }
                Incoming::Notification { method } => {
                    tracing::debug!(method = %method, "notification ignored");
                    None
                }
                Incoming::Reply => None,
                Incoming::Malformed { id, fault } => Some(fault.into_reply(id)),
            };
            replies.extend(reply);
        }
        replies
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, Fault> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(Fault::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        let mode = if self.client.is_read_only() {
            "read-only: write tools are hidden and refused"
        } else {
            "read-write: write tools change cluster state"
        };
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Streams Messaging Manager tools behind a Knox gateway. Start with get_brokers or get_all_topic_infos. Mode: {mode}."
            )
        })
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.registry.definitions(self.client.is_read_only()) })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, Fault> {
        let params = params
            .as_object()
            .ok_or_else(|| Fault::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Fault::invalid_params("tools/call requires string field 'name'"))?;

        let args = ToolArgs::from_value(params.get("arguments").cloned().unwrap_or(Value::Null))
            .map_err(|e| Fault::invalid_params(format!("tools/call 'arguments': {e}")))?;

        Ok(match self.registry.call(&self.client, name, args).await {
            Ok(data) => build_tool_call_response(
                json!({ "status": "ok", "tool": name, "data": redact(data) }),
                false,
            ),
            Err(err) => build_tool_call_response(tool_error_envelope(name, &err), true),
        })
    }
}

fn tool_error_envelope(tool: &str, err: &SmmError) -> Value {
    json!({
        "status": "error",
        "tool": tool,
        "error": err.to_payload(),
    })
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    // Agents read the text block, so it carries the full envelope.
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

/// One JSON-RPC message after envelope checks.
#[derive(Debug, PartialEq)]
enum Incoming {
    Call { id: Value, method: String, params: Value },
    Notification { method: String },
    /// A client reply; this server never issues requests.
    Reply,
    Malformed { id: Value, fault: Fault },
}

impl Incoming {
    fn decode(message: Value) -> Self {
        let Value::Object(mut fields) = message else {
            return Incoming::Malformed {
                id: Value::Null,
                fault: Fault::invalid_request("message must be a JSON object"),
            };
        };
        let id = fields.remove("id");

        if fields.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Incoming::Malformed {
                id: id.unwrap_or(Value::Null),
                fault: Fault::invalid_request("jsonrpc must be '2.0'"),
            };
        }
        let method = match fields.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Incoming::Malformed {
                    id: id.unwrap_or(Value::Null),
                    fault: Fault::invalid_request("method must be a string"),
                };
            }
            None => return Incoming::Reply,
        };
        match id {
            Some(id) => Incoming::Call {
                id,
                method,
                params: fields.remove("params").unwrap_or(Value::Null),
            },
            None => Incoming::Notification { method },
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, PartialEq)]
struct Fault {
    code: i64,
    message: String,
}

impl Fault {
    const PARSE_ERROR: i64 = -32700;
    const INVALID_REQUEST: i64 = -32600;
    const METHOD_NOT_FOUND: i64 = -32601;
    const INVALID_PARAMS: i64 = -32602;

    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn parse_error(err: serde_json::Error) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {err}"))
    }

    fn invalid_request(message: &str) -> Self {
        Self::new(Self::INVALID_REQUEST, format!("Invalid request: {message}"))
    }

    fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    fn into_reply(self, id: Value) -> Value {
        rpc_reply(id, Err(self))
    }
}

fn rpc_reply(id: Value, outcome: Result<Value, Fault>) -> Value {
    let mut reply = json!({ "jsonrpc": "2.0", "id": id });
    match outcome {
        Ok(result) => reply["result"] = result,
        Err(fault) => reply["error"] = json!({ "code": fault.code, "message": fault.message }),
    }
    reply
}

/// Read one message body in either framing. `Ok(None)` on a clean end of
/// input. A line opening with `{` or `[` is a newline-framed message, anything
/// else starts a `Content-Length` header block.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<(Vec<u8>, Framing)>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if in_headers {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "input ended inside an MCP header block",
                ));
            }
            return Ok(None);
        }

        let trimmed = line.trim();
        if !in_headers {
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                return Ok(Some((trimmed.as_bytes().to_vec(), Framing::Newline)));
            }
            in_headers = true;
        } else if trimmed.is_empty() {
            break;
        }

        let Some((name, value)) = trimmed.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid Content-Length header")
            })?;
            content_length = Some(parsed);
        }
    }

    let length = content_length.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;
    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((payload, Framing::ContentLength)))
}

/// [`read_frame`] plus JSON decoding.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<(Value, Framing)>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let Some((payload, framing)) = read_frame(reader).await? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, format!("invalid JSON payload: {e}"))
    })?;
    Ok(Some((value, framing)))
}

pub async fn write_message<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Newline => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

pub(crate) fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_content_length_frames() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let raw = format!("Content-Length: {}\r\n\r\n{body}", body.len());
        let mut reader = BufReader::new(raw.as_bytes());

        let (value, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::ContentLength);
        assert_eq!(value["method"], "ping");
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_newline_delimited_messages() {
        let raw = "\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n[{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}]\n";
        let mut reader = BufReader::new(raw.as_bytes());

        let (first, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::Newline);
        assert_eq!(first["id"], 1);
        let (second, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert!(second.is_array());
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_header_block_is_an_error() {
        let mut reader = BufReader::new("Content-Length: 10\r\n".as_bytes());
        let err = read_message(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn replies_use_the_request_framing() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": {}});

        let mut framed = Vec::new();
        write_message(&mut framed, &value, Framing::ContentLength)
            .await
            .unwrap();
        let framed = String::from_utf8(framed).unwrap();
        assert!(framed.starts_with("Content-Length: "));

        let mut lines = Vec::new();
        write_message(&mut lines, &value, Framing::Newline).await.unwrap();
        let lines = String::from_utf8(lines).unwrap();
        assert!(lines.ends_with("}\n"));
        assert_eq!(lines.matches('\n').count(), 1);
    }

    #[test]
    fn decode_sorts_messages_by_shape() {
        assert_eq!(
            Incoming::decode(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})),
            Incoming::Call {
                id: json!(3),
                method: "ping".to_string(),
                params: Value::Null
            }
        );
        assert_eq!(
            Incoming::decode(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})),
            Incoming::Notification {
                method: "notifications/initialized".to_string()
            }
        );
        assert_eq!(
            Incoming::decode(json!({"jsonrpc": "2.0", "id": 4, "result": {}})),
            Incoming::Reply
        );

        let Incoming::Malformed { id, fault } = Incoming::decode(json!({"id": 5, "method": "ping"}))
        else {
            panic!("missing jsonrpc version accepted");
        };
        assert_eq!(id, json!(5));
        assert_eq!(fault.code, Fault::INVALID_REQUEST);
        assert!(matches!(
            Incoming::decode(json!("ping")),
            Incoming::Malformed { id: Value::Null, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_json_line_is_framed_but_not_decoded() {
        let mut reader = BufReader::new("{\"jsonrpc\": \n".as_bytes());
        let (payload, framing) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::Newline);
        assert!(serde_json::from_slice::<Value>(&payload).is_err());

        let reply = Fault::parse_error(serde_json::from_slice::<Value>(&payload).unwrap_err())
            .into_reply(Value::Null);
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["id"], Value::Null);
    }

    #[test]
    fn error_envelope_marks_tool_call_as_failed() {
        let err = SmmError::UnknownTool("get_everything".to_string());
        let response = build_tool_call_response(tool_error_envelope("get_everything", &err), true);
        assert_eq!(response["isError"], true);
        assert_eq!(response["structuredContent"]["error"]["error"], "unknown_tool");
        assert!(
            response["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("get_everything")
        );
    }
}
