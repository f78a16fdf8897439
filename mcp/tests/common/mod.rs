//! Shared fixtures: an in-memory remote and server builders

#![allow(dead_code)]

use async_trait::async_trait;
use gtools_config::Config;
use gtools_mcp::protocol::RequestId;
use gtools_mcp::{
    ApiRequest, JsonRpcRequest, McpError, McpServer, McpServerContext, RemoteApi, Result,
    ServerConfig,
};
use reqwest::Method;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

enum Reply {
    Json(Value),
    Bytes(Vec<u8>),
    Fail(u16, String),
}

struct Route {
    method: Method,
    path: String,
    reply: Reply,
}

/// Remote fake answering by method and path; unknown routes fail with 404
#[derive(Default)]
pub struct MockRemote {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, method: Method, path: &str, reply: Reply) {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            reply,
        });
    }

    /// Answer `method path` with a JSON body; later routes win
    pub fn on(&self, method: Method, path: &str, body: Value) {
        self.route(method, path, Reply::Json(body));
    }

    /// Answer a download with raw bytes
    pub fn on_download(&self, path: &str, bytes: &[u8]) {
        self.route(Method::GET, path, Reply::Bytes(bytes.to_vec()));
    }

    /// Fail `method path` with an API error
    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) {
        self.route(method, path, Reply::Fail(status, message.to_string()));
    }

    /// Every request seen so far
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests with the given method and path
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.method == method && r.path() == path)
            .collect()
    }

    /// Requests that could change remote state
    pub fn mutations(&self) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    fn reply(&self, request: &ApiRequest) -> Result<Reply> {
        self.calls.lock().unwrap().push(request.clone());

        let path = request.path();
        let routes = self.routes.lock().unwrap();
        let route = routes
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == path)
            .ok_or_else(|| McpError::Remote {
                status: 404,
                message: format!("No route for {}", request),
            })?;

        Ok(match &route.reply {
            Reply::Json(v) => Reply::Json(v.clone()),
            Reply::Bytes(b) => Reply::Bytes(b.clone()),
            Reply::Fail(status, message) => Reply::Fail(*status, message.clone()),
        })
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn call(&self, request: ApiRequest) -> Result<Value> {
        match self.reply(&request)? {
            Reply::Json(v) => Ok(v),
            Reply::Bytes(_) => Ok(Value::Null),
            Reply::Fail(status, message) => Err(McpError::Remote { status, message }),
        }
    }

    async fn download(&self, request: ApiRequest) -> Result<Vec<u8>> {
        match self.reply(&request)? {
            Reply::Bytes(b) => Ok(b),
            Reply::Json(v) => Ok(serde_json::to_vec(&v)?),
            Reply::Fail(status, message) => Err(McpError::Remote { status, message }),
        }
    }
}

/// Configuration with the access token set and backups under `backup_dir`
pub fn test_config(backup_dir: &Path) -> Config {
    Config {
        backup_dir: backup_dir.to_path_buf(),
        log_file: None,
        mcp_auth_token: Some("test-token".to_string()),
        ..Config::default()
    }
}

/// Server over the fake remote with the given configuration
pub fn server_with(remote: Arc<MockRemote>, config: Config) -> McpServer {
    let context = McpServerContext::new(config, remote);
    McpServer::new(Arc::new(context), ServerConfig::default())
}

/// Server over the fake remote with backups in `backup_dir`
pub fn server(remote: Arc<MockRemote>, backup_dir: &Path) -> McpServer {
    server_with(remote, test_config(backup_dir))
}

/// Call a tool through `tools/call` and return the result envelope
pub async fn call(server: &McpServer, tool: &str, arguments: Value) -> Value {
    let request = JsonRpcRequest::new(
        RequestId::Number(1),
        "tools/call",
        Some(json!({ "name": tool, "arguments": arguments })),
    );

    let response = server
        .handle_request(request)
        .await
        .expect("tools/call always answers");
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    response.result.expect("result present")
}

/// Text content of a result envelope
pub fn text(result: &Value) -> String {
    result["content"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// Whether the envelope reports a failure
pub fn is_error(result: &Value) -> bool {
    result["isError"].as_bool().unwrap_or(false)
}

/// Whether the envelope is a gate preview
pub fn is_blocked(result: &Value) -> bool {
    result["structuredContent"]["status"] == "blocked"
}

/// Extract the operation id from a prepare_script_update result
pub fn operation_id(result: &Value) -> String {
    let text = text(result);
    let start = text
        .find("Operation ID: ")
        .map(|i| i + "Operation ID: ".len())
        .expect("operation id in text");
    let end = text[start..].find(')').expect("closing paren") + start;
    text[start..end].to_string()
}
