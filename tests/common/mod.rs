//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use yggdrasil_gateway::yggdrasil::client::http_client;
use yggdrasil_gateway::yggdrasil::{ApiProvider, ProfileLookup, YggdrasilClient};
use yggdrasil_gateway::{Gateway, GatewayConfig};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }
}

/// A canned answer from a mock backend.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub chunked: bool,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            chunked: false,
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.into().into_bytes())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status)).into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if self.chunked {
            out.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
        } else {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        if self.chunked {
            for chunk in self.body.chunks(7) {
                out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                out.extend_from_slice(chunk);
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"0\r\n\r\n");
        } else {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A one-request-per-connection HTTP backend that records what it receives.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond = Arc::new(respond);

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let respond = respond.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(socket);
                    let Some(request) = read_request(&mut reader).await else {
                        return;
                    };
                    let response = respond(&request);
                    recorded.lock().unwrap().push(request);
                    let mut socket = reader.into_inner();
                    let _ = socket.write_all(&response.to_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:<port>`, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<RecordedRequest> {
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    let header = |name: &str| headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone());
    let mut body = Vec::new();
    if let Some(length) = header("content-length") {
        let length: usize = length.parse().ok()?;
        body.resize(length, 0);
        reader.read_exact(&mut body).await.ok()?;
    } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).await.ok()?;
            let size = usize::from_str_radix(size.trim(), 16).ok()?;
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).await.ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// One player known to a mock Yggdrasil provider.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: &'static str,
    /// Dashless UUID.
    pub id: &'static str,
    /// Skin URL advertised in the `textures` property.
    pub skin: Option<String>,
}

impl Player {
    pub fn new(name: &'static str, id: &'static str) -> Self {
        Self { name, id, skin: None }
    }

    pub fn with_skin(mut self, url: String) -> Self {
        self.skin = Some(url);
        self
    }

    fn profile_json(&self, signed: bool) -> String {
        use base64::Engine;
        let textures = match &self.skin {
            Some(url) => format!(r#"{{"textures":{{"SKIN":{{"url":"{url}"}}}}}}"#),
            None => r#"{"textures":{}}"#.to_string(),
        };
        let value = base64::engine::general_purpose::STANDARD.encode(textures);
        let signature = if signed { r#","signature":"c2lnbmVk""# } else { "" };
        format!(
            r#"{{"id":"{}","name":"{}","properties":[{{"name":"textures","value":"{value}"{signature}}}]}}"#,
            self.id, self.name
        )
    }
}

/// A mock identity provider answering `<prefix>/profiles/minecraft` and
/// `<prefix>/session/minecraft/profile/<uuid>`.
pub async fn yggdrasil_provider(players: Vec<Player>) -> MockServer {
    MockServer::start(move |request| {
        let path = request.path();
        if request.method == "POST" && path.ends_with("/profiles/minecraft") {
            let names: Vec<String> = serde_json::from_slice(&request.body).unwrap_or_default();
            let found: Vec<String> = players
                .iter()
                .filter(|p| names.iter().any(|n| n.eq_ignore_ascii_case(p.name)))
                .map(|p| format!(r#"{{"id":"{}","name":"{}"}}"#, p.id, p.name))
                .collect();
            return MockResponse::json(200, format!("[{}]", found.join(",")));
        }
        if let Some((_, id)) = path.rsplit_once("/session/minecraft/profile/") {
            let signed = request.target.contains("unsigned=false");
            return match players.iter().find(|p| p.id == id) {
                Some(player) => MockResponse::json(200, player.profile_json(signed)),
                None => MockResponse::new(204),
            };
        }
        MockResponse::new(404)
    })
    .await
}

/// Identity client for a mock provider served from its root.
pub fn provider_client(name: &'static str, server: &MockServer) -> Arc<dyn ProfileLookup> {
    let provider = ApiProvider::new(
        name,
        format!("{}/profiles/minecraft", server.url()),
        format!("{}/session/minecraft/profile/", server.url()),
    );
    Arc::new(YggdrasilClient::new(provider, plain_client()))
}

pub fn plain_client() -> reqwest::Client {
    http_client(
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(5),
        None,
    )
    .unwrap()
}

/// Gateway whose API root is `api_root`, with the given identity providers.
pub fn gateway(
    api_root: &str,
    custom: Arc<dyn ProfileLookup>,
    global: Option<Arc<dyn ProfileLookup>>,
) -> Gateway {
    let config = GatewayConfig::with_api_root(api_root);
    Gateway::with_lookups(config, custom, global, plain_client()).unwrap()
}

/// Gateway that only proxies: identity lookups go to `api_root`.
pub fn proxy_gateway(api_root: &str) -> Gateway {
    Gateway::new(GatewayConfig::with_api_root(api_root)).unwrap()
}

/// Send raw bytes and read until the gateway closes the connection.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(std::time::Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Split a raw response into its lowercased head and its body.
pub fn split_response(raw: &str) -> (String, String) {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_ascii_lowercase(), body.to_string())
}

/// Address that refuses connections.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
