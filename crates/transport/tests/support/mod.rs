//! Fake daemon for transport integration tests.
//!
//! A raw TCP server that parses one HTTP/1.1 request per connection, records
//! it, and answers with a scripted reply. Working at the byte level lets tests
//! produce replies a well-behaved HTTP server would not: redirects to nowhere,
//! bodies cut off mid-chunk, and bodies that never finish.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use protocol::DaemonAddress;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A request as the daemon saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Vec<(String, String)> {
        let query = self.target.split_once('?').map(|(_, q)| q).unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn args(&self) -> Vec<String> {
        self.query()
            .into_iter()
            .filter(|(key, _)| key == "arg")
            .map(|(_, value)| value)
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

/// How the daemon answers one connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write the bytes, then close.
    Complete(Vec<u8>),
    /// Write the bytes, then close without finishing the body.
    Reset(Vec<u8>),
    /// Write the bytes, then wait for the client to hang up.
    Stall(Vec<u8>),
}

type Script = dyn Fn(&RecordedRequest) -> Reply + Send + Sync;

pub struct FakeDaemon {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    connections: Arc<AtomicUsize>,
    released: Arc<Notify>,
    task: JoinHandle<()>,
}

impl FakeDaemon {
    /// Starts a daemon that answers every request with `script(request)`.
    pub async fn start<F>(script: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(Notify::new());
        let script: Arc<Script> = Arc::new(script);

        let task = tokio::spawn({
            let requests = Arc::clone(&requests);
            let connections = Arc::clone(&connections);
            let released = Arc::clone(&released);
            async move {
                loop {
                    let Ok((socket, _)) = listener.accept().await else {
                        return;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let requests = Arc::clone(&requests);
                    let released = Arc::clone(&released);
                    let script = Arc::clone(&script);
                    tokio::spawn(async move {
                        serve(socket, script, requests, released).await;
                    });
                }
            }
        });

        Self {
            addr,
            requests,
            connections,
            released,
            task,
        }
    }

    /// Starts a daemon that always sends the same reply.
    pub async fn replying(reply: Reply) -> Self {
        Self::start(move |_| reply.clone()).await
    }

    pub fn address(&self) -> DaemonAddress {
        DaemonAddress::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Resolves once a client has hung up on a stalled reply.
    pub async fn released(&self) {
        self.released.notified().await;
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    socket: TcpStream,
    script: Arc<Script>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    released: Arc<Notify>,
) {
    let mut reader = BufReader::new(socket);
    let Some(request) = read_request(&mut reader).await else {
        return;
    };
    let reply = script(&request);
    requests.lock().unwrap().push(request);

    let mut socket = reader.into_inner();
    match reply {
        Reply::Complete(bytes) => {
            let _ = socket.write_all(&bytes).await;
            let _ = socket.shutdown().await;
        }
        Reply::Reset(bytes) => {
            let _ = socket.write_all(&bytes).await;
            drop(socket);
        }
        Reply::Stall(bytes) => {
            let _ = socket.write_all(&bytes).await;
            let _ = socket.flush().await;
            let mut sink = [0u8; 256];
            loop {
                match socket.read(&mut sink).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            released.notify_one();
        }
    }
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<RecordedRequest> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let mut words = line.split_whitespace();
    let method = words.next()?.to_string();
    let target = words.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let find = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };
    let body = if let Some(length) = find("content-length") {
        let mut body = vec![0u8; length.parse().ok()?];
        reader.read_exact(&mut body).await.ok()?;
        body
    } else if find("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        read_chunked(reader).await?
    } else {
        Vec::new()
    };

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

async fn read_chunked(reader: &mut BufReader<TcpStream>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let size = line.trim().split(';').next()?;
        let size = usize::from_str_radix(size, 16).ok()?;
        if size == 0 {
            // Optional trailers, then a blank line.
            loop {
                line.clear();
                reader.read_line(&mut line).await.ok()?;
                if line.trim().is_empty() {
                    return Some(body);
                }
            }
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await.ok()?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await.ok()?;
    }
}

// ---------------------------------------------------------------------------
// Reply builders
// ---------------------------------------------------------------------------

fn status_line(status: u16) -> String {
    let reason = http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    format!("HTTP/1.1 {status} {reason}\r\n")
}

/// A complete reply with a fixed-length body.
pub fn fixed(status: u16, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut reply = status_line(status);
    for (name, value) in headers {
        reply.push_str(&format!("{name}: {value}\r\n"));
    }
    reply.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    reply.into_bytes()
}

/// A complete JSON reply.
pub fn json(status: u16, body: &str) -> Vec<u8> {
    fixed(status, &[("Content-Type", "application/json")], body)
}

/// The head of a chunked streaming reply followed by `chunks`. The body is
/// only terminated when `finish` is set.
pub fn chunked(chunks: &[&str], finish: bool) -> Vec<u8> {
    let mut reply = chunked_head(None);
    push_chunks(&mut reply, chunks);
    if finish {
        reply.push_str("0\r\n\r\n");
    }
    reply.into_bytes()
}

/// A complete chunked streaming reply whose last chunk carries the
/// `X-Stream-Error` trailer with `message`.
pub fn chunked_with_trailer(chunks: &[&str], message: &str) -> Vec<u8> {
    let mut reply = chunked_head(Some("X-Stream-Error"));
    push_chunks(&mut reply, chunks);
    reply.push_str(&format!("0\r\nX-Stream-Error: {message}\r\n\r\n"));
    reply.into_bytes()
}

fn chunked_head(trailer: Option<&str>) -> String {
    let mut head = status_line(200);
    head.push_str(
        "Content-Type: application/json\r\n\
         X-Stream-Output: 1\r\n\
         Transfer-Encoding: chunked\r\n\
         Connection: close\r\n",
    );
    if let Some(name) = trailer {
        head.push_str(&format!("Trailer: {name}\r\n"));
    }
    head.push_str("\r\n");
    head
}

fn push_chunks(reply: &mut String, chunks: &[&str]) {
    for chunk in chunks {
        reply.push_str(&format!("{:x}\r\n{chunk}\r\n", chunk.len()));
    }
}
