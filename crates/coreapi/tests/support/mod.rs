//! Routed fake daemon for facade tests.
//!
//! Answers each `/api/v0/<command>` with a canned body registered for that
//! command and records what it received.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use protocol::DaemonAddress;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Seen {
    pub command: String,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Seen {
    pub fn args(&self) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == "arg")
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
struct Canned {
    status: u16,
    body: String,
}

#[derive(Default)]
pub struct Routes {
    routes: HashMap<String, Canned>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `command` with a 200 and `body`.
    pub fn ok(mut self, command: &str, body: &str) -> Self {
        self.routes.insert(
            command.to_string(),
            Canned {
                status: 200,
                body: body.to_string(),
            },
        );
        self
    }

    /// Answers `command` with a 500 and `body`.
    pub fn fail(mut self, command: &str, body: &str) -> Self {
        self.routes.insert(
            command.to_string(),
            Canned {
                status: 500,
                body: body.to_string(),
            },
        );
        self
    }
}

pub struct FakeDaemon {
    port: u16,
    seen: Arc<Mutex<Vec<Seen>>>,
    task: JoinHandle<()>,
}

impl FakeDaemon {
    pub async fn start(routes: Routes) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes.routes);

        let task = tokio::spawn({
            let seen = Arc::clone(&seen);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let seen = Arc::clone(&seen);
                    let routes = Arc::clone(&routes);
                    tokio::spawn(async move {
                        serve(socket, &routes, &seen).await;
                    });
                }
            }
        });

        Self { port, seen, task }
    }

    pub fn address(&self) -> DaemonAddress {
        DaemonAddress::new("127.0.0.1", self.port)
    }

    pub fn multiaddr(&self) -> String {
        format!("/ip4/127.0.0.1/tcp/{}", self.port)
    }

    pub fn seen(&self, command: &str) -> Seen {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|seen| seen.command == command)
            .cloned()
            .unwrap_or_else(|| panic!("daemon never received '{command}'"))
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: TcpStream, routes: &HashMap<String, Canned>, seen: &Mutex<Vec<Seen>>) {
    let mut reader = BufReader::new(socket);
    let mut line = String::new();
    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
        return;
    }
    let target = line.split_whitespace().nth(1).unwrap_or_default().to_string();

    let mut content_length = None;
    let mut chunked = false;
    loop {
        line.clear();
        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
            return;
        }
        let header = line.trim_end().to_ascii_lowercase();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header.strip_prefix("content-length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
        if header.starts_with("transfer-encoding:") && header.ends_with("chunked") {
            chunked = true;
        }
    }

    let mut body = Vec::new();
    if let Some(length) = content_length {
        body.resize(length, 0);
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }
    } else if chunked {
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let Ok(size) = usize::from_str_radix(line.trim(), 16) else {
                return;
            };
            if size == 0 {
                line.clear();
                let _ = reader.read_line(&mut line).await;
                break;
            }
            let start = body.len();
            body.resize(start + size + 2, 0);
            if reader.read_exact(&mut body[start..]).await.is_err() {
                return;
            }
            body.truncate(start + size);
        }
    }

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let command = path.trim_start_matches("/api/v0/").to_string();
    let query = url::form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    seen.lock().unwrap().push(Seen {
        command: command.clone(),
        query,
        body,
    });

    let canned = routes.get(&command).cloned().unwrap_or(Canned {
        status: 404,
        body: "404 page not found".to_string(),
    });
    let reason = if canned.status == 200 { "OK" } else { "Error" };
    let reply = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        canned.status,
        canned.body.len(),
        canned.body
    );
    let mut socket = reader.into_inner();
    let _ = socket.write_all(reply.as_bytes()).await;
    let _ = socket.shutdown().await;
}
