//! In-process stand-in for the HTTP services the clients talk to.
//!
//! Serves one canned reply per request from a route closure and records
//! every request. With the `local` feature it also accepts `GET /ws`
//! upgrades and plays a scripted list of text frames.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn bytes(content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.to_vec(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl Recorded {
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// What the websocket endpoint does after the handshake.
#[derive(Debug, Clone)]
pub enum Socket {
    /// Send the frames, then stay open until the client goes away.
    Open(Vec<String>),
    /// Send the frames, then close.
    Close(Vec<String>),
}

type Routes = Arc<dyn Fn(&str, &str) -> Reply + Send + Sync>;

pub struct FakeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    sockets: Arc<AtomicUsize>,
}

impl FakeServer {
    pub async fn start<F>(socket: Socket, routes: F) -> Self
    where
        F: Fn(&str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sockets = Arc::new(AtomicUsize::new(0));
        let routes: Routes = Arc::new(routes);

        let (log, count) = (requests.clone(), sockets.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (socket, routes, log, count) =
                    (socket.clone(), routes.clone(), log.clone(), count.clone());
                tokio::spawn(async move {
                    if is_upgrade(&stream).await {
                        count.fetch_add(1, Ordering::SeqCst);
                        serve_socket(stream, socket).await;
                    } else {
                        serve_http(stream, routes.as_ref(), &log).await;
                    }
                });
            }
        });

        Self {
            url,
            requests,
            sockets,
        }
    }

    pub async fn http(routes: impl Fn(&str, &str) -> Reply + Send + Sync + 'static) -> Self {
        Self::start(Socket::Open(Vec::new()), routes).await
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(Recorded::line).collect()
    }

    /// Websocket handshakes accepted so far.
    pub fn sockets(&self) -> usize {
        self.sockets.load(Ordering::SeqCst)
    }
}

/// A reqwest client that ignores proxy settings from the environment.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn is_upgrade(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 2048];
    loop {
        let n = match stream.peek(&mut buf).await {
            Ok(0) | Err(_) => return false,
            Ok(n) => n,
        };
        if find(&buf[..n], b"\r\n\r\n").is_some() || n == buf.len() {
            return buf[..n].starts_with(b"GET /ws");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[cfg(feature = "local")]
async fn serve_socket(stream: TcpStream, script: Socket) {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (frames, close) = match script {
        Socket::Open(frames) => (frames, false),
        Socket::Close(frames) => (frames, true),
    };
    for frame in frames {
        if ws.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }
    if close {
        let _ = ws.close(None).await;
        return;
    }
    while let Some(Ok(_)) = ws.next().await {}
}

#[cfg(not(feature = "local"))]
async fn serve_socket(_stream: TcpStream, _script: Socket) {}

async fn serve_http(
    mut stream: TcpStream,
    routes: &(dyn Fn(&str, &str) -> Reply + Send + Sync),
    log: &Mutex<Vec<Recorded>>,
) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let lower = head.to_ascii_lowercase();
    let length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = lower.contains("transfer-encoding: chunked");
    loop {
        let received = data.len() - head_end;
        let done = match length {
            Some(len) => received >= len,
            None if chunked => data.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if done {
            break;
        }
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }

    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let reply = routes(&method, &path);
    log.lock().unwrap().push(Recorded {
        method,
        path,
        body: String::from_utf8_lossy(&data[head_end..]).to_string(),
    });

    let header = format!(
        "HTTP/1.1 {} Fake\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reply.content_type,
        reply.body.len()
    );
    let _ = stream.write_all(header.as_bytes()).await;
    let _ = stream.write_all(&reply.body).await;
    let _ = stream.shutdown().await;
}
