//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{header::HOST, HeaderMap, Request, Response, Uri};
use axum::Router;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use recycling_proxy::config::ProxyConfig;
use recycling_proxy::http::HttpServer;
use recycling_proxy::lifecycle::Shutdown;
use recycling_proxy::net::{AcceptedConnection, Acceptor, ConnectionContext, CountingAcceptor, ListenerError};

/// Start a keep-alive capable backend answering 200 OK.
///
/// `/echo` replies with the request URI and headers, one `name=value` per line.
pub async fn start_mock_backend() -> SocketAddr {
    let app = Router::new()
        .route("/echo", axum::routing::any(echo))
        .fallback(|| async { "ok" });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(uri: Uri, headers: HeaderMap) -> String {
    let mut out = format!("uri={}\n", uri);
    for (name, value) in headers.iter() {
        out.push_str(&format!("{}={}\n", name, value.to_str().unwrap_or("")));
    }
    out
}

/// Start a backend that answers every request with `Connection: close`.
pub async fn start_closing_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Wraps the real acceptor, remembering every connection context it hands
/// out. `fail` makes the pending accept return an error.
struct ObservedAcceptor {
    inner: CountingAcceptor,
    contexts: Arc<Mutex<Vec<ConnectionContext>>>,
    fail: Arc<Notify>,
}

impl Acceptor for ObservedAcceptor {
    async fn accept(&self) -> Result<AcceptedConnection, ListenerError> {
        tokio::select! {
            accepted = self.inner.accept() => {
                if let Ok(connection) = &accepted {
                    self.contexts.lock().unwrap().push(connection.context.clone());
                }
                accepted
            }
            _ = self.fail.notified() => Err(ListenerError::Accept(io::Error::new(
                io::ErrorKind::Other,
                "accept failure injected by test",
            ))),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
    contexts: Arc<Mutex<Vec<ConnectionContext>>>,
    fail: Arc<Notify>,
}

impl RunningProxy {
    /// Contexts of the connections accepted so far, in accept order.
    pub fn contexts(&self) -> Vec<ConnectionContext> {
        self.contexts.lock().unwrap().clone()
    }

    /// Make the accept loop's next accept fail.
    pub fn fail_accept(&self) {
        self.fail.notify_one();
    }
}

/// Start the proxy on an ephemeral port in front of `backend`.
pub async fn start_proxy(backend: SocketAddr, requests_per_conn: u64) -> RunningProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.drain_timeout_secs = 2;
    config.upstream.host = backend.ip().to_string();
    config.upstream.port = backend.port();
    config.upstream.connect_timeout_secs = 2;
    config.recycling.requests_per_conn = requests_per_conn;

    let server = HttpServer::new(&config).unwrap();
    let inner = CountingAcceptor::bind(&config.listener).await.unwrap();
    let addr = inner.local_addr().unwrap();
    let contexts = Arc::new(Mutex::new(Vec::new()));
    let fail = Arc::new(Notify::new());
    let acceptor = ObservedAcceptor {
        inner,
        contexts: Arc::clone(&contexts),
        fail: Arc::clone(&fail),
    };

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(acceptor, shutdown.subscribe()));

    RunningProxy {
        addr,
        shutdown,
        handle,
        contexts,
        fail,
    }
}

/// A single client TCP connection speaking HTTP/1.1, so tests can see
/// exactly which requests share a connection.
pub struct ClientConnection {
    sender: SendRequest<Body>,
    task: JoinHandle<hyper::Result<()>>,
}

impl ClientConnection {
    pub async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await.unwrap();
        let task = tokio::spawn(conn);
        Self { sender, task }
    }

    pub async fn get(&mut self, path: &str) -> Response<Bytes> {
        self.send(Request::builder().uri(path).header(HOST, "proxy.test").body(Body::empty()).unwrap())
            .await
    }

    pub async fn send(&mut self, request: Request<Body>) -> Response<Bytes> {
        self.sender.ready().await.unwrap();
        let response = self.sender.send_request(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        Response::from_parts(parts, bytes)
    }

    /// True if the connection can still carry another request.
    pub async fn is_reusable(&mut self) -> bool {
        !self.sender.is_closed() && self.sender.ready().await.is_ok()
    }

    /// Wait for the underlying connection to end. Returns false on timeout.
    pub async fn wait_closed(self) -> bool {
        tokio::time::timeout(Duration::from_secs(5), self.task).await.is_ok()
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// Send `request` over a raw TCP stream and read one response with a
/// `Content-Length` body. Returns the head and the body.
pub async fn raw_exchange(stream: &mut TcpStream, request: &str) -> (String, Vec<u8>) {
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response body");
        buf.extend_from_slice(&chunk[..n]);
    }
    (head, buf[head_end..head_end + length].to_vec())
}

/// Values of the `connection` header in a raw response head, lowercased.
pub fn connection_tokens(head: &str) -> Vec<String> {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.eq_ignore_ascii_case("connection"))
        .flat_map(|(_, value)| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .collect()
}

pub fn closes(response: &Response<Bytes>) -> bool {
    response
        .headers()
        .get("connection")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("close"))
        .unwrap_or(false)
}
