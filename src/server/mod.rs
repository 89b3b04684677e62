//! Accept loop, connection handling, and route dispatch.
//!
//! The server owns the listening socket and an ordered list of route
//! entries. Each accepted connection is handed to its own Tokio task, which
//! parses the request under the read deadline, fans it out to **every**
//! registered route entry in registration order, and then closes the
//! connection. Dispatch never short-circuits: every entry tests its own
//! method+path predicate, and a callback error is broadcast on the
//! response-error channel while iteration continues, so two entries
//! registered for the same method and path both run for one request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::http::request::{ParseError, Request};
use crate::http::response::Response;
use crate::http::tokenizer::Tokenizer;
use crate::http::Method;
use crate::notify::Notifier;

/// Deadline applied to connection reads and writes when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the per-connection read buffer.
const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Cap on the request-line + header block size (3 MiB).
const DEFAULT_MAX_HEADER_BYTES: usize = 3 * 1024 * 1024;

/// Fatal failures of the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept a connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// Boxed future returned by a route callback.
///
/// The [`Response`] travels through the callback by value and comes back out
/// alongside the callback's result, so dispatch can hand the same response
/// to the next entry.
pub type CallbackFuture = Pin<Box<dyn Future<Output = (Response, Result<(), Error>)> + Send>>;

/// Type-erased route callback, shareable across connection tasks.
pub type Callback = Arc<dyn Fn(Arc<Request>, Response) -> CallbackFuture + Send + Sync>;

// One registered (method, path) predicate around a user callback.
struct Route {
    method: Method,
    path: String,
    callback: Callback,
}

impl Route {
    // Exact equality on both method and path; no patterns, no parameters.
    fn matches(&self, request: &Request) -> bool {
        self.method == *request.method() && self.path == request.path()
    }
}

/// The server: configuration, listener channels, and the route list.
///
/// Created with [`create`](Self::create), configured and populated before
/// [`start`](Self::start), which consumes the server — after that the route
/// list is an immutable snapshot shared by every connection task.
///
/// # Examples
///
/// ```rust,no_run
/// use soloserve::{Error, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Error> {
///     let mut server = Server::create(8080);
///     server.on_error(|err| eprintln!("{err}"));
///     server.on_request("GET", "/", |_request, mut response| async move {
///         let sent = response.send_text("hello world").await;
///         (response, sent.map_err(Error::from))
///     });
///     server.start().await
/// }
/// ```
pub struct Server {
    host: String,
    port: u16,
    buffer_size: usize,
    max_header_bytes: usize,
    read_timeout: Duration,
    write_timeout: Duration,
    // Transport failures and informational messages.
    notifier: Arc<Notifier>,
    // Protocol-format failures on inbound requests.
    request_errors: Arc<Notifier>,
    // Failures returned by route callbacks.
    response_errors: Arc<Notifier>,
    routes: Vec<Route>,
}

impl Server {
    /// Allocates a server for `port` with empty listener lists and default
    /// configuration: host `127.0.0.1`, 10 s read/write deadlines, a 4 KiB
    /// read buffer, and a 3 MiB header cap.
    pub fn create(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            notifier: Arc::new(Notifier::new()),
            request_errors: Arc::new(Notifier::new()),
            response_errors: Arc::new(Notifier::new()),
            routes: Vec::new(),
        }
    }

    /// Sets the host name to bind.
    #[must_use]
    pub fn with_host_name(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the capacity of the per-connection read buffer.
    #[must_use]
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Sets the cap on the request-line + header block size.
    #[must_use]
    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes;
        self
    }

    /// Sets the deadline for parsing an inbound request.
    #[must_use]
    pub fn with_read_timeout(mut self, deadline: Duration) -> Self {
        self.read_timeout = deadline;
        self
    }

    /// Sets the per-write deadline on responses.
    #[must_use]
    pub fn with_write_timeout(mut self, deadline: Duration) -> Self {
        self.write_timeout = deadline;
        self
    }

    /// Registers a listener for transport-level failures: socket reads,
    /// writes, deadlines, bind and accept.
    pub fn on_error(&self, listener: impl Fn(&Error) + Send + Sync + 'static) {
        self.notifier.on_error(listener);
    }

    /// Registers a listener for protocol-format failures on inbound
    /// requests.
    pub fn on_request_error(&self, listener: impl Fn(&Error) + Send + Sync + 'static) {
        self.request_errors.on_error(listener);
    }

    /// Registers a listener for errors returned by route callbacks.
    pub fn on_response_error(&self, listener: impl Fn(&Error) + Send + Sync + 'static) {
        self.response_errors.on_error(listener);
    }

    /// Registers a listener for informational messages.
    pub fn on_message(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.notifier.on_message(listener);
    }

    /// Registers `callback` for requests whose method and path are exactly
    /// `method` and `path`.
    ///
    /// Entries run in registration order and every entry tests its own
    /// predicate on every request, so registering two callbacks for the same
    /// method and path means both run; a later callback's writes then hit
    /// the response writer's lock errors instead of corrupting the wire.
    pub fn on_request<F, Fut>(&mut self, method: &str, path: &str, callback: F)
    where
        F: Fn(Arc<Request>, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = (Response, Result<(), Error>)> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |request, response| {
            Box::pin(callback(request, response))
        });
        self.routes.push(Route {
            method: method.parse().unwrap(), // Infallible
            path: path.to_owned(),
            callback,
        });
    }

    /// Binds the listener and serves until a fatal accept failure.
    ///
    /// Each accepted connection is handled on its own task and serves
    /// exactly one request/response exchange. Bind and accept failures are
    /// broadcast on the error channel and returned.
    pub async fn start(self) -> Result<(), Error> {
        let address = format!("{}:{}", self.host, self.port);
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                let fatal = Error::Server(ServerError::Bind {
                    addr: address,
                    source,
                });
                self.notifier.error(&fatal);
                return Err(fatal);
            }
        };

        info!(address = %address, "listening");
        self.notifier
            .message(&format!("listening for requests at http://{address}"));

        let server = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "connection accepted");
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        server.respond(stream).await;
                    });
                }
                Err(source) => {
                    error!(error = %source, "accept failed");
                    let fatal = Error::Server(ServerError::Accept(source));
                    server.notifier.error(&fatal);
                    return Err(fatal);
                }
            }
        }
    }

    // Serves exactly one request/response exchange, then closes the
    // connection.
    async fn respond(&self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        let mut tokenizer = Tokenizer::new(read_half, self.buffer_size);

        let parse = Request::read(&mut tokenizer, self.max_header_bytes);
        let request = match timeout(self.read_timeout, parse).await {
            Ok(Ok(request)) => request,
            Ok(Err(ParseError::Io(source))) => {
                warn!(error = %source, "transport failure while reading a request");
                self.notifier.error(&Error::Io(source));
                return;
            }
            Ok(Err(protocol)) => {
                warn!(error = %protocol, "malformed request");
                self.request_errors.error(&Error::Parse(protocol));
                return;
            }
            Err(_) => {
                warn!("read deadline elapsed while parsing a request");
                let timed_out = std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "read deadline elapsed",
                );
                self.notifier.error(&Error::Io(timed_out));
                return;
            }
        };

        debug!(method = %request.method(), path = %request.path(), "dispatching request");

        let request = Arc::new(request);
        let mut response =
            Response::new(write_half, request.version()).with_write_timeout(self.write_timeout);

        for route in &self.routes {
            if !route.matches(&request) {
                continue;
            }
            let (returned, result) = (route.callback)(Arc::clone(&request), response).await;
            response = returned;
            if let Err(err) = result {
                warn!(error = %err, "route callback failed");
                self.response_errors.error(&err);
            }
        }

        if let Err(err) = response.finish().await {
            self.notifier.error(&Error::Send(err));
        }
    }
}
