//! # HTTP Server
//!
//! Hyper/Tokio front end for the radix router.
//! Implements graceful shutdown with signal handling.
//!
//! ## Dispatch
//!
//! Each request is matched once; the resulting chain runs in registration
//! order against a shared [`Context`] until a handler calls
//! [`Context::abort`]. Unmatched paths run the `404` chain; unsupported
//! methods, and paths routed only under other methods, run the `405` chain. Both default to JSON error bodies.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::request::Request;
use crate::router::Router;
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP response built up by a handler chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create a JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Create a text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// JSON `{"error": message}` body with the given status
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(serde_json::json!({ "error": message }).to_string()).with_status(status)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header, `Content-Type` replaces the content type
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Get a header value (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                error!("Invalid response header: {e}");
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            })
    }
}

fn plain_response(status: StatusCode, body: &'static str) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// State shared by the handlers of one chain
#[derive(Debug)]
pub struct Context {
    /// Incoming request
    pub request: Request,
    /// Route tags and path parameters, in match order
    pub params: Params,
    /// Response under construction
    pub response: Response,
    aborted: bool,
}

impl Context {
    /// Start a context with an empty `200` response
    #[must_use]
    pub fn new(request: Request, params: Params) -> Self {
        Self {
            request,
            params,
            response: Response::default(),
            aborted: false,
        }
    }

    /// Path parameter or route tag by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Stop the chain after the current handler
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Whether a handler has stopped the chain
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// Handler function type
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

fn not_found_handler() -> Handler {
    Arc::new(|ctx: &mut Context| ctx.response = Response::error(404, "Not Found"))
}

fn method_not_allowed_handler() -> Handler {
    Arc::new(|ctx: &mut Context| ctx.response = Response::error(405, "Method Not Allowed"))
}

/// HTTP server dispatching through a [`Router`]
pub struct Server {
    config: ServerConfig,
    router: Router<Handler>,
}

impl Server {
    /// Create a server with the default `404`/`405` handlers
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let mut router = Router::new();
        router.set_not_found(not_found_handler());
        router.set_method_not_allowed(method_not_allowed_handler());
        Self { config, router }
    }

    /// Server settings
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the server to an address
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Add a route and its handler chain
    ///
    /// # Errors
    ///
    /// Propagates [`Router::register`] errors.
    pub fn route(&mut self, method: &str, pattern: &str, chain: Vec<Handler>) -> Result<()> {
        self.router.register(method, pattern, chain)
    }

    /// Replace the `404` or `405` handler
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSpecialHandler` for any other key.
    pub fn set_special(&mut self, key: &str, handler: Handler) -> Result<()> {
        self.router.set_special(key, handler)
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be set up and
    /// `Error::Io` if accepting fails.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.address;
        let listener = bind_listener(addr).map_err(|source| Error::BindError {
            address: addr.to_string(),
            source,
        })?;

        info!("Server listening on http://{}", addr);

        let server = Arc::new(self);
        let active = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let server = server.clone();
                    let active = active.clone();
                    let keep_alive = server.config.keep_alive;

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move { server.handle_request(req, remote_addr).await }
                        });
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                remaining = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: &str,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        if let Some(actual) = body.as_ref().map(Bytes::len) {
            if actual > self.config.max_body_size {
                return Response::error(413, "Payload Too Large");
            }
        }
        let mut req = Request::new(method, path, headers, body);
        req.set_header("x-client-ip", "test");
        self.dispatch(req)
    }

    async fn handle_request(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let version = req.version();

        let response = match Request::from_hyper_with_limit(req, self.config.max_body_size).await {
            Ok(mut request) => {
                request.set_header("x-client-ip", &remote_addr.ip().to_string());
                self.dispatch(request)
            }
            Err(Error::PayloadTooLarge { limit, actual }) => {
                warn!(limit, actual, "Rejecting oversized request body");
                Response::error(413, "Payload Too Large")
            }
            Err(e) => {
                error!("Failed to parse request: {}", e);
                Response::error(400, "Bad Request")
            }
        };

        info!(
            "    {} - \"{} {} {:?}\" {}",
            remote_addr, method, path, version, response.status
        );
        Ok(response.into_hyper())
    }

    /// Core request processing logic (network agnostic)
    fn dispatch(&self, mut request: Request) -> Response {
        let request_id = match request.header(REQUEST_ID_HEADER) {
            Some(id) => id.to_string(),
            None => {
                let id = generate_request_id();
                request.set_header(REQUEST_ID_HEADER, &id);
                id
            }
        };

        let mut params = Params::new();
        let chain = self.router.lookup(&request.method, &request.path, &mut params);
        debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            handlers = chain.len(),
            "Dispatching"
        );

        let mut ctx = Context::new(request, params);
        for handler in chain {
            handler(&mut ctx);
            if ctx.is_aborted() {
                break;
            }
        }

        let mut response = ctx.response;
        response.set_header(REQUEST_ID_HEADER, &request_id);
        response
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("router", &self.router)
            .finish()
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(not(windows))]
    {
        socket.set_reuseport(true)?;
    }
    socket.bind(addr)?;
    socket.listen(1024)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {e}");
        std::future::pending::<()>().await;
    }
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(f: impl Fn(&mut Context) + Send + Sync + 'static) -> Handler {
        Arc::new(f)
    }

    fn server() -> Server {
        let mut server = Server::new(ServerConfig::default());
        server
            .route(
                "GET",
                "/users/:id|int",
                vec![handler(|ctx| {
                    let id = ctx.params.get_int("id").unwrap_or_default();
                    ctx.response = Response::json(format!(r#"{{"id":{id}}}"#));
                })],
            )
            .unwrap();
        server
            .route(
                "POST",
                "/echo",
                vec![handler(|ctx| {
                    let body = ctx.request.body_str().unwrap_or_default().to_string();
                    ctx.response = Response::text(body).with_status(201);
                })],
            )
            .unwrap();
        server
    }

    #[test]
    fn test_response_json() {
        let resp = Response::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_response_headers() {
        let resp = Response::text("Not Found")
            .with_status(404)
            .with_header("X-Trace", "1")
            .with_header("Content-Type", "text/html");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.header("x-trace"), Some("1"));
        assert_eq!(resp.content_type, "text/html");
    }

    #[test]
    fn test_into_hyper_falls_back_on_bad_header() {
        let resp = Response::text("x").with_header("bad header", "v").into_hyper();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_matched_route() {
        let resp = server()
            .test_request("GET", "/users/42", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, r#"{"id":42}"#);
        assert!(resp.header(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_default_not_found_and_method_not_allowed() {
        let server = server();

        let resp = server
            .test_request("GET", "/users/abc", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, r#"{"error":"Not Found"}"#);

        let resp = server.test_request("PUT", "/users/1", HashMap::new(), None).await;
        assert_eq!(resp.status, 405);

        let resp = server.test_request("PUT", "/nowhere", HashMap::new(), None).await;
        assert_eq!(resp.status, 404);

        let resp = server.test_request("BREW", "/users/1", HashMap::new(), None).await;
        assert_eq!(resp.status, 405);
    }

    #[tokio::test]
    async fn test_custom_special_handler() {
        let mut server = server();
        server
            .set_special("404", handler(|ctx| ctx.response = Response::text("nope").with_status(404)))
            .unwrap();
        assert!(server
            .set_special("500", handler(|_| {}))
            .is_err());

        let resp = server.test_request("GET", "/missing", HashMap::new(), None).await;
        assert_eq!(resp.body, "nope");
    }

    #[tokio::test]
    async fn test_chain_runs_until_abort() {
        let mut server = Server::new(ServerConfig::default());
        server
            .route(
                "GET",
                "/admin role:admin",
                vec![
                    handler(|ctx| {
                        if ctx.request.header("authorization").is_none() {
                            ctx.response = Response::error(401, "Unauthorized");
                            ctx.abort();
                        }
                    }),
                    handler(|ctx| {
                        let role = ctx.param("role").unwrap_or_default().to_string();
                        ctx.response = Response::text(role);
                    }),
                ],
            )
            .unwrap();

        let resp = server.test_request("GET", "/admin", HashMap::new(), None).await;
        assert_eq!(resp.status, 401);

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer t".to_string());
        let resp = server.test_request("GET", "/admin", headers, None).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "admin");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), "req-7".to_string());
        let resp = server().test_request("GET", "/users/1", headers, None).await;
        assert_eq!(resp.header(REQUEST_ID_HEADER), Some("req-7"));
    }

    #[test]
    fn test_payload_limit_and_body() {
        let mut config = ServerConfig::default();
        config.max_body_size = 4;
        let mut server = Server::new(config);
        server
            .route("POST", "/echo", vec![handler(|ctx| {
                ctx.response = Response::text(ctx.request.body_str().unwrap_or_default().to_string());
            })])
            .unwrap();

        let resp = tokio_test::block_on(server.test_request(
            "POST",
            "/echo",
            HashMap::new(),
            Some(Bytes::from("too long")),
        ));
        assert_eq!(resp.status, 413);

        let resp = tokio_test::block_on(server.test_request(
            "POST",
            "/echo",
            HashMap::new(),
            Some(Bytes::from("ok")),
        ));
        assert_eq!(resp.body, "ok");
    }

    #[tokio::test]
    async fn test_post_body() {
        let resp = server()
            .test_request("POST", "/echo", HashMap::new(), Some(Bytes::from("hello")))
            .await;
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, "hello");

        let resp = server()
            .test_request("post", "/echo", HashMap::new(), Some(Bytes::from("hello")))
            .await;
        assert_eq!(resp.status, 405);
    }

    #[test]
    fn test_generate_request_id_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }
}
