//! HTTP transport driven phase by phase
//!
//! Each exchange opens its own connection: resolve, connect, optionally
//! tunnel and handshake, then speak HTTP/1.1 or HTTP/2 depending on ALPN.
//! Every phase boundary is reported to the exchange's [`TraceCollector`].

pub mod body;
pub mod proxy;
pub mod tls;

use crate::{
    dns::{check_literal, literal_address, DnsResolver},
    error::{AppError, Result},
    logging::{Logger, NetworkLogger},
    models::{timing::millis_between, BodySource, Config, ProxySettings},
    trace::{TraceCollector, TraceHooks},
    types::Scheme,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Version};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::io::ReaderStream;
use url::Url;

/// Response body as handed to the caller
pub type ResponseBody = UnsyncBoxBody<Bytes, AppError>;

/// Outgoing request body
pub type RequestBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// One request as the controller wants it sent
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub url: Url,
    pub method: Method,
    /// Extra headers, `Host` excluded
    pub headers: Vec<(String, String)>,
    /// Advertised host replacing the URL's authority
    pub host_override: Option<String>,
    pub body: BodySource,
}

impl ExchangeRequest {
    /// Request for `url` carrying the run's method, headers and body
    pub fn from_config(config: &Config, url: Url) -> Self {
        Self {
            url,
            method: config.method.clone(),
            headers: config.headers.clone(),
            host_override: config.host_override.clone(),
            body: config.body.clone(),
        }
    }

    /// Authority advertised to the server (`Host` or `:authority`)
    pub fn authority(&self) -> String {
        self.host_override
            .clone()
            .unwrap_or_else(|| self.authority_of_url())
    }

    /// URL authority ignoring any `Host` override; default ports are omitted
    pub fn authority_of_url(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Path and query as sent in an origin-form request line
    pub fn origin_form(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        Scheme::from_url(&self.url)
    }
}

/// Response headers plus a body that still has to be consumed
pub struct ExchangeResponse {
    pub status: StatusCode,
    /// Reason phrase as sent, when it differs from the canonical one
    pub reason: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl std::fmt::Debug for ExchangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs one exchange and reports its phases
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` on a fresh connection and return once response headers
    /// have arrived
    async fn exchange(
        &self,
        request: &ExchangeRequest,
        trace: &mut TraceCollector,
        net: &NetworkLogger,
    ) -> Result<ExchangeResponse>;
}

/// Real network transport
pub struct HttpTransport {
    resolver: DnsResolver,
    tls: TlsConnector,
    proxy: ProxySettings,
}

impl HttpTransport {
    /// Build the transport configuration once per run
    pub fn new(config: &Config, logger: &Logger) -> Result<Self> {
        let tls_options = tls::TlsOptions {
            insecure: config.insecure,
            client_cert: config.client_cert.as_deref(),
            ca_cert: config.ca_cert.as_deref(),
        };
        let tls_config = tls::build_client_config(&tls_options, logger)?;

        Ok(Self {
            resolver: DnsResolver::new(config.address_family, logger),
            tls: TlsConnector::from(Arc::new(tls_config)),
            proxy: config.proxy.clone(),
        })
    }

    /// Resolve `host` and open a TCP connection to its first address
    async fn dial(
        &self,
        host: &str,
        port: u16,
        trace: &mut TraceCollector,
        net: &NetworkLogger,
    ) -> Result<TcpStream> {
        let ip = match literal_address(host) {
            Some(ip) => check_literal(ip, self.resolver.family())?,
            None => {
                let started = Instant::now();
                trace.dns_start(host, started);
                let addresses = self.resolver.lookup(host).await?;
                let done = Instant::now();
                trace.dns_done(done);
                net.log_dns_resolution(host, self.resolver.family().name(), &addresses, millis_between(started, done));
                addresses
                    .first()
                    .copied()
                    .ok_or_else(|| AppError::dns_resolution(format!("lookup {}: no such host", host)))?
            }
        };

        let addr = SocketAddr::new(ip, port);
        trace.connect_start(addr, Instant::now());
        let outcome = TcpStream::connect(addr).await;
        net.log_connection(
            &addr.to_string(),
            None,
            outcome.is_ok(),
            outcome.as_ref().err().map(ToString::to_string).as_deref(),
        );
        trace.connect_done(addr, outcome.as_ref().err(), Instant::now())?;
        Ok(outcome?)
    }

    /// Handshake TLS on `stream`, then speak whatever protocol ALPN picked
    async fn exchange_over_tls<S>(
        &self,
        stream: S,
        request: &ExchangeRequest,
        wire: WireRequest,
        trace: &mut TraceCollector,
        net: &NetworkLogger,
    ) -> Result<ExchangeResponse>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let host = request.url.host_str().unwrap_or_default();
        let server_name = tls::server_name(request.host_override.as_deref().unwrap_or(host))?;
        let started = Instant::now();
        trace.tls_handshake_start(started);
        let tls_stream = self
            .tls
            .connect(server_name, stream)
            .await
            .map_err(|e| AppError::tls(format!("TLS handshake failed: {}", e)))?;
        let done = Instant::now();
        trace.tls_handshake_done(done);

        let alpn = tls_stream
            .get_ref()
            .1
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());
        net.log_tls_handshake(host, alpn.as_deref(), millis_between(started, done));
        let multiplexed = alpn.as_deref() == Some("h2");

        trace.got_conn(Instant::now());
        let request = build_request(request, wire.body, wire.content_length, multiplexed, false)?;
        send(tls_stream, request, multiplexed, trace).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(
        &self,
        request: &ExchangeRequest,
        trace: &mut TraceCollector,
        net: &NetworkLogger,
    ) -> Result<ExchangeResponse> {
        let (body, content_length) = request_body(&request.body).await?;

        trace.get_conn(Instant::now());

        let host = request
            .url
            .host_str()
            .ok_or_else(|| AppError::config(format!("URL has no host: {}", request.url)))?;
        let scheme = request.scheme();
        let port = request.url.port_or_known_default().unwrap_or(scheme.default_port());
        let proxy = proxy::select_proxy(&self.proxy, &request.url);

        let stream = match proxy {
            Some(proxy_url) => {
                let (proxy_host, proxy_port) = proxy::proxy_authority(proxy_url)?;
                self.dial(&proxy_host, proxy_port, trace, net).await?
            }
            None => self.dial(host, port, trace, net).await?,
        };

        if !scheme.is_encrypted() {
            trace.got_conn(Instant::now());
            let request = build_request(request, body, content_length, false, proxy.is_some())?;
            return send(stream, request, false, trace).await;
        }

        let wire = WireRequest { body, content_length };
        if proxy.is_some() {
            let tunnel = proxy::connect_tunnel(stream, &format!("{}:{}", host, port)).await?;
            return self.exchange_over_tls(tunnel, request, wire, trace, net).await;
        }
        self.exchange_over_tls(stream, request, wire, trace, net).await
    }
}

/// Request body ready for the wire, with its length when known
struct WireRequest {
    body: RequestBody,
    content_length: Option<u64>,
}

/// Body for the request, reopening `@file` bodies every time
async fn request_body(source: &BodySource) -> Result<(RequestBody, Option<u64>)> {
    match source {
        BodySource::Empty => Ok((Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(), None)),
        BodySource::Literal(text) => Ok((
            Full::new(Bytes::from(text.clone()))
                .map_err(|never| match never {})
                .boxed_unsync(),
            None,
        )),
        BodySource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| AppError::io(format!("failed to open request body {}: {}", path.display(), e)))?;
            let length = file.metadata().await.ok().map(|meta| meta.len());
            let frames = ReaderStream::new(file).map_ok(Frame::data);
            Ok((StreamBody::new(frames).boxed_unsync(), length))
        }
    }
}

/// Assemble the wire request
///
/// HTTP/2 carries the authority in the URI; HTTP/1 gets a `Host` header and
/// an origin-form target, or the absolute URL when talking to a proxy.
fn build_request(
    request: &ExchangeRequest,
    body: RequestBody,
    content_length: Option<u64>,
    multiplexed: bool,
    absolute_form: bool,
) -> Result<Request<RequestBody>> {
    let authority = request.authority();
    let mut builder = Request::builder().method(request.method.clone());

    if multiplexed {
        builder = builder
            .version(Version::HTTP_2)
            .uri(format!("{}://{}{}", request.url.scheme(), authority, request.origin_form()));
    } else {
        let target = if absolute_form {
            format!("{}://{}{}", request.url.scheme(), request.authority_of_url(), request.origin_form())
        } else {
            request.origin_form()
        };
        builder = builder.uri(target).header(header::HOST, authority.as_str());
    }

    let mut has_user_agent = false;
    let mut has_content_length = false;
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::http_request(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::http_request(format!("invalid value for header {}: {}", name, e)))?;
        has_user_agent |= name == header::USER_AGENT;
        has_content_length |= name == header::CONTENT_LENGTH;
        builder = builder.header(name, value);
    }

    if !has_user_agent {
        builder = builder.header(header::USER_AGENT, crate::defaults::user_agent());
    }
    if let (Some(length), false) = (content_length, has_content_length) {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    Ok(builder.body(body)?)
}

/// Keeps the request handle alive until the body has been read
enum Sender {
    Http1(http1::SendRequest<RequestBody>),
    Http2(http2::SendRequest<RequestBody>),
}

struct ConnectionBody {
    inner: Incoming,
    _sender: Sender,
}

impl Body for ConnectionBody {
    type Data = Bytes;
    type Error = AppError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, AppError>>> {
        Pin::new(&mut self.inner)
            .poll_frame(cx)
            .map(|frame| frame.map(|result| result.map_err(AppError::from)))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Handshake HTTP on an established stream and send one request
async fn send<S>(
    io: S,
    request: Request<RequestBody>,
    multiplexed: bool,
    trace: &mut TraceCollector,
) -> Result<ExchangeResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);

    let (response, sender) = if multiplexed {
        let (mut sender, conn) = http2::handshake(TokioExecutor::new(), io).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });
        let response = sender.send_request(request).await?;
        (response, Sender::Http2(sender))
    } else {
        let (mut sender, conn) = http1::handshake(io).await?;
        tokio::spawn(async move {
            let _ = conn.await;
        });
        let response = sender.send_request(request).await?;
        (response, Sender::Http1(sender))
    };

    trace.got_first_response_byte(Instant::now());

    let (parts, incoming) = response.into_parts();
    let reason = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned());
    let body = ConnectionBody {
        inner: incoming,
        _sender: sender,
    }
    .boxed_unsync();

    Ok(ExchangeResponse {
        status: parts.status,
        reason,
        version: parts.version,
        headers: parts.headers,
        body,
    })
}
