//! Request cycle controller
//!
//! Runs the configured number of top-level iterations, one after another,
//! and within each follows the redirect chain as a bounded loop. Every
//! exchange gets a fresh [`TraceCollector`] and is rendered as soon as its
//! body has been dealt with.

use crate::{
    client::{
        body::{self, BodyDisposition},
        ExchangeRequest, HttpTransport, Transport,
    },
    defaults::MAX_REDIRECTS,
    error::{AppError, Result},
    logging::{Logger, NetworkLogger},
    models::{
        report::{proto_string, status_string},
        Config, Report,
    },
    output::{diagram, RenderContext, Renderer, RendererFactory},
    trace::TraceCollector,
    types::Scheme,
};
use http::{HeaderMap, StatusCode, Version};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Redirects still allowed within one top-level iteration
#[derive(Debug, Clone)]
pub struct RedirectBudget {
    followed: u32,
    limit: u32,
}

impl RedirectBudget {
    pub fn new(limit: u32) -> Self {
        Self { followed: 0, limit }
    }

    pub fn followed(&self) -> u32 {
        self.followed
    }

    /// Account for one more redirect, failing once the limit is passed
    pub fn spend(&mut self) -> Result<u32> {
        if self.followed >= self.limit {
            return Err(AppError::redirect(format!(
                "maximum number of redirects ({}) followed",
                self.limit
            )));
        }
        self.followed += 1;
        Ok(self.followed)
    }
}

impl Default for RedirectBudget {
    fn default() -> Self {
        Self::new(MAX_REDIRECTS)
    }
}

/// Counters over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Exchanges rendered, redirects included
    pub exchanges: u32,
    /// Redirects followed across all iterations
    pub redirects_followed: u32,
}

/// Status line and headers kept after the body has been consumed
struct ResponseHead {
    status: StatusCode,
    reason: Option<String>,
    version: Version,
    headers: HeaderMap,
}

/// Result of one exchange, ready to render
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub report: Report,
    pub scheme: Scheme,
    pub status: StatusCode,
    pub disposition: BodyDisposition,
    /// Response headers, kept for redirect resolution
    pub headers: HeaderMap,
}

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    transport: Arc<dyn Transport>,
    renderer: Box<dyn Renderer>,
    logger: Logger,
    net: NetworkLogger,
}

impl App {
    /// Application talking to the real network
    pub fn new(config: Config) -> Result<Self> {
        diagram::validate_templates()?;
        let logger = Logger::with_config("HTTPSTAT", &config);
        let transport = Arc::new(HttpTransport::new(&config, &logger)?);
        Ok(Self::with_transport(config, transport, logger))
    }

    /// Application over any [`Transport`]
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>, logger: Logger) -> Self {
        let renderer = RendererFactory::create_renderer(config.output, config.enable_color);
        let net = NetworkLogger::new(&logger);
        Self { config, transport, renderer, logger, net }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run against stdout
    pub async fn run(&self) -> Result<RunSummary> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.run_with_output(&mut out).await
    }

    /// Run every iteration, writing reports to `out`
    pub async fn run_with_output<W: Write>(&self, out: &mut W) -> Result<RunSummary> {
        crate::log_debug!(self.logger, "configuration: {}", self.config.summary());

        let mut summary = RunSummary::default();
        for iteration in 0..self.config.num_requests {
            if iteration > 0 {
                tokio::time::sleep(self.config.request_delay).await;
            }
            self.follow_chain(out, &mut summary).await?;
        }
        Ok(summary)
    }

    /// One top-level iteration: the target and any redirects it leads to
    async fn follow_chain<W: Write>(&self, out: &mut W, summary: &mut RunSummary) -> Result<()> {
        let mut budget = RedirectBudget::default();
        let mut url = self.config.target.clone();

        loop {
            let outcome = self.visit(&url).await?;
            self.emit(out, &outcome)?;
            summary.exchanges += 1;

            if !self.config.follow_redirects || !outcome.status.is_redirection() {
                return Ok(());
            }
            let Some(next) = redirect_location(&url, &outcome.headers)? else {
                crate::log_debug!(self.logger, "{} without Location, not following", outcome.status);
                return Ok(());
            };

            let depth = budget.spend()?;
            summary.redirects_followed += 1;
            self.net.log_redirect(url.as_str(), next.as_str(), depth);
            url = next;
        }
    }

    /// Perform one exchange against `url` and assemble its report
    pub async fn visit(&self, url: &Url) -> Result<ExchangeOutcome> {
        let request = ExchangeRequest::from_config(&self.config, url.clone());
        let net = self.net.next_exchange();
        let mut trace = TraceCollector::new();

        let exchange = self.exchange_and_drain(&request, &mut trace, &net);
        let result = match self.config.max_time {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|elapsed| Err(elapsed.into())),
            None => exchange.await,
        };
        let (head, disposition) = match result {
            Ok(parts) => parts,
            Err(e) => {
                net.log_exchange_failure(request.method.as_str(), url.as_str(), &e);
                return Err(e);
            }
        };
        let timing = trace.finish(Instant::now());

        let mut report = Report {
            address: trace.remote_addr().map(|addr| addr.to_string()).unwrap_or_default(),
            proto: proto_string(head.version),
            status: status_string(head.status, head.reason.as_deref()),
            timing,
            ..Default::default()
        };
        report.set_headers(&head.headers);

        net.log_http_request(request.method.as_str(), url.as_str(), head.status.as_u16(), &timing);
        if let BodyDisposition::Saved { path, bytes } = &disposition {
            net.logger()
                .info(&format!("Saved {} bytes to {}", bytes, path.display()))
                .correlation_id(net.correlation_id())
                .log();
        }

        Ok(ExchangeOutcome {
            report,
            scheme: request.scheme(),
            status: head.status,
            disposition,
            headers: head.headers,
        })
    }

    async fn exchange_and_drain(
        &self,
        request: &ExchangeRequest,
        trace: &mut TraceCollector,
        net: &NetworkLogger,
    ) -> Result<(ResponseHead, BodyDisposition)> {
        let response = self.transport.exchange(request, trace, net).await?;

        let disposition = if body::should_read(&request.method, response.status) {
            let sink = body::output_path(&self.config.save, &response.headers, &request.url)?;
            body::consume(response.body, sink).await?
        } else {
            BodyDisposition::Skipped
        };

        let head = ResponseHead {
            status: response.status,
            reason: response.reason,
            version: response.version,
            headers: response.headers,
        };
        Ok((head, disposition))
    }

    fn emit<W: Write>(&self, out: &mut W, outcome: &ExchangeOutcome) -> Result<()> {
        let context = RenderContext {
            report: &outcome.report,
            scheme: outcome.scheme,
            body_message: outcome.disposition.message(),
        };
        let text = self.renderer.render(&context)?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// `Location` of a response, resolved against the URL that produced it
pub fn redirect_location(base: &Url, headers: &HeaderMap) -> Result<Option<Url>> {
    let Some(value) = headers.get(http::header::LOCATION) else {
        return Ok(None);
    };
    let location = value
        .to_str()
        .map_err(|e| AppError::redirect(format!("unable to follow redirect: {}", e)))?;
    if location.is_empty() {
        return Ok(None);
    }
    base.join(location)
        .map(Some)
        .map_err(|e| AppError::redirect(format!("unable to follow redirect: {}", e)))
}
