//! Gateway server: request handling and the lazily started accept loop.
//!
//! # Responsibilities
//! - Recover the original target from the local path
//! - Run the filter chain, forward everything it does not answer
//! - Bind the loopback listener on first use, exactly once
//! - Spawn one session task per accepted connection
//! - Record metrics for every exchange

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::{broadcast, Mutex};

use crate::config::GatewayConfig;
use crate::filters::{build_chain, FilterContext};
use crate::http::codec::CodecError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::session::{Handler, HttpSession, SessionConfig};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::{GatewayMetrics, RequestOutcome};
use crate::proxy::{ApiRootRedirector, ProxyError, Redirector, ReverseProxy};
use crate::routing::matcher::local_path_for;
use crate::routing::{Dispatch, FilterChain, LocalTarget};
use crate::yggdrasil::client::http_client;
use crate::yggdrasil::{ApiProvider, NamespaceMerger, ProfileLookup, YggdrasilClient};

/// Error building a gateway from configuration.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid api root: {0}")]
    ApiRoot(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Handles exchanges: filters first, reverse proxy for the rest.
pub struct GatewayService {
    chain: FilterChain,
    redirector: Arc<dyn Redirector>,
    proxy: ReverseProxy,
    metrics: Arc<GatewayMetrics>,
}

impl GatewayService {
    pub fn new(
        chain: FilterChain,
        redirector: Arc<dyn Redirector>,
        proxy: ReverseProxy,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            chain,
            redirector,
            proxy,
            metrics,
        }
    }

    /// Whether an outbound request to `domain` + `path` should go through the gateway.
    pub fn claims(&self, domain: &str, path: &str) -> bool {
        self.redirector.resolve(domain, path).is_some() || self.chain.claims(domain, path)
    }

    /// Upstream URL for a request nobody answered.
    fn upstream_url(&self, target: &LocalTarget, raw_query: Option<&str>) -> String {
        match self.redirector.resolve(&target.domain, &target.path) {
            Some(mut url) => {
                if let Some(query) = raw_query {
                    url.push('?');
                    url.push_str(query);
                }
                url
            }
            None => target.original_url(raw_query),
        }
    }

    async fn forward(&self, target: &LocalTarget, request: &mut Request<'_>) -> Result<(Response, RequestOutcome), CodecError> {
        let url = self.upstream_url(target, request.raw_query());
        tracing::debug!(method = %request.method(), upstream = %url, "Forwarding request");
        match self.proxy.forward(request, &url).await {
            Ok(response) => Ok((response, RequestOutcome::Proxied)),
            Err(ProxyError::ClientBody(e)) => Err(e),
            Err(e) => {
                tracing::warn!(upstream = %url, error = %e, "Upstream request failed");
                Ok((Response::new(StatusCode::BAD_GATEWAY), RequestOutcome::Failed))
            }
        }
    }
}

#[async_trait]
impl Handler for GatewayService {
    async fn handle(&self, request: &mut Request<'_>) -> Result<Option<Response>, CodecError> {
        let started = Instant::now();
        let Some(target) = LocalTarget::parse(request.path()) else {
            tracing::debug!(path = %request.path(), "Not a gateway path");
            self.metrics.record_request(RequestOutcome::Failed, started);
            return Ok(Some(Response::new(StatusCode::NOT_FOUND)));
        };

        let (response, outcome) = match self.chain.dispatch(&target.domain, &target.path, request).await? {
            Dispatch::Answered { response, .. } => {
                let outcome = if response.status().is_server_error() {
                    RequestOutcome::Failed
                } else {
                    RequestOutcome::Filtered
                };
                (response, outcome)
            }
            Dispatch::Declined { .. } | Dispatch::Unclaimed => self.forward(&target, request).await?,
        };

        tracing::debug!(
            method = %request.method(),
            domain = %target.domain,
            path = %target.path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        // Measured up to the response head; a proxied body may still be streaming.
        self.metrics.record_request(outcome, started);
        Ok(Some(response))
    }
}

struct Running {
    local_addr: SocketAddr,
}

/// The loopback gateway. Binds on first use.
pub struct Gateway {
    config: GatewayConfig,
    service: Arc<GatewayService>,
    metrics: Arc<GatewayMetrics>,
    running: ArcSwapOption<Running>,
    start_lock: Mutex<()>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl Gateway {
    /// Build the gateway with HTTP identity clients for both providers.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let upstream = &config.upstream;
        let api_root = upstream.api_root_url()?;

        let custom_http = http_client(upstream.connect_timeout(), upstream.request_timeout(), None)?;
        let custom: Arc<dyn ProfileLookup> =
            Arc::new(YggdrasilClient::new(ApiProvider::custom(&api_root)?, custom_http.clone()));

        let global: Option<Arc<dyn ProfileLookup>> = if config.features.mojang_namespace {
            let global_http = http_client(
                upstream.connect_timeout(),
                upstream.request_timeout(),
                upstream.mojang_proxy.as_deref(),
            )?;
            Some(Arc::new(YggdrasilClient::new(ApiProvider::mojang(), global_http)))
        } else {
            None
        };

        Self::with_lookups(config, custom, global, custom_http)
    }

    /// Build the gateway over the given identity providers.
    pub fn with_lookups(
        config: GatewayConfig,
        custom: Arc<dyn ProfileLookup>,
        global: Option<Arc<dyn ProfileLookup>>,
        texture_http: reqwest::Client,
    ) -> Result<Self, GatewayError> {
        let api_root = config.upstream.api_root_url()?;
        let metrics = Arc::new(GatewayMetrics::new());
        let merger: Arc<dyn ProfileLookup> = Arc::new(NamespaceMerger::new(custom.clone(), global));

        let filters = build_chain(
            &config,
            FilterContext {
                lookup: merger,
                custom,
                http: texture_http,
                metrics: metrics.clone(),
            },
        );
        let proxy = ReverseProxy::new(ReverseProxy::build_client(config.upstream.connect_timeout())?);
        let service = GatewayService::new(
            FilterChain::new(filters),
            Arc::new(ApiRootRedirector::new(api_root)),
            proxy,
            metrics.clone(),
        );

        Ok(Self {
            config,
            service: Arc::new(service),
            metrics,
            running: ArcSwapOption::empty(),
            start_lock: Mutex::new(()),
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
        })
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn service(&self) -> &Arc<GatewayService> {
        &self.service
    }

    /// Bound address, if the gateway has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.load().as_ref().map(|r| r.local_addr)
    }

    /// Start the gateway unless it is already running.
    pub async fn ensure_started(&self) -> Result<SocketAddr, ListenerError> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }
        let _guard = self.start_lock.lock().await;
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listener = Listener::bind(&self.config.listener).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let session_config = SessionConfig {
            read_timeout: self.config.listener.read_timeout(),
            max_header_bytes: self.config.listener.max_header_bytes,
        };
        tokio::spawn(accept_loop(
            listener,
            self.service.clone(),
            session_config,
            self.shutdown.subscribe(),
            self.tracker.clone(),
            self.metrics.clone(),
        ));

        self.running.store(Some(Arc::new(Running { local_addr })));
        tracing::info!(address = %local_addr, "Gateway started");
        Ok(local_addr)
    }

    /// Rewrite an outbound URL to go through the gateway, starting it if
    /// needed. URLs the gateway has no interest in give `None`.
    pub async fn transform_url(&self, url: &str) -> Result<Option<String>, ListenerError> {
        let Ok(parsed) = url::Url::parse(url) else {
            return Ok(None);
        };
        let Some(host) = parsed.host_str() else {
            return Ok(None);
        };
        if !self.service.claims(&host.to_ascii_lowercase(), parsed.path()) {
            return Ok(None);
        }
        let Some(local) = local_path_for(&parsed) else {
            return Ok(None);
        };
        let addr = self.ensure_started().await?;
        Ok(Some(format!("http://{addr}{local}")))
    }

    /// Stop accepting connections. Open connections finish their exchange.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        self.running.store(None);
    }

    /// Wait for open connections to close.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.tracker.wait_idle(timeout).await
    }
}

async fn accept_loop(
    listener: Listener,
    service: Arc<GatewayService>,
    session_config: SessionConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
    tracker: ConnectionTracker,
    metrics: Arc<GatewayMetrics>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer, permit) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let service = service.clone();
        let guard = tracker.track();
        metrics.record_connection();
        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            let _ = stream.set_nodelay(true);
            tracing::trace!(connection_id = %connection_id, peer = %peer, "Connection opened");

            let session = HttpSession::new(stream, Some(peer), session_config);
            match session.run(service.as_ref()).await {
                Ok(served) => tracing::trace!(connection_id = %connection_id, served, "Session finished"),
                Err(e) => tracing::debug!(connection_id = %connection_id, error = %e, "Session aborted"),
            }
            drop(guard);
        });
    }
    tracing::info!("Gateway stopped accepting connections");
}
