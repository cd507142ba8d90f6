//! Single DNS exchanges against one resolver, with deadline and
//! cancellation, plus the resolver health probe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dns::{build_query, with_default_port};
use crate::error::{Error, Result};
use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::transport::Exchange;

/// Name resolved to decide whether a resolver is reachable.
pub const HEALTH_PROBE_DOMAIN: &str = "google.com";

/// Liveness of one resolver.
#[derive(Debug, Clone)]
pub struct HealthOutcome {
    pub resolver: String,
    pub online: bool,
    /// Round trip in milliseconds; zero unless `online`.
    pub latency_ms: u64,
    pub error: Option<Error>,
}

impl HealthOutcome {
    pub(crate) fn failed(resolver: impl Into<String>, error: Error) -> Self {
        Self {
            resolver: resolver.into(),
            online: false,
            latency_ms: 0,
            error: Some(error),
        }
    }
}

/// Runs exchanges through a transport under the per-query timeout.
#[derive(Debug, Clone)]
pub struct Prober {
    transport: Arc<dyn Exchange>,
    timeout: Duration,
    edns_payload_size: u16,
    stats: Arc<Stats>,
}

impl Prober {
    pub fn new(
        transport: Arc<dyn Exchange>,
        timeout: Duration,
        edns_payload_size: u16,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            transport,
            timeout,
            edns_payload_size,
            stats,
        }
    }

    /// Query `resolver` for `domain` using the resolver's record type.
    ///
    /// The timeout surfaces as [`Error::Timeout`]; cancellation surfaces as
    /// [`Error::Cancelled`] and is never reported as a timeout.
    pub async fn probe(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        resolver: &Resolver,
    ) -> Result<Message> {
        let request = build_query(domain, resolver.record_type, self.edns_payload_size)?;
        let server = with_default_port(&resolver.address);
        self.exchange(cancel, &request, &server).await
    }

    /// Resolve [`HEALTH_PROBE_DOMAIN`] once and time it.
    pub async fn probe_health(
        &self,
        cancel: &CancellationToken,
        resolver: &Resolver,
    ) -> HealthOutcome {
        let server = with_default_port(&resolver.address);
        let start = Instant::now();

        let response = match build_query(HEALTH_PROBE_DOMAIN, RecordType::A, self.edns_payload_size)
        {
            Ok(request) => self.exchange(cancel, &request, &server).await,
            Err(err) => Err(err),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) if response.response_code() == ResponseCode::NoError => HealthOutcome {
                resolver: resolver.address.clone(),
                online: true,
                latency_ms,
                error: None,
            },
            Ok(response) => HealthOutcome::failed(
                &resolver.address,
                Error::UnexpectedResponse {
                    server,
                    rcode: u16::from(response.response_code()),
                },
            ),
            Err(err) => HealthOutcome::failed(&resolver.address, err),
        }
    }

    async fn exchange(
        &self,
        cancel: &CancellationToken,
        request: &Message,
        server: &str,
    ) -> Result<Message> {
        let guard = self.stats.probe_started();
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(self.timeout, self.transport.exchange(request, server)) => result,
        };

        match result {
            Ok(Ok(response)) => {
                let elapsed = start.elapsed();
                guard.finish(elapsed);
                debug!(
                    server,
                    id = response.id(),
                    answers = response.answers().len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "DNS exchange completed"
                );
                Ok(response)
            }
            Ok(Err(err)) => Err(Error::transport(server, err)),
            Err(_) => Err(Error::Timeout {
                server: server.to_string(),
            }),
        }
    }
}
