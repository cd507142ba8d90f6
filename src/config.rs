//! Checker configuration.

use std::time::Duration;

use hickory_proto::rr::RecordType;

use crate::resolver::Resolver;
use crate::transport::Protocol;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONCURRENCY: usize = 100;
/// Recommended EDNS0 payload size; avoids IP fragmentation on most paths.
pub const DEFAULT_EDNS_PAYLOAD_SIZE: u16 = 1232;

/// Keyword carried by the block page the default resolvers redirect to.
pub const DEFAULT_KEYWORD: &str = "internetpositif";

/// Filtering resolvers checked when nothing else is configured.
pub fn default_resolvers() -> Vec<Resolver> {
    ["180.131.144.144", "180.131.145.145"]
        .into_iter()
        .map(|address| Resolver::new(address, DEFAULT_KEYWORD, RecordType::A))
        .collect()
}

/// Knobs for a [`Checker`](crate::Checker).
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline for a single DNS exchange.
    pub timeout: Duration,
    /// Extra attempts per resolver after the first.
    pub max_retries: usize,
    /// How long the built-in cache keeps an outcome.
    pub cache_ttl: Duration,
    /// Maximum number of checks or health probes in flight.
    pub concurrency: usize,
    /// UDP payload size advertised through EDNS0.
    pub edns_payload_size: u16,
    /// Wire protocol for the stock transport.
    pub protocol: Protocol,
    /// Resolvers in failover order.
    pub resolvers: Vec<Resolver>,
}

impl Config {
    /// Replace values that cannot work with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        if self.edns_payload_size == 0 {
            self.edns_payload_size = DEFAULT_EDNS_PAYLOAD_SIZE;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            cache_ttl: DEFAULT_CACHE_TTL,
            concurrency: DEFAULT_CONCURRENCY,
            edns_payload_size: DEFAULT_EDNS_PAYLOAD_SIZE,
            protocol: Protocol::Udp,
            resolvers: default_resolvers(),
        }
    }
}
