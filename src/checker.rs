//! The censorship checker: per-domain failover across resolvers, the retry
//! policy for a single resolver, and the batch entry points.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{Cache, MemoryCache, NoCache, cache_key};
use crate::config::Config;
use crate::dispatch::dispatch;
use crate::dns::contains_keyword;
use crate::domain::{is_valid_domain, normalize};
use crate::error::{Error, Result};
use crate::probe::{HealthOutcome, Prober};
use crate::resolver::{Resolver, ResolverRegistry};
use crate::stats::Stats;
use crate::transport::Exchange;

/// Upper bound on the wait between failed attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Result of checking one domain.
///
/// When `error` is set, `blocked` carries no information.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub domain: String,
    pub blocked: bool,
    /// Address of the resolver that produced the verdict.
    pub resolver: String,
    pub error: Option<Error>,
}

impl CheckOutcome {
    fn verdict(domain: &str, resolver: &Resolver, blocked: bool) -> Self {
        Self {
            domain: domain.to_string(),
            blocked,
            resolver: resolver.address.clone(),
            error: None,
        }
    }

    pub(crate) fn failed(domain: impl Into<String>, error: Error) -> Self {
        Self {
            domain: domain.into(),
            blocked: false,
            resolver: String::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Checks domains against filtering resolvers.
///
/// Cheap to clone; clones share the resolver registry, cache and counters.
#[derive(Debug, Clone)]
pub struct Checker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    registry: ResolverRegistry,
    cache: Arc<dyn Cache>,
    prober: Prober,
    stats: Arc<Stats>,
    max_retries: usize,
    concurrency: usize,
}

/// Builder for a [`Checker`] with a custom cache or transport.
#[derive(Debug)]
pub struct CheckerBuilder {
    config: Config,
    cache: Option<Arc<dyn Cache>>,
    transport: Option<Arc<dyn Exchange>>,
}

impl CheckerBuilder {
    /// Store outcomes in `cache` instead of a private [`MemoryCache`].
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(self) -> Self {
        self.cache(Arc::new(NoCache))
    }

    /// Send queries through `transport` instead of the protocol's default.
    pub fn transport(mut self, transport: Arc<dyn Exchange>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Checker {
        let config = self.config.normalized();
        let stats = Arc::new(Stats::new());
        let transport = self
            .transport
            .unwrap_or_else(|| config.protocol.transport());
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new(config.cache_ttl)));

        Checker {
            inner: Arc::new(Inner {
                registry: ResolverRegistry::new(config.resolvers),
                cache,
                prober: Prober::new(
                    transport,
                    config.timeout,
                    config.edns_payload_size,
                    Arc::clone(&stats),
                ),
                stats,
                max_retries: config.max_retries,
                concurrency: config.concurrency,
            }),
        }
    }
}

impl Checker {
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> CheckerBuilder {
        CheckerBuilder {
            config,
            cache: None,
            transport: None,
        }
    }

    /// Check every domain, at most `concurrency` at a time.
    ///
    /// Outcomes come back in input order. Per-domain problems, including
    /// cancellation, are reported in that domain's outcome; the call itself
    /// fails only when no resolver is configured.
    pub async fn check_many<I, S>(
        &self,
        cancel: &CancellationToken,
        domains: I,
    ) -> Result<Vec<CheckOutcome>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.inner.registry.is_empty() {
            return Err(Error::NoResolversConfigured);
        }
        let domains: Vec<String> = domains.into_iter().map(Into::into).collect();

        let checker = self.clone();
        let token = cancel.clone();
        let outcomes = dispatch(
            domains,
            self.inner.concurrency,
            cancel,
            move |domain| {
                let checker = checker.clone();
                let token = token.clone();
                async move { checker.check_domain(&token, &domain).await }
            },
            |domain, err| CheckOutcome::failed(domain, err),
        )
        .await;

        Ok(outcomes)
    }

    /// Check a single domain.
    pub async fn check_one(&self, cancel: &CancellationToken, domain: &str) -> Result<CheckOutcome> {
        if self.inner.registry.is_empty() {
            return Err(Error::NoResolversConfigured);
        }
        Ok(self.check_domain(cancel, domain).await)
    }

    /// Probe every configured resolver once, in registry order.
    pub async fn probe_health(&self, cancel: &CancellationToken) -> Result<Vec<HealthOutcome>> {
        let resolvers = self.inner.registry.snapshot();
        if resolvers.is_empty() {
            return Err(Error::NoResolversConfigured);
        }

        let checker = self.clone();
        let token = cancel.clone();
        let outcomes = dispatch(
            resolvers.to_vec(),
            self.inner.concurrency,
            cancel,
            move |resolver| {
                let checker = checker.clone();
                let token = token.clone();
                async move { checker.inner.prober.probe_health(&token, &resolver).await }
            },
            |resolver, err| HealthOutcome::failed(resolver.address, err),
        )
        .await;

        Ok(outcomes)
    }

    /// Replace resolvers by address or append new ones. Checks already
    /// running keep the list they started with.
    pub fn upsert_resolvers(&self, resolvers: impl IntoIterator<Item = Resolver>) {
        self.inner.registry.upsert(resolvers);
    }

    pub fn delete_resolvers<S: AsRef<str>>(&self, addresses: impl IntoIterator<Item = S>) {
        self.inner.registry.delete(addresses);
    }

    /// Copy of the current resolver list.
    pub fn resolvers(&self) -> Vec<Resolver> {
        self.inner.registry.snapshot().to_vec()
    }

    pub fn flush_cache(&self) {
        self.inner.cache.flush();
    }

    pub fn stats(&self) -> &Stats {
        &self.inner.stats
    }

    /// Normalize, validate, then walk the resolvers in order until one of
    /// them yields a verdict.
    async fn check_domain(&self, cancel: &CancellationToken, raw: &str) -> CheckOutcome {
        let domain = normalize(raw);
        if !is_valid_domain(&domain) {
            self.inner.stats.record_check(false, true);
            return CheckOutcome::failed(domain.clone(), Error::InvalidInput(domain));
        }

        let resolvers = self.inner.registry.snapshot();
        for resolver in resolvers.iter() {
            let key = cache_key(&domain, resolver);
            if let Some(hit) = self.inner.cache.get(&key) {
                debug!(domain = %domain, server = %resolver.address, "cache hit");
                self.inner.stats.record_cached();
                return hit;
            }

            match self.probe_with_retries(cancel, &domain, resolver).await {
                Ok(outcome) => {
                    self.inner.cache.set(&key, outcome.clone());
                    self.inner.stats.record_check(outcome.blocked, false);
                    return outcome;
                }
                Err(err) if !err.is_retryable() => {
                    self.inner.stats.record_check(false, true);
                    return CheckOutcome::failed(domain, err);
                }
                Err(err) => {
                    warn!(
                        domain = %domain,
                        server = %resolver.address,
                        error = %err,
                        "resolver exhausted retries, failing over"
                    );
                }
            }
        }

        self.inner.stats.record_check(false, true);
        CheckOutcome::failed(domain, Error::AllResolversFailed)
    }

    /// Up to `max_retries + 1` probes against one resolver.
    ///
    /// A blocked response ends the sequence at once. A clear response is
    /// kept while the remaining attempts run, since filters do not answer
    /// consistently. Only an attempt that follows a failure waits out a
    /// backoff.
    async fn probe_with_retries(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        resolver: &Resolver,
    ) -> Result<CheckOutcome> {
        let mut clear = None;
        let mut last_err = None;

        for attempt in 0..=self.inner.max_retries {
            if attempt > 0 && last_err.is_some() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(backoff_delay(attempt)) => {}
                }
            }

            match self.inner.prober.probe(cancel, domain, resolver).await {
                Ok(response) => {
                    last_err = None;
                    if contains_keyword(&response, &resolver.keyword) {
                        debug!(domain, server = %resolver.address, attempt, "blocking signal found");
                        return Ok(CheckOutcome::verdict(domain, resolver, true));
                    }
                    debug!(domain, server = %resolver.address, attempt, "clear response");
                    if clear.is_none() {
                        clear = Some(CheckOutcome::verdict(domain, resolver, false));
                    }
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    debug!(domain, server = %resolver.address, attempt, error = %err, "probe failed");
                    last_err = Some(err);
                }
            }
        }

        match (clear, last_err) {
            (Some(outcome), _) => Ok(outcome),
            (None, Some(err)) => Err(err),
            (None, None) => Err(Error::AllResolversFailed),
        }
    }
}

/// Wait before `attempt` (1-based retry number): 1s, 2s, 4s, ... capped.
fn backoff_delay(attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63) as u32;
    Duration::from_secs(1u64 << exponent).min(MAX_BACKOFF)
}
