//! Error taxonomy for censorship checks.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while checking domains or probing resolvers.
///
/// Every variant is cheap to clone so an outcome can carry its error
/// through the cache and back out to callers.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The domain failed validation; nothing was sent on the wire.
    #[error("invalid domain name: {0}")]
    InvalidInput(String),

    /// The exchange did not complete within the per-query timeout.
    #[error("DNS query to {server} timed out")]
    Timeout { server: String },

    /// Any other network or protocol failure talking to a resolver.
    #[error("DNS exchange with {server} failed: {source}")]
    TransportFailure {
        server: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The resolver answered, but not with NOERROR.
    #[error("unexpected response code {rcode} from {server}")]
    UnexpectedResponse { server: String, rcode: u16 },

    /// Every configured resolver exhausted its retries.
    #[error("all resolvers failed to respond")]
    AllResolversFailed,

    /// The resolver registry was empty at call time.
    #[error("no resolvers configured")]
    NoResolversConfigured,

    /// A worker panicked; the panic was contained to its own item.
    #[error("internal fault: {0}")]
    InternalFault(String),

    /// The caller cancelled before this item completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap an I/O failure from a transport.
    ///
    /// Low-level timeouts are classified as [`Error::Timeout`] so callers see
    /// the same kind regardless of which layer noticed the deadline.
    pub fn transport(server: impl Into<String>, err: io::Error) -> Self {
        let server = server.into();
        match err.kind() {
            io::ErrorKind::TimedOut => Self::Timeout { server },
            _ => Self::TransportFailure {
                server,
                source: Arc::new(err),
            },
        }
    }

    /// Whether another attempt against the same resolver may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::TransportFailure { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert a failed worker join into the error reported for its slot.
    pub(crate) fn from_join(err: JoinError) -> Self {
        if err.is_cancelled() {
            return Self::Cancelled;
        }

        let payload = err.into_panic();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        };

        Self::InternalFault(message)
    }
}
