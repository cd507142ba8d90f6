//! Nawala - check whether domains are blocked by DNS-based content filters.
//!
//! Queries are sent to filtering resolvers and each response is scanned for
//! the resolver's blocking keyword, typically the host of a block page the
//! filter redirects to, or the text of an Extended DNS Error.

pub mod cache;
pub mod checker;
pub mod config;
mod dispatch;
pub mod dns;
pub mod domain;
pub mod error;
pub mod probe;
pub mod resolver;
pub mod stats;
pub mod transport;

pub use cache::{Cache, MemoryCache, NoCache};
pub use checker::{CheckOutcome, Checker, CheckerBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use probe::HealthOutcome;
pub use resolver::Resolver;
pub use transport::{Exchange, Protocol};
