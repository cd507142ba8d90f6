use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nawala::{Checker, Config, Protocol, Resolver};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nawala")]
#[command(about = "Check domains for DNS-based censorship", long_about = None)]
struct Args {
    /// Per-query timeout in seconds
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    /// Extra attempts per resolver after the first
    #[arg(short, long, default_value = "2")]
    retries: usize,

    /// Maximum checks in flight
    #[arg(short, long, default_value = "100")]
    concurrency: usize,

    /// Cache TTL in seconds
    #[arg(long, default_value = "300")]
    cache_ttl: u64,

    /// EDNS0 UDP payload size to advertise
    #[arg(long, default_value = "1232")]
    edns_size: u16,

    /// Query resolvers over TCP instead of UDP
    #[arg(long)]
    tcp: bool,

    /// Resolver as ADDR[,KEYWORD[,TYPE]]; repeat for failover order
    #[arg(long = "resolver", value_name = "ADDR[,KEYWORD[,TYPE]]")]
    resolvers: Vec<Resolver>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether domains are blocked
    Check {
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Report whether each resolver is reachable
    Status,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.retries,
            cache_ttl: Duration::from_secs(self.cache_ttl),
            concurrency: self.concurrency,
            edns_payload_size: self.edns_size,
            protocol: if self.tcp { Protocol::Tcp } else { Protocol::Udp },
            ..Config::default()
        };
        if !self.resolvers.is_empty() {
            config.resolvers = self.resolvers.clone();
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Cancel the batch on Ctrl-C; work already admitted still reports back.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling outstanding checks");
            token.cancel();
        }
    });
    cancel
}

async fn run(args: Args) -> nawala::Result<bool> {
    let checker = Checker::new(args.config());
    let cancel = cancel_on_interrupt();

    for resolver in checker.resolvers() {
        info!(resolver = %resolver, "using resolver");
    }

    match args.command {
        Command::Check { domains } => {
            let outcomes = checker.check_many(&cancel, domains).await?;
            let mut all_ok = true;
            for outcome in &outcomes {
                match &outcome.error {
                    Some(err) => {
                        all_ok = false;
                        println!("{}\terror\t{}", outcome.domain, err);
                    }
                    None if outcome.blocked => {
                        println!("{}\tblocked\t{}", outcome.domain, outcome.resolver)
                    }
                    None => println!("{}\tclear\t{}", outcome.domain, outcome.resolver),
                }
            }

            let stats = checker.stats().snapshot_and_reset();
            info!(
                checks = stats.checks,
                blocked = stats.blocked,
                failed = stats.failed,
                probes = stats.probes,
                avg_probe_ms = stats.avg_probe_ms,
                "done"
            );
            Ok(all_ok)
        }
        Command::Status => {
            let statuses = checker.probe_health(&cancel).await?;
            let mut all_online = true;
            for status in &statuses {
                match &status.error {
                    None => println!("{}\tonline\t{}ms", status.resolver, status.latency_ms),
                    Some(err) => {
                        all_online = false;
                        println!("{}\toffline\t{}", status.resolver, err);
                    }
                }
            }
            Ok(all_online)
        }
    }
}

fn main() -> io::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match rt.block_on(run(args)) {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::from(1)),
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::from(2))
        }
    }
}
