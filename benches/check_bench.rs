//! End-to-end benchmarks for batch checks against a local resolver.
//!
//! The mock resolver adds ~15ms ±5ms of latency per query, in line with
//! public resolvers, and answers a block page CNAME for names containing
//! "blocked".

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::{A, CNAME};
use hickory_proto::rr::{Name, RData, Record};
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use nawala::{Checker, Config, Resolver};

const UPSTREAM_ADDR: &str = "127.0.0.1:15360";
const BLOCK_PAGE: &str = "internetpositif.id.";

const BASE_LATENCY_MS: u64 = 15;
const JITTER_MS: u64 = 5;

async fn simulate_upstream_latency() {
    let jitter = rand::rng().random_range(0..=JITTER_MS * 2);
    let latency = BASE_LATENCY_MS - JITTER_MS + jitter;
    tokio::time::sleep(Duration::from_millis(latency)).await;
}

fn answer(request: &Message) -> Option<Vec<u8>> {
    let name = request.queries().first()?.name().clone();

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_recursion_available(true);
    response.add_queries(request.queries().iter().cloned());

    let rdata = if name.to_ascii().contains("blocked") {
        RData::CNAME(CNAME(Name::from_ascii(BLOCK_PAGE).ok()?))
    } else {
        RData::A(A::from(Ipv4Addr::new(93, 184, 216, 34)))
    };
    response.add_answer(Record::from_rdata(name, 60, rdata));
    response.to_vec().ok()
}

async fn mock_udp_upstream(socket: Arc<UdpSocket>) {
    let mut buf = [0u8; 4096];
    loop {
        let Ok((len, src)) = socket.recv_from(&mut buf).await else {
            continue;
        };
        let Ok(request) = Message::from_vec(&buf[..len]) else {
            continue;
        };

        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            simulate_upstream_latency().await;
            if let Some(response) = answer(&request) {
                let _ = socket.send_to(&response, src).await;
            }
        });
    }
}

fn start_mock_upstream() {
    let upstream_addr: SocketAddr = UPSTREAM_ADDR.parse().unwrap();

    std::thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let socket = UdpSocket::bind(upstream_addr).await.unwrap();
            mock_udp_upstream(Arc::new(socket)).await;
        });
    });

    std::thread::sleep(Duration::from_millis(50));
}

fn checker(concurrency: usize) -> Checker {
    let config = Config {
        concurrency,
        max_retries: 0,
        timeout: Duration::from_secs(2),
        resolvers: vec![Resolver::new(
            UPSTREAM_ADDR,
            "internetpositif",
            hickory_proto::rr::RecordType::A,
        )],
        ..Config::default()
    };
    Checker::builder(config).without_cache().build()
}

fn domains(count: usize) -> Vec<String> {
    (0..count)
        .map(|n| {
            if n % 4 == 0 {
                format!("blocked{n}.example.com")
            } else {
                format!("site{n}.example.com")
            }
        })
        .collect()
}

fn bench_check_many(c: &mut Criterion) {
    start_mock_upstream();
    let rt = Runtime::new().unwrap();
    let batch = domains(200);

    let mut group = c.benchmark_group("check_many");
    group.throughput(Throughput::Elements(batch.len() as u64));
    group.sample_size(20);

    for concurrency in [10, 50, 200] {
        let checker = checker(concurrency);
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    let cancel = CancellationToken::new();
                    checker.check_many(&cancel, batch.clone()).await.unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_cached_check(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = Config {
        resolvers: vec![Resolver::new(
            UPSTREAM_ADDR,
            "internetpositif",
            hickory_proto::rr::RecordType::A,
        )],
        ..Config::default()
    };
    let checker = Checker::new(config);
    let cancel = CancellationToken::new();
    rt.block_on(checker.check_one(&cancel, "blocked.example.com"))
        .unwrap();

    c.bench_function("check_one_cached", |b| {
        b.to_async(&rt)
            .iter(|| async { checker.check_one(&cancel, "blocked.example.com").await.unwrap() })
    });
}

criterion_group!(benches, bench_check_many, bench_cached_check);
criterion_main!(benches);
