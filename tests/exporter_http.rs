use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fs_latency_exporter::metrics::MetricsRegistry;
use fs_latency_exporter::probe::{IoMode, ProbeControl};
use fs_latency_exporter::{server, AppState, FailureKind, TargetInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct Response {
    status: u16,
    head: String,
    body: String,
}

async fn get(addr: std::net::SocketAddr, path: &str) -> Response {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status: u16 = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();

    Response {
        status,
        head: head.to_ascii_lowercase(),
        body: body.to_string(),
    }
}

struct Harness {
    addr: std::net::SocketAddr,
    metrics: Arc<MetricsRegistry>,
    stop: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Harness {
    async fn start() -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let state = Arc::new(AppState {
            metrics: Arc::clone(&metrics),
            probe: ProbeControl::new(),
            target: TargetInfo {
                path: PathBuf::from("/data/probe.img"),
                len: 1 << 30,
                block_size: 4096,
                mode: IoMode::Direct,
            },
        });

        let listener = server::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let server = tokio::spawn(server::serve(listener, state, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            metrics,
            stop: Some(tx),
            server,
        }
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn scrape_returns_exposition_text() {
    let h = Harness::start().await;
    h.metrics.record_success(Duration::from_micros(300));
    h.metrics.record_error(FailureKind::Read);

    let resp = get(h.addr, "/metrics").await;
    assert_eq!(resp.status, 200);
    assert!(resp.head.contains("content-type: text/plain; version=0.0.4"));
    assert!(resp.head.contains("server-timing: total;dur="));
    assert!(resp.body.contains("# TYPE errors_total counter\n"));
    assert!(resp.body.contains("errors_total 1\n"));
    assert!(resp.body.contains("# TYPE read_time_seconds histogram\n"));
    assert!(resp.body.contains("read_time_seconds_bucket{le=\"0.00025\"} 0\n"));
    assert!(resp.body.contains("read_time_seconds_bucket{le=\"0.0005\"} 1\n"));
    assert!(resp.body.contains("read_time_seconds_count 1\n"));

    h.shutdown().await;
}

#[tokio::test]
async fn back_to_back_scrapes_are_identical_and_never_reset() {
    let h = Harness::start().await;
    h.metrics.record_success(Duration::from_millis(3));

    let first = get(h.addr, "/metrics").await.body;
    let second = get(h.addr, "/metrics").await.body;
    assert_eq!(first, second);

    h.metrics.record_error(FailureKind::Seek);
    let third = get(h.addr, "/metrics").await.body;
    assert!(third.contains("errors_total 1\n"));
    assert!(third.contains("read_time_seconds_count 1\n"));

    h.shutdown().await;
}

#[tokio::test]
async fn concurrent_scrapes_while_recording() {
    let h = Harness::start().await;

    let metrics = Arc::clone(&h.metrics);
    let writer = std::thread::spawn(move || {
        for i in 0..20_000u64 {
            if i % 10 == 0 {
                metrics.record_error(FailureKind::Read);
            } else {
                metrics.record_success(Duration::from_micros(i % 900 + 1));
            }
        }
    });

    let scrapes: Vec<_> = (0..16)
        .map(|_| {
            let addr = h.addr;
            tokio::spawn(async move { get(addr, "/metrics").await })
        })
        .collect();
    for s in scrapes {
        assert_eq!(s.await.unwrap().status, 200);
    }
    writer.join().unwrap();

    let body = get(h.addr, "/metrics").await.body;
    assert!(body.contains("errors_total 2000\n"));
    assert!(body.contains("read_time_seconds_count 18000\n"));

    h.shutdown().await;
}

#[tokio::test]
async fn landing_page_and_unknown_paths() {
    let h = Harness::start().await;

    let index = get(h.addr, "/").await;
    assert_eq!(index.status, 200);
    assert!(index.body.contains("/data/probe.img"));
    assert!(index.body.contains("262144 blocks of 4096 bytes"));
    assert!(index.body.contains("io mode:    direct"));
    assert!(index.body.contains("probe:      sampling"));
    assert!(index.body.contains("/metrics"));

    let missing = get(h.addr, "/nope").await;
    assert_eq!(missing.status, 404);

    h.shutdown().await;
}

#[tokio::test]
async fn bind_failure_is_a_config_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let err = server::bind(&addr).await.unwrap_err();
    assert!(matches!(
        err,
        fs_latency_exporter::ConfigError::Bind { .. }
    ));
}
