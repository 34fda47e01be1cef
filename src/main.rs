use std::process::ExitCode;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info, warn};

use fs_latency_exporter::config::{Args, Config};
use fs_latency_exporter::metrics::{report, MetricsRegistry};
use fs_latency_exporter::probe::{DirectReader, LatencyProbe, ProbeControl};
use fs_latency_exporter::{logging, server, AppState, TargetInfo};

/// How long shutdown waits for an in-flight read before exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), BoxError> {
    // ── 1. Resolve configuration ─────────────────────────────────
    let config = Config::from(args);
    info!("fs-latency-exporter {} starting", env!("CARGO_PKG_VERSION"));

    // ── 2. Open the target file ──────────────────────────────────
    let reader = DirectReader::open(&config.path, config.block_size, config.prefer_direct)?;
    info!(
        "Opened {:?}, size {}, {} I/O",
        reader.path(),
        reader.file_len(),
        reader.mode()
    );

    // ── 3. Build shared state ────────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new());
    let control = ProbeControl::new();
    let state = Arc::new(AppState {
        metrics: Arc::clone(&metrics),
        probe: control.clone(),
        target: TargetInfo::of(&reader),
    });

    // ── 4. Bind before sampling starts ───────────────────────────
    let listener = server::bind(&config.listen_addr).await?;

    // ── 5. Start the probe and the summary report ────────────────
    let probe = LatencyProbe::new(reader, Arc::clone(&metrics)).with_pacing(config.interval);
    let probe_thread = probe.spawn(control.clone())?;

    let report_task = config
        .report_interval
        .map(|every| tokio::spawn(report::run(Arc::clone(&metrics), every)));

    // ── 6. Serve until a shutdown signal ─────────────────────────
    let served = server::serve(listener, state, shutdown_signal()).await;

    // ── 7. Tear down ─────────────────────────────────────────────
    control.stop();
    if let Some(task) = report_task {
        task.abort();
    }
    wait_for_probe(probe_thread).await;

    served?;
    info!("Shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal");
}

/// Gives the in-flight read up to `SHUTDOWN_GRACE` to finish. A read that
/// hangs longer is abandoned with the process.
async fn wait_for_probe(handle: JoinHandle<u64>) {
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while !handle.is_finished() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    if !handle.is_finished() {
        warn!(
            "Probe still blocked in a read after {:?}, exiting anyway",
            SHUTDOWN_GRACE
        );
        return;
    }

    match handle.join() {
        Ok(iterations) => debug!("Probe thread joined after {} iterations", iterations),
        Err(_) => error!("Probe thread panicked"),
    }
}
