mod handlers;
mod state;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use lustre_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use lustre_core::collector::mock::MockFs;
use lustre_core::collector::{ScrapeCoordinator, Source, build_sources};
use lustre_core::collector::cache::DEFAULT_READER_THREADS;
use lustre_core::config::{CollectorConfig, SchedulerConfig};
use lustre_core::exposition::Exposition;

use state::{SharedState, WebAppInner};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "lustre_exporter", about = "Prometheus exporter for Lustre metrics", version)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9169", env = "LUSTRE_EXPORTER_LISTEN")]
    listen: String,

    /// Path under which to expose metrics.
    #[arg(long, default_value = "/metrics", env = "LUSTRE_EXPORTER_TELEMETRY_PATH")]
    telemetry_path: String,

    /// Path to the proc filesystem.
    #[arg(long, default_value = "/proc", env = "LUSTRE_EXPORTER_PROC_PATH")]
    proc_path: String,

    /// Path to the sys filesystem.
    #[arg(long, default_value = "/sys", env = "LUSTRE_EXPORTER_SYS_PATH")]
    sys_path: String,

    /// Detail level override, e.g. `--collector ost=core`. Levels are
    /// disabled, core and extended. Repeatable.
    #[arg(long = "collector", value_name = "NAME=LEVEL")]
    collectors: Vec<String>,

    /// Maximum number of collection rounds running at once.
    #[arg(long, default_value = "4", env = "LUSTRE_EXPORTER_MAX_ROUNDS")]
    max_rounds: usize,

    /// A round that completed less than this many milliseconds ago is
    /// served without collecting again.
    #[arg(long, default_value = "1000", env = "LUSTRE_EXPORTER_FRESHNESS_MS")]
    freshness_ms: u64,

    /// Fail a source that has not finished after this many seconds.
    #[arg(long, env = "LUSTRE_EXPORTER_SOURCE_TIMEOUT")]
    source_timeout: Option<u64>,

    /// Background reader threads per source.
    #[arg(long, default_value_t = DEFAULT_READER_THREADS)]
    reader_threads: usize,

    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only).
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes tracing. Default level is INFO; -q logs errors only.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["lustre_exporter", "lustre_core"] {
        match format!("{target}={level}").parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {target}: {e}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let mut collectors = CollectorConfig::new(&args.proc_path, &args.sys_path);
    for raw in &args.collectors {
        if let Err(e) = collectors.apply_override(raw) {
            error!(value = %raw, error = %e, "invalid --collector value");
            process::exit(1);
        }
    }

    let scheduler = SchedulerConfig {
        max_rounds: args.max_rounds.max(1),
        freshness: Duration::from_millis(args.freshness_ms),
        source_timeout: args.source_timeout.map(Duration::from_secs),
        reader_threads: args.reader_threads.max(1),
    };

    let sources = create_sources(&collectors, scheduler.reader_threads);
    if sources.is_empty() {
        warn!("no Lustre sources found, only exporter metrics will be served");
    }
    for (component, level) in collectors.levels() {
        info!(component = component.as_str(), level = %level, "collector level");
    }

    let exposition = match Exposition::new() {
        Ok(exposition) => exposition,
        Err(e) => {
            error!(error = %e, "failed to register exporter metrics");
            process::exit(1);
        }
    };

    let state: SharedState = Arc::new(WebAppInner {
        coordinator: ScrapeCoordinator::new(sources, scheduler),
        exposition,
        collectors,
        telemetry_path: args.telemetry_path.clone(),
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args, state));
}

async fn async_main(args: Args, state: SharedState) {
    let app = Router::new()
        .route(&args.telemetry_path, get(handlers::handle_metrics))
        .route("/", get(handlers::handle_landing))
        .route("/api/v1/health", get(handlers::handle_health))
        .route("/api/v1/status", get(handlers::handle_status))
        .with_state(state)
        .layer(CompressionLayer::new());

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    info!(version = env!("CARGO_PKG_VERSION"), %addr, path = %args.telemetry_path, "listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        process::exit(1);
    }
}

fn create_sources(config: &CollectorConfig, reader_threads: usize) -> Vec<Arc<dyn Source>> {
    #[cfg(target_os = "linux")]
    {
        build_sources(Arc::new(RealFs::new()), config, reader_threads)
    }
    #[cfg(not(target_os = "linux"))]
    {
        warn!("not running on Linux, serving a mock Lustre server");
        build_sources(Arc::new(MockFs::lustre_server()), config, reader_threads)
    }
}
