use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use maintrack::config::AppConfig;
use maintrack::error::AppError;
use maintrack::reports::import::ReportSnapshot;
use maintrack::reports::{
    report_router, LocalPhotoStore, LogNotifier, MemoryReportStore, ReportId, ReportService,
};
use maintrack::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "maintrack",
    about = "Track facility damage reports from intake through repair and rating",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the aggregators over an exported supporter-entry snapshot
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// CSV export of supporter entries (one row per supporter)
    #[arg(long)]
    snapshot: PathBuf,
    /// Show at most this many trending reports
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Also print the satisfaction summary for this completed report id
    #[arg(long)]
    completed_report: Option<u64>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Report(args) => run_snapshot_report(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(config.environment, &config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let service = Arc::new(ReportService::new(
        Arc::new(MemoryReportStore::new()),
        Arc::new(LocalPhotoStore::new(config.uploads.dir.clone())),
        Arc::new(LogNotifier),
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(report_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "facility report service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_snapshot_report(args: ReportArgs) -> Result<(), AppError> {
    let snapshot = ReportSnapshot::from_path(&args.snapshot)?;

    if snapshot.is_empty() {
        println!("Snapshot contains no supporter entries");
        return Ok(());
    }

    let descriptions = snapshot.descriptions();
    let board = snapshot.trending();

    println!("Trending damage reports");
    if board.is_empty() {
        println!("- none (every report in the snapshot is cancelled)");
    }
    for entry in board.iter().take(args.top) {
        let description = descriptions
            .get(&entry.report)
            .copied()
            .unwrap_or("(no description)");
        println!(
            "- #{} {} | score {}, {} supporters",
            entry.report, description, entry.score, entry.supporter_count
        );
    }

    if let Some(id) = args.completed_report {
        let report = ReportId(id);
        match snapshot.rating_summary(report) {
            Some(summary) => {
                println!("\nSatisfaction for report #{id}");
                println!(
                    "- score {:.2} ({} of {} supporters rated)",
                    summary.score, summary.rating_count, summary.supporter_count
                );
                if summary.feedback.is_empty() {
                    println!("- feedback: none");
                } else {
                    println!("- feedback");
                    for line in &summary.feedback {
                        println!("  - {line}");
                    }
                }
            }
            None => println!("\nReport #{id} is not present in the snapshot"),
        }
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
