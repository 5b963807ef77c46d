use axum::{extract::State, response::Json, routing::get, Router};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use kolboard::{pipeline, types::*, AppState};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["KOLBOARD_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting kolboard");

    // Create HTTP client
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(connect_timeout))
        .build()?;

    let config = kolboard::core::config::load_board_config();
    info!("Target leaderboard: {}", config.resolve_leaderboard_url());
    match config.resolve_webhook_url() {
        Some(url) => info!("Webhook dispatch enabled → {}", url),
        None => info!("No webhook configured — dispatch disabled"),
    }
    if !kolboard::browser_manager::native_browser_available() {
        warn!(
            "No Chromium-family browser found — social links will stay at their placeholder. \
             Install Brave/Chrome/Chromium or set CHROME_EXECUTABLE."
        );
    }

    let state = Arc::new(AppState::new(http_client, config));

    // Periodic trigger; the on-demand /scrape route shares its pass lock.
    let _scheduler = pipeline::scheduler::start(state.clone());

    // Build router
    let app = Router::new()
        .route("/", get(home))
        .route("/leaderboard", get(get_leaderboard))
        .route("/scrape", get(trigger_scrape))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let port: u16 = parse_port_from_args().or_else(port_from_env).unwrap_or(10000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/KOLBOARD_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("kolboard listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "kolboard",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Leaderboard scraping service. GET /leaderboard for the current dataset, GET /scrape to run a pass now."
    }))
}

/// Last computed dataset — whatever the most recent successful pass left
/// behind, possibly empty at cold start.
async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<DatasetSnapshot> {
    Json(state.current().as_ref().clone())
}

/// Run a pass synchronously and return the resulting dataset. If a pass is
/// already in flight this waits for it, then runs its own — the browser is
/// never driven by two passes at once.
async fn trigger_scrape(State(state): State<Arc<AppState>>) -> Json<TriggerResponse> {
    let outcome = pipeline::run_pass(&state).await;
    let snapshot = state.current();
    let message = match outcome {
        PassOutcome::Completed { entries } => {
            format!("Scrape completed: {} entries", entries)
        }
        PassOutcome::NoData => {
            "Scrape yielded no data; previous dataset retained".to_string()
        }
    };
    Json(TriggerResponse {
        message,
        data: snapshot.data.clone(),
        scraped_at: snapshot.scraped_at.clone(),
    })
}
