use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feudhall::{auth, judge, state::AppState, sweep, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feudhall=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Feudhall...");

    // Shared host secret
    let host_auth = auth::HostAuth::from_env();

    // Answer judge
    let judge_config = judge::JudgeConfig::from_env();
    let state = match judge_config.build_judge() {
        Ok(judge) => {
            tracing::info!("Answer judge initialized: {}", judge.name());
            AppState::new_with_judge(host_auth, Arc::from(judge))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize answer judge: {}. Answer checking will not be available.",
                e
            );
            AppState::new(host_auth)
        }
    };

    // Spawn background task that garbage-collects abandoned rooms
    sweep::spawn_room_sweeper(state.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
