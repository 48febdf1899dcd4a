//! Judgeline - Application Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use judgeline::{
    config::CONFIG,
    constants::API_BASE_PATH,
    db::{self, PgStore},
    handlers,
    services::{RedisJudgeQueue, RedisRateLimiter, ReportListener, judge_listener},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| CONFIG.server.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Judgeline server...");

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&CONFIG.database).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool).await?;

    tracing::info!("Connecting to Redis...");
    let redis_client = redis::Client::open(CONFIG.redis.url.as_str())?;
    let redis_conn = ConnectionManager::new(redis_client.clone()).await?;
    // BRPOP blocks its connection, so reports get one of their own
    let report_conn = ConnectionManager::new_with_config(
        redis_client,
        ConnectionManagerConfig::new().set_response_timeout(Duration::from_secs_f64(
            judge_listener::POLL_TIMEOUT_SECS + 5.0,
        )),
    )
    .await?;

    let state = AppState::new(
        Arc::new(PgStore::new(db_pool)),
        Arc::new(RedisRateLimiter::new(redis_conn.clone())),
        Arc::new(RedisJudgeQueue::new(
            redis_conn,
            CONFIG.judge.queue_name.clone(),
        )),
        CONFIG.clone(),
    );

    let listener_task = tokio::spawn(
        ReportListener::new(report_conn, CONFIG.judge.results_queue.clone(), state.clone()).run(),
    );

    let app = Router::new()
        .nest(API_BASE_PATH, handlers::routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::new(CONFIG.server.host.parse()?, CONFIG.server.port);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    listener_task.abort();
    Ok(())
}
