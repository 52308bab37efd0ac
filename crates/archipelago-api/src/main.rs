use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archipelago_api::auth::RedisIdentityResolver;
use archipelago_api::services::Stores;
use archipelago_api::{app, AppConfig, AppState};
use archipelago_db::{log_pool_metrics, Database};
use archipelago_inference::{OpenAITagSuggester, QdrantTagGraph};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logging:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - env filter (default: "archipelago_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "archipelago_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("archipelago-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = AppConfig::from_env()?;

    let db = Database::connect_with_config(&config.database_url, config.pool.clone()).await?;
    db.migrate().await?;
    log_pool_metrics(db.pool());

    let identity = RedisIdentityResolver::connect(&config.redis_url).await?;
    info!(subsystem = "api", component = "auth", "Session store connected");

    let mut state = AppState::new(Stores::from_database(db), Arc::new(identity));

    match config.suggester.clone() {
        Some(suggester) => {
            info!(
                subsystem = "api",
                component = "tag_suggester",
                url = %suggester.base_url,
                model = %suggester.model,
                "Tag suggestion enabled"
            );
            state = state.with_suggester(Arc::new(OpenAITagSuggester::new(suggester)?));
        }
        None => warn!(
            subsystem = "api",
            component = "tag_suggester",
            "OPENAI_URL not set, tag suggestion disabled"
        ),
    }

    match config.tag_graph.clone() {
        Some(graph) => {
            info!(
                subsystem = "api",
                component = "tag_graph",
                qdrant_url = %graph.qdrant_url,
                collection = %graph.collection,
                "Tag similarity enabled"
            );
            state = state.with_tag_graph(Arc::new(QdrantTagGraph::new(&graph)?));
        }
        None => warn!(
            subsystem = "api",
            component = "tag_graph",
            "QDRANT_URL not set, tag similarity disabled"
        ),
    }

    let app = app(state, &config.allowed_origins, config.request_timeout);

    info!("Starting server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
