use route_metrics::config::environment::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_metrics=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load environment configuration");

    let metrics =
        route_metrics::demo_metrics(&config.metrics).expect("Failed to initialize metrics");
    tracing::info!(path = metrics.metrics_path(), "Metrics endpoint ready");

    let app = route_metrics::create_app(metrics);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await.unwrap();
}
