use tracing_subscriber::EnvFilter;

use caretrack::api::{self, ApiContext};
use caretrack::{accounts, config, db};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let data_dir = config::app_data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!("Cannot create data directory {}: {e}", data_dir.display());
        std::process::exit(1);
    }

    let conn = match db::open_database(&config::db_path()) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Cannot open database: {e}");
            std::process::exit(1);
        }
    };

    if let Some((username, password)) = config::bootstrap_admin() {
        match accounts::bootstrap_master_admin(&conn, &username, &password) {
            Ok(Some(_)) => tracing::info!(%username, "created initial master admin"),
            Ok(None) => {}
            Err(e) => tracing::warn!("Master admin bootstrap failed: {e}"),
        }
    }

    let ctx = ApiContext::new(conn);
    let server = match api::server::start(ctx, config::bind_addr()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Cannot start API server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
    server.shutdown().await;
}
