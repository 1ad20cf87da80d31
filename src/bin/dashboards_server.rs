//! Dashboards gRPC server
//!
//! Serves market lists and OHLCV price/volume diffs from the SQLite warehouse.
//!
//! Usage:
//!   cargo run --release --bin dashboards_server [-- -f path/to/.env]
//!
//! Environment variables: see `ServerConfig::from_env`.

use dashboards::proto::dashboards_server::DashboardsServer;
use dashboards::query::QueryBuilder;
use dashboards::storage::{run_schema_migrations, QueryStore, SqliteStore};
use dashboards::{logging, DashboardsService, ServerConfig};
use log::{error, info};
use rusqlite::Connection;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

const SCHEMA_DIR: &str = "sql/schema";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    logging::init(config.debug);

    info!("🚀 Dashboards server");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Table: {}", config.ohlcv_table);
    info!("   ├─ Request timeout: {:?}", config.grpc_timeout);
    info!("   └─ Max data corrupt: {}%", config.max_data_corrupt);

    if config.run_migrations {
        let mut conn = Connection::open(&config.db_path)?;
        run_schema_migrations(&mut conn, SCHEMA_DIR)?;
        drop(conn);
    }

    let store: Arc<dyn QueryStore> = Arc::new(SqliteStore::open(&config.db_path, config.db_max_idle)?);
    let service = DashboardsService::new(
        store,
        QueryBuilder::new(config.ohlcv_table.clone()),
        config.max_data_corrupt,
        config.grpc_timeout,
    );

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.grpc_port));
    info!("📡 gRPC server listening on {}", addr);
    info!("🔄 Press CTRL+C to shutdown gracefully");

    tonic::transport::Server::builder()
        .timeout(config.grpc_timeout)
        .add_service(DashboardsServer::new(service))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    info!("✅ Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to listen for CTRL+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("❌ Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("⚠️  Received CTRL+C, shutting down..."),
        _ = terminate => info!("⚠️  Received SIGTERM, shutting down..."),
    }
}
