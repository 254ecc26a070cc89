use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::config::OrdersConfig;

/// Type alias for a database connection pool.
pub type DbPool = DatabaseConnection;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Establishes the connection pool from configuration. SQLx statement
/// logging stays off outside of debug log levels.
pub async fn establish_connection(config: &OrdersConfig) -> Result<DbPool, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .sqlx_logging(config.log_level == "debug" || config.log_level == "trace");

    let pool = Database::connect(options).await?;
    info!(
        max_connections = config.db_max_connections,
        "database connection established"
    );
    Ok(pool)
}
