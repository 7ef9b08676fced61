use crate::config::AppConfig;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, TransactionError,
    TransactionTrait,
};
use migrations::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Fixed delay between transaction retry attempts
const TX_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs the embedded database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = migrations::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(ServiceError::DatabaseError)
}

/// Classifies database errors that are worth retrying: deadlocks, lock or
/// statement timeouts, and lost connections. Everything else propagates.
pub fn is_transient_db_err(err: &DbErr) -> bool {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => true,
        other => {
            let msg = other.to_string().to_ascii_lowercase();
            msg.contains("deadlock")
                || msg.contains("lock timeout")
                || msg.contains("lock wait timeout")
                || msg.contains("statement timeout")
                || msg.contains("timed out")
                || msg.contains("connection reset")
                || msg.contains("connection closed")
        }
    }
}

fn is_transient_service_err(err: &ServiceError) -> bool {
    match err {
        ServiceError::DatabaseError(db_err) => is_transient_db_err(db_err),
        _ => false,
    }
}

/// Runs `f` inside a database transaction, retrying the whole transaction up
/// to `max_attempts` times when it fails with a transient database error.
///
/// Each attempt sees a fresh transaction; a failed attempt is fully rolled
/// back before the next one starts.
pub async fn transaction_with_retry<F, T>(
    db: &DatabaseConnection,
    max_attempts: u32,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send + Sync,
    T: Send,
{
    let max_attempts = max_attempts.max(1);
    let start = std::time::Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        counter!("crewdeck_db.transaction.started", 1);

        let result = db
            .transaction::<_, T, ServiceError>(|txn| f(txn))
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            });

        match result {
            Ok(value) => {
                counter!("crewdeck_db.transaction.committed", 1);
                histogram!(
                    "crewdeck_db.transaction.duration",
                    start.elapsed().as_secs_f64()
                );
                return Ok(value);
            }
            Err(err) if is_transient_service_err(&err) && attempt < max_attempts => {
                counter!("crewdeck_db.transaction.retried", 1);
                warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    "transient database error, retrying transaction"
                );
                tokio::time::sleep(TX_RETRY_DELAY).await;
            }
            Err(err) => {
                counter!("crewdeck_db.transaction.rolled_back", 1);
                return Err(err);
            }
        }
    }
}
