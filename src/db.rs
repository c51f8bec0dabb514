use crate::config::AppConfig;
use crate::entities;
use crate::errors::ServiceError;
use metrics::gauge;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
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
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("staysync_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(ServiceError::from)?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Creates missing tables and indexes from the entity definitions.
///
/// Invoked at startup when `auto_migrate` is enabled, and by the test
/// harness. Statements are `IF NOT EXISTS` so re-running is harmless.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, entities::property::Entity).await?;
    create_table(db, &schema, entities::room_unit::Entity).await?;
    create_table(db, &schema, entities::room_instance::Entity).await?;
    create_table(db, &schema, entities::booking::Entity).await?;
    create_table(db, &schema, entities::booking_room::Entity).await?;
    create_table(db, &schema, entities::payment_event::Entity).await?;
    create_table(db, &schema, entities::pricing_rule::Entity).await?;
    create_table(db, &schema, entities::coupon::Entity).await?;
    create_table(db, &schema, entities::coupon_usage::Entity).await?;
    create_table(db, &schema, entities::coupon_user_usage::Entity).await?;
    create_table(db, &schema, entities::channel_config::Entity).await?;
    create_table(db, &schema, entities::sync_log::Entity).await?;

    // Composite unique indexes the ledger invariants depend on. The
    // (room_instance_id, night) index is what makes concurrent allocation
    // of the last unit a single-winner race.
    let indexes: Vec<IndexCreateStatement> = vec![
        Index::create()
            .name("ux_booking_rooms_instance_night")
            .table(entities::booking_room::Entity)
            .col(entities::booking_room::Column::RoomInstanceId)
            .col(entities::booking_room::Column::Night)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_coupon_usages_coupon_booking")
            .table(entities::coupon_usage::Entity)
            .col(entities::coupon_usage::Column::CouponId)
            .col(entities::coupon_usage::Column::BookingId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_coupon_user_usages_coupon_user")
            .table(entities::coupon_user_usage::Entity)
            .col(entities::coupon_user_usage::Column::CouponId)
            .col(entities::coupon_user_usage::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_channel_configs_property_channel")
            .table(entities::channel_config::Entity)
            .col(entities::channel_config::Column::PropertyId)
            .col(entities::channel_config::Column::Channel)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ix_sync_logs_property_started")
            .table(entities::sync_log::Entity)
            .col(entities::sync_log::Column::PropertyId)
            .col(entities::sync_log::Column::StartedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ix_bookings_status_created")
            .table(entities::booking::Entity)
            .col(entities::booking::Column::Status)
            .col(entities::booking::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in indexes {
        db.execute(backend.build(&stmt))
            .await
            .map_err(ServiceError::from)?;
    }

    info!("Database schema ensured");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt))
        .await
        .map_err(ServiceError::from)?;
    Ok(())
}

/// Verifies database connectivity. Used by the health endpoint.
pub async fn ping(db: &DatabaseConnection) -> Result<(), ServiceError> {
    db.ping().await.map_err(ServiceError::from)
}
