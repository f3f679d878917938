use crate::config::AppConfig;
use crate::entities;
use crate::errors::ServiceError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool using pool sizing from the app config.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!("Database connection established");
    Ok(pool)
}

/// Creates any missing tables from the entity definitions.
///
/// Intended for SQLite development/test databases; production schemas are
/// managed by external migrations.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_table {
        ($entity:expr) => {
            let stmt = schema.create_table_from_entity($entity).if_not_exists().to_owned();
            db.execute(backend.build(&stmt)).await?;
        };
    }

    create_table!(entities::Category);
    create_table!(entities::Product);
    create_table!(entities::ProductDiscount);
    create_table!(entities::Coupon);
    create_table!(entities::CouponCategory);
    create_table!(entities::CartItem);
    create_table!(entities::Ward);
    create_table!(entities::Payment);
    create_table!(entities::SalesOrder);
    create_table!(entities::OrderProduct);

    info!("Schema bootstrap complete");
    Ok(())
}
