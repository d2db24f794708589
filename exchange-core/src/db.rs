use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let migrations = [
        include_str!("../migrations/001_create_users_instruments.sql"),
        include_str!("../migrations/002_create_balances.sql"),
        include_str!("../migrations/003_create_orders.sql"),
        include_str!("../migrations/004_create_trades.sql"),
    ];

    for migration in migrations {
        sqlx::raw_sql(migration).execute(pool).await?;
    }

    tracing::info!("exchange-core migrations completed");
    Ok(())
}
