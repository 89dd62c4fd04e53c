//! Bootstraps the database schema (tables, partitions, indexes) and applies
//! any pending code-defined migrations.
//!
//! Used as a Docker entrypoint step before starting the server.

use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    println!("Bootstrapping database schema...");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    tr_storage::schema::ensure_schema(&pool).await?;

    println!("Schema bootstrap complete.");

    Ok(())
}
