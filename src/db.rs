// src/db.rs

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::{info, warn};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_postgres::{Config, NoTls};

use crate::models::EntityKind;

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Reads environment variables and constructs a PostgreSQL config.
fn build_pg_config() -> Config {
    let mut config = Config::new();
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port_str = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    let port = port_str.parse::<u16>().unwrap_or_else(|_| {
        warn!("Invalid POSTGRES_PORT '{}', using 5432", port_str);
        5432
    });
    let dbname = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "comps".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

    info!(
        "DB Config: Host={}, Port={}, DB={}, User={}",
        host, port, dbname, user
    );
    config
        .host(&host)
        .port(port)
        .dbname(&dbname)
        .user(&user)
        .password(&password);
    config.application_name("fuse_standardization");
    config.connect_timeout(Duration::from_secs(10));
    config
}

/// Initializes the database connection pool.
pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config();
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    // Two standardization passes run side by side; a handful of connections is plenty
    let pool = Pool::builder()
        .max_size(8)
        .min_idle(Some(1))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    drop(conn);
    info!("Database connection pool initialized successfully.");
    Ok(pool)
}

/// Loads environment variables from a .env file without overriding ones
/// already set.
pub fn load_env_from_file(file_path: &str) -> Result<()> {
    info!(
        "Attempting to load environment variables from: {}",
        file_path
    );
    dotenv::from_path(Path::new(file_path))
        .with_context(|| format!("Failed to load env file {}", file_path))?;
    info!("Successfully processed env file: {}", file_path);
    Ok(())
}

fn importance_table_sql(kind: EntityKind) -> String {
    let (source, join) = match kind {
        EntityKind::Broker => (
            "named_brokers e",
            "comp_broker_link l ON e.realty_broker_id = l.realty_broker_id",
        ),
        EntityKind::Brokerage => (
            "brokerages e",
            "comp_brokerage_link l ON e.id = l.realty_company_id",
        ),
    };
    format!(
        "DROP TABLE IF EXISTS {table};
        CREATE TABLE {table} AS (
            SELECT e.name, count(DISTINCT l.comp_id) AS count
            FROM {source} JOIN {join}
            WHERE e.name IS NOT NULL
            GROUP BY e.name);
        CREATE INDEX {table}_trgm_idx ON {table} USING gist (name gist_trgm_ops);",
        table = kind.importance_table(),
        source = source,
        join = join,
    )
}

fn similarity_table_sql(kind: EntityKind) -> String {
    format!(
        "DROP TABLE IF EXISTS {similar};
        CREATE TABLE {similar} AS (
            SELECT DISTINCT
                b1.name AS name_1,
                b2.name AS name_2,
                similarity(b1.name, b2.name) AS similarity
            FROM {importance} b1 JOIN {importance} b2
                ON b1.name != b2.name
                AND b1.name % b2.name);",
        similar = kind.similarity_table(),
        importance = kind.importance_table(),
    )
}

/// Rebuilds the importance and trigram-similarity tables of both kinds from
/// the loaded broker, brokerage and comp link tables.
///
/// Runs on a single connection because the `%` threshold is a session setting.
pub async fn prepare_similarity_tables(pool: &PgPool, min_similarity: f32) -> Result<()> {
    let start_time = Instant::now();
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for similarity preparation")?;

    conn.batch_execute("CREATE EXTENSION IF NOT EXISTS pg_trgm;")
        .await
        .context("Failed to enable pg_trgm")?;
    conn.execute("SELECT set_limit($1)", &[&min_similarity])
        .await
        .context("Failed to set trigram similarity threshold")?;

    for kind in EntityKind::ALL {
        info!("Rebuilding {} importance table...", kind);
        conn.batch_execute(&importance_table_sql(kind))
            .await
            .with_context(|| format!("Failed to build {}", kind.importance_table()))?;

        info!("Rebuilding {} similarity table...", kind);
        conn.batch_execute(&similarity_table_sql(kind))
            .await
            .with_context(|| format!("Failed to build {}", kind.similarity_table()))?;
    }

    info!(
        "Similarity tables prepared in {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_sql_targets_kind_tables() {
        let sql = importance_table_sql(EntityKind::Brokerage);
        assert!(sql.contains("CREATE TABLE company_importance AS"));
        assert!(sql.contains("comp_brokerage_link"));
        assert!(!sql.contains("named_brokers"));
    }

    #[test]
    fn test_similarity_sql_excludes_self_pairs() {
        let sql = similarity_table_sql(EntityKind::Broker);
        assert!(sql.contains("CREATE TABLE similar_brokers AS"));
        assert!(sql.contains("FROM broker_importance b1 JOIN broker_importance b2"));
        assert!(sql.contains("b1.name != b2.name"));
    }
}
