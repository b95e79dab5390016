// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relational store on the sqlx `Any` driver (SQLite or MySQL).
//!
//! Schema:
//! ```sql
//! CREATE TABLE countries (
//!   name VARCHAR(255) PRIMARY KEY,
//!   region VARCHAR(255) NOT NULL,
//!   population BIGINT NOT NULL,
//!   area DOUBLE NOT NULL,
//!   population_density DOUBLE NOT NULL
//! )
//!
//! CREATE TABLE images (
//!   seq BIGINT AUTO_INCREMENT PRIMARY KEY, -- insertion order
//!   id VARCHAR(64) NOT NULL UNIQUE,
//!   country_name VARCHAR(255) NOT NULL,
//!   title TEXT NOT NULL,
//!   description TEXT NOT NULL
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! The `Any` driver cannot bind `u64`, so population goes through `i64`.
//! MySQL TEXT columns come back as bytes, so text reads fall back to
//! `Vec<u8>` (see [`text`]).

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use crate::metrics::{self, LatencyTimer};
use crate::record::{CountryRecord, ImageRecord};
use crate::resilience::retry::{retry, RetryConfig};
use super::query::CountryQuery;
use super::traits::{CountryStore, StorageError};

/// Rows per multi-row INSERT. 5 binds each keeps SQLite under its variable limit.
const INSERT_CHUNK: usize = 150;

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

fn backend(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Constraint(db.message().to_string()),
        _ => StorageError::Backend(e.to_string()),
    }
}

/// Read a text column as String (SQLite TEXT), falling back to bytes (MySQL TEXT).
fn text(row: &AnyRow, column: &str) -> Result<String, StorageError> {
    row.try_get::<String, _>(column)
        .ok()
        .or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
        .ok_or_else(|| StorageError::Backend(format!("column '{}' is not text", column)))
}

fn population_to_sql(record: &CountryRecord) -> Result<i64, StorageError> {
    i64::try_from(record.population)
        .map_err(|_| StorageError::Constraint(format!("population of '{}' exceeds BIGINT", record.name)))
}

fn country_from_row(row: &AnyRow) -> Result<CountryRecord, StorageError> {
    let population: i64 = row.try_get("population").map_err(backend)?;
    Ok(CountryRecord {
        name: text(row, "name")?,
        region: text(row, "region")?,
        population: u64::try_from(population)
            .map_err(|_| StorageError::Backend(format!("negative population {}", population)))?,
        area: row.try_get("area").map_err(backend)?,
        population_density: row.try_get("population_density").map_err(backend)?,
    })
}

fn image_from_row(row: &AnyRow) -> Result<ImageRecord, StorageError> {
    Ok(ImageRecord {
        image_id: text(row, "id")?,
        country_name: text(row, "country_name")?,
        title: text(row, "title")?,
        description: text(row, "description")?,
    })
}

/// Count the outcome of a store call, passing the result through.
fn observe<T>(operation: &'static str, result: Result<T, StorageError>) -> Result<T, StorageError> {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_store_operation(operation, status);
    result
}

pub struct SqlStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlStore {
    /// Connect with startup-mode retry, then create tables if missing.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 5 } else { 20 })
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(sqlite = is_sqlite, "SQL store ready");
        Ok(store)
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    fn schema(&self) -> &'static [&'static str] {
        if self.is_sqlite {
            &[
                r#"
                CREATE TABLE IF NOT EXISTS countries (
                    name TEXT PRIMARY KEY,
                    region TEXT NOT NULL,
                    population INTEGER NOT NULL,
                    area REAL NOT NULL,
                    population_density REAL NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS images (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    country_name TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_images_country ON images (country_name)",
            ]
        } else {
            &[
                r#"
                CREATE TABLE IF NOT EXISTS countries (
                    name VARCHAR(255) PRIMARY KEY,
                    region VARCHAR(255) NOT NULL,
                    population BIGINT NOT NULL,
                    area DOUBLE NOT NULL,
                    population_density DOUBLE NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS images (
                    seq BIGINT AUTO_INCREMENT PRIMARY KEY,
                    id VARCHAR(64) NOT NULL UNIQUE,
                    country_name VARCHAR(255) NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    INDEX idx_images_country (country_name)
                )
                "#,
            ]
        }
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        for statement in self.schema() {
            retry("sql_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .await?;
        }
        Ok(())
    }

    async fn insert_all(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for chunk in records.chunks(INSERT_CHUNK) {
            let placeholders = vec!["(?, ?, ?, ?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO countries (name, region, population, area, population_density) VALUES {}",
                placeholders
            );

            let mut query = sqlx::query(&sql);
            for record in chunk {
                query = query
                    .bind(record.name.clone())
                    .bind(record.region.clone())
                    .bind(population_to_sql(record)?)
                    .bind(record.area)
                    .bind(record.population_density);
            }
            query.execute(&mut *tx).await.map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(records.len())
    }

    async fn update_all(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut updated = 0usize;

        for record in records {
            let result = sqlx::query(
                "UPDATE countries SET region = ?, population = ?, area = ?, population_density = ? WHERE name = ?",
            )
            .bind(record.region.clone())
            .bind(population_to_sql(record)?)
            .bind(record.area)
            .bind(record.population_density)
            .bind(record.name.clone())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
            updated += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(backend)?;
        Ok(updated)
    }
}

#[async_trait]
impl CountryStore for SqlStore {
    async fn get_country(&self, name: &str) -> Result<Option<CountryRecord>, StorageError> {
        let _timer = LatencyTimer::new("get_country");
        let result = async {
            let row = sqlx::query(
                "SELECT name, region, population, area, population_density FROM countries WHERE name = ?",
            )
            .bind(name.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
            row.as_ref().map(country_from_row).transpose()
        }
        .await;
        observe("get_country", result)
    }

    async fn get_countries(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, StorageError> {
        let _timer = LatencyTimer::new("get_countries");
        // Column and direction come from closed enums, never from request text
        let mut sql = format!(
            "SELECT name, region, population, area, population_density FROM countries ORDER BY {col} {dir}, name {dir}",
            col = query.sort_by().as_str(),
            dir = query.order().as_sql(),
        );
        if let Some(limit) = query.limit() {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let result = async {
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(backend)?;
            rows.iter().map(country_from_row).collect::<Result<Vec<_>, _>>()
        }
        .await;
        observe("get_countries", result)
    }

    async fn bulk_insert(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let _timer = LatencyTimer::new("bulk_insert");
        let result = self.insert_all(records).await;
        debug!(count = records.len(), ok = result.is_ok(), "bulk insert");
        observe("bulk_insert", result)
    }

    async fn bulk_update(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let _timer = LatencyTimer::new("bulk_update");
        let result = self.update_all(records).await;
        debug!(count = records.len(), ok = result.is_ok(), "bulk update");
        observe("bulk_update", result)
    }

    async fn add_image_metadata(&self, image: &ImageRecord) -> Result<String, StorageError> {
        let _timer = LatencyTimer::new("add_image_metadata");
        let result = sqlx::query("INSERT INTO images (id, country_name, title, description) VALUES (?, ?, ?, ?)")
            .bind(image.image_id.clone())
            .bind(image.country_name.clone())
            .bind(image.title.clone())
            .bind(image.description.clone())
            .execute(&self.pool)
            .await
            .map(|_| image.image_id.clone())
            .map_err(backend);
        observe("add_image_metadata", result)
    }

    async fn get_images_metadata(&self, country_name: &str) -> Result<Vec<ImageRecord>, StorageError> {
        let _timer = LatencyTimer::new("get_images_metadata");
        let result = async {
            let rows = sqlx::query(
                "SELECT id, country_name, title, description FROM images WHERE country_name = ? ORDER BY seq ASC",
            )
            .bind(country_name.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
            rows.iter().map(image_from_row).collect::<Result<Vec<_>, _>>()
        }
        .await;
        observe("get_images_metadata", result)
    }

    async fn delete_image_metadata(&self, image_id: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(image_id.to_string())
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend);
        observe("delete_image_metadata", result)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let result = sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend);
        metrics::set_backend_healthy("sql", result.is_ok());
        result
    }
}
