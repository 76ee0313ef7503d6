//! SQLite implementation of the persistence layer.
//!
//! One [`Store`] wraps a `sqlx::SqlitePool` and is passed explicitly to
//! every component that writes; there is no process-global connection.
//! Each ingestion cycle's dimension resolutions and fact inserts share a
//! single transaction that commits once at the end of the cycle. WAL
//! journal mode plus a busy timeout lets overlapping cycles serialize
//! their writes on SQLite's own writer lock.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

use crate::config::TrackerConfig;
use crate::domain::NormalizedRecord;
use crate::error::TrackerError;

/// Busy timeout for the SQLite writer lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The five categorical dimension tables.
///
/// Each maps a repeated string value to a stable surrogate integer key.
/// Rows are created lazily on first sighting and never updated or
/// deleted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Line designation.
    Line,
    /// Origin–destination relation.
    Relation,
    /// Route path ("menetvonal").
    Menetvonal,
    /// External ELVIRA identifier.
    ElviraId,
    /// Train number.
    TrainNumber,
}

impl Dimension {
    /// Atomic get-or-insert statement for this dimension.
    ///
    /// The `DO UPDATE` arm is a self-assignment so `RETURNING id` always
    /// produces a row, whether the value was just inserted or already
    /// existed. Uniqueness is on the value column, so first insert wins
    /// and repeats resolve to the original id.
    const fn upsert_sql(self) -> &'static str {
        match self {
            Self::Line => {
                "INSERT INTO line (value) VALUES (?1) \
                 ON CONFLICT (value) DO UPDATE SET value = excluded.value RETURNING id"
            }
            Self::Relation => {
                "INSERT INTO relation (value) VALUES (?1) \
                 ON CONFLICT (value) DO UPDATE SET value = excluded.value RETURNING id"
            }
            Self::Menetvonal => {
                "INSERT INTO menetvonal (value) VALUES (?1) \
                 ON CONFLICT (value) DO UPDATE SET value = excluded.value RETURNING id"
            }
            Self::ElviraId => {
                "INSERT INTO elvira_id (value) VALUES (?1) \
                 ON CONFLICT (value) DO UPDATE SET value = excluded.value RETURNING id"
            }
            Self::TrainNumber => {
                "INSERT INTO train_number (value) VALUES (?1) \
                 ON CONFLICT (value) DO UPDATE SET value = excluded.value RETURNING id"
            }
        }
    }
}

/// SQLite-backed store for train-position facts and dimensions.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the database file and connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Io`] when the database directory cannot be
    /// created, or [`TrackerError::Persistence`] when the pool cannot
    /// connect.
    pub async fn connect(config: &TrackerConfig) -> Result<Self, TrackerError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| TrackerError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let max_connections = u32::try_from(config.max_overlapping_cycles).unwrap_or(u32::MAX);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Executes the externally supplied bootstrap script.
    ///
    /// The script is expected to be idempotent; the pipeline never
    /// alters the schema afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] when any statement fails.
    pub async fn apply_schema(&self, sql: &str) -> Result<(), TrackerError> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        tracing::info!("database schema applied");
        Ok(())
    }

    /// Resolves a categorical value to its surrogate key, inserting a
    /// dimension row on first sighting. `None` propagates: absent values
    /// are not a dimension.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] on database failure.
    pub async fn resolve_dimension(
        &self,
        dimension: Dimension,
        value: Option<&str>,
    ) -> Result<Option<i64>, TrackerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(resolve_on(&mut conn, dimension, value).await?)
    }

    /// Persists one cycle's records inside a single transaction.
    ///
    /// Per record, all five dimension ids are resolved and one fact row
    /// is inserted. A failing record is logged and skipped without
    /// abandoning the records already written in the same transaction.
    /// Returns the number of fact rows written; an empty input is a
    /// logged no-op returning 0.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Persistence`] when the transaction itself
    /// cannot be opened or committed.
    pub async fn persist(&self, records: &[NormalizedRecord]) -> Result<u64, TrackerError> {
        if records.is_empty() {
            tracing::info!("no records to save");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for (index, record) in records.iter().enumerate() {
            match insert_record(&mut tx, record).await {
                Ok(()) => written += 1,
                Err(error) => {
                    tracing::warn!(index, %error, "failed to persist train record; skipping");
                }
            }
        }
        tx.commit().await?;

        Ok(written)
    }
}

/// Runs the atomic get-or-insert for one dimension value.
async fn resolve_on(
    conn: &mut SqliteConnection,
    dimension: Dimension,
    value: Option<&str>,
) -> Result<Option<i64>, sqlx::Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    let id = sqlx::query_scalar::<_, i64>(dimension.upsert_sql())
        .bind(value)
        .fetch_one(conn)
        .await?;
    Ok(Some(id))
}

/// Resolves all dimensions for one record and inserts its fact row.
async fn insert_record(
    conn: &mut SqliteConnection,
    record: &NormalizedRecord,
) -> Result<(), sqlx::Error> {
    let line_id = resolve_on(&mut *conn, Dimension::Line, record.line.as_deref()).await?;
    let relation_id =
        resolve_on(&mut *conn, Dimension::Relation, record.relation.as_deref()).await?;
    let menetvonal_id =
        resolve_on(&mut *conn, Dimension::Menetvonal, record.menetvonal.as_deref()).await?;
    let elvira_id_id =
        resolve_on(&mut *conn, Dimension::ElviraId, record.elvira_id.as_deref()).await?;
    let train_number_id = resolve_on(
        &mut *conn,
        Dimension::TrainNumber,
        record.train_number.as_deref(),
    )
    .await?;

    sqlx::query(
        "INSERT INTO train_position (\
             created_at, delay, lat_micro, lon_micro, \
             line_id, relation_id, menetvonal_id, elvira_id_id, train_number_id\
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(record.created_at)
    .bind(record.delay)
    .bind(record.lat_micro)
    .bind(record.lon_micro)
    .bind(line_id)
    .bind(relation_id)
    .bind(menetvonal_id)
    .bind(elvira_id_id)
    .bind(train_number_id)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{extract, normalize};
    use serde_json::json;

    const SCHEMA: &str = include_str!("../../schema.sql");

    async fn test_store() -> Store {
        let options = match "sqlite::memory:".parse::<SqliteConnectOptions>() {
            Ok(options) => options,
            Err(e) => panic!("in-memory options: {e}"),
        };
        let pool = match SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
        {
            Ok(pool) => pool,
            Err(e) => panic!("in-memory pool: {e}"),
        };
        let store = Store { pool };
        if let Err(e) = store.apply_schema(SCHEMA).await {
            panic!("schema bootstrap: {e}");
        }
        store
    }

    fn record(line: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            created_at: 1_704_106_800,
            delay: Some(5.0),
            lat_micro: Some(47_497_000),
            lon_micro: Some(19_040_200),
            line: line.map(str::to_string),
            relation: Some("Budapest - Szeged".to_string()),
            menetvonal: Some("GYSEV".to_string()),
            elvira_id: Some("4305_240101".to_string()),
            train_number: Some("554305".to_string()),
        }
    }

    async fn count(store: &Store, sql: &str) -> i64 {
        match sqlx::query_scalar::<_, i64>(sql).fetch_one(&store.pool).await {
            Ok(n) => n,
            Err(e) => panic!("count query: {e}"),
        }
    }

    #[tokio::test]
    async fn resolve_is_idempotent_across_calls() {
        let store = test_store().await;

        let first = store.resolve_dimension(Dimension::Line, Some("1")).await;
        let second = store.resolve_dimension(Dimension::Line, Some("1")).await;
        let (Ok(Some(first)), Ok(Some(second))) = (first, second) else {
            panic!("resolution failed");
        };
        assert_eq!(first, second);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM line").await, 1);
    }

    #[tokio::test]
    async fn resolve_none_propagates_without_lookup() {
        let store = test_store().await;
        let resolved = store.resolve_dimension(Dimension::Relation, None).await;
        assert!(matches!(resolved, Ok(None)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM relation").await, 0);
    }

    #[tokio::test]
    async fn distinct_values_get_distinct_ids() {
        let store = test_store().await;
        let a = store.resolve_dimension(Dimension::TrainNumber, Some("100")).await;
        let b = store.resolve_dimension(Dimension::TrainNumber, Some("200")).await;
        let (Ok(Some(a)), Ok(Some(b))) = (a, b) else {
            panic!("resolution failed");
        };
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn persist_writes_one_row_per_record() {
        let store = test_store().await;
        let records = vec![record(Some("1")), record(Some("2")), record(None)];

        let written = store.persist(&records).await;
        assert!(matches!(written, Ok(3)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM train_position").await, 3);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM line").await, 2);
    }

    #[tokio::test]
    async fn persist_empty_is_a_noop() {
        let store = test_store().await;
        let written = store.persist(&[]).await;
        assert!(matches!(written, Ok(0)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM train_position").await, 0);
    }

    #[tokio::test]
    async fn repeated_line_value_reuses_dimension_row_across_cycles() {
        let store = test_store().await;

        let first = store.persist(&[record(Some("1"))]).await;
        let second = store.persist(&[record(Some("1"))]).await;
        assert!(matches!(first, Ok(1)));
        assert!(matches!(second, Ok(1)));

        assert_eq!(count(&store, "SELECT COUNT(*) FROM line").await, 1);
        assert_eq!(
            count(&store, "SELECT COUNT(DISTINCT line_id) FROM train_position").await,
            1
        );
    }

    #[tokio::test]
    async fn null_fields_persist_as_null_foreign_keys() {
        let store = test_store().await;
        let mut rec = record(None);
        rec.lat_micro = None;
        rec.delay = None;

        let written = store.persist(&[rec]).await;
        assert!(matches!(written, Ok(1)));
        assert_eq!(
            count(
                &store,
                "SELECT COUNT(*) FROM train_position \
                 WHERE line_id IS NULL AND lat_micro IS NULL AND delay IS NULL \
                 AND lon_micro IS NOT NULL",
            )
            .await,
            1
        );
    }

    #[tokio::test]
    async fn full_pipeline_writes_worked_example() {
        let store = test_store().await;
        let raw = json!({
            "d": {
                "result": {
                    "@CreationTime": "2024.01.01 12:00:00",
                    "Trains": {"Train": [
                        {"@Lat": 47.497, "@Lon": 19.0402, "@Line": "1", "@Delay": 5}
                    ]}
                }
            }
        });

        let Some(snapshot) = extract(&raw) else {
            panic!("expected a snapshot");
        };
        let Ok(outcome) = normalize(&snapshot) else {
            panic!("normalize failed");
        };
        let written = store.persist(&outcome.records).await;
        assert!(matches!(written, Ok(1)));

        assert_eq!(
            count(
                &store,
                "SELECT COUNT(*) FROM train_position t JOIN line l ON l.id = t.line_id \
                 WHERE t.lat_micro = 47497000 AND t.lon_micro = 19040200 \
                 AND t.delay = 5.0 AND l.value = '1'",
            )
            .await,
            1
        );
    }

    #[tokio::test]
    async fn missing_creation_time_writes_nothing() {
        let store = test_store().await;
        let raw = json!({"d": {"result": {"Trains": {"Train": [{"@Line": "1"}]}}}});

        if let Some(snapshot) = extract(&raw) {
            panic!("expected no snapshot, got {snapshot:?}");
        }
        assert_eq!(count(&store, "SELECT COUNT(*) FROM train_position").await, 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM line").await, 0);
    }
}
