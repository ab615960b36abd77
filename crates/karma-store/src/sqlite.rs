use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use karma_core::{KarmaOperation, KarmaStore, LeaderboardEntry, StoreError};
use rusqlite::{Connection, OptionalExtension as _, Row, params, types::Type};
use time::OffsetDateTime;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS points (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    "from"    TEXT    NOT NULL,
    "to"      TEXT    NOT NULL,
    points    INTEGER NOT NULL,
    reason    TEXT,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS points_to ON points ("to");
"#;

/// SQLite-backed store. Queries run on the blocking pool behind a single
/// connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!(path = %path.display(), "Opening SQLite database");
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(backend)?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");
        Self::with_schema(Connection::open_in_memory().map_err(backend)?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))?;
            f(&conn).map_err(backend)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl KarmaStore for SqliteStore {
    async fn insert_operation(&self, op: &KarmaOperation) -> Result<(), StoreError> {
        let op = op.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT INTO points ("from", "to", points, reason, timestamp)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    op.from,
                    op.to,
                    op.delta,
                    op.reason,
                    op.timestamp.unix_timestamp()
                ],
            )
            .map(|_| ())
        })
        .await
    }

    async fn user_points(&self, name: &str) -> Result<i64, StoreError> {
        let owned = name.to_owned();
        let total = self
            .with_conn(move |conn| {
                conn.query_row(
                    r#"SELECT SUM(points) FROM points WHERE "to" = ?1"#,
                    params![owned],
                    |row| row.get::<_, Option<i64>>(0),
                )
            })
            .await?;
        total.ok_or_else(|| StoreError::NoSuchUser(name.to_owned()))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"SELECT "to", SUM(points) AS total FROM points
                   GROUP BY "to" ORDER BY total DESC, "to" ASC LIMIT ?1"#,
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(LeaderboardEntry {
                    name: row.get(0)?,
                    points: row.get(1)?,
                })
            })?;
            let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn throwback(&self, name: &str) -> Result<KarmaOperation, StoreError> {
        let owned = name.to_owned();
        let op = self
            .with_conn(move |conn| {
                conn.query_row(
                    r#"SELECT "from", "to", points, reason, timestamp FROM points
                       WHERE "to" = ?1 ORDER BY RANDOM() LIMIT 1"#,
                    params![owned],
                    operation_from_row,
                )
                .optional()
            })
            .await?;
        op.ok_or_else(|| StoreError::NoSuchUser(name.to_owned()))
    }

    async fn total_points(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(ABS(points)), 0) FROM points",
                [],
                |row| row.get(0),
            )
        })
        .await
    }
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<KarmaOperation> {
    let seconds: i64 = row.get(4)?;
    let timestamp = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e)))?;
    Ok(KarmaOperation {
        from: row.get(0)?,
        to: row.get(1)?,
        delta: row.get(2)?,
        reason: row.get(3)?,
        timestamp,
    })
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn op(from: &str, to: &str, delta: i64, reason: Option<&str>) -> KarmaOperation {
        KarmaOperation::at(
            from,
            to,
            delta,
            reason.map(ToOwned::to_owned),
            datetime!(2024-01-02 03:04:05 UTC),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn points_and_leaderboard_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karma.sqlite3");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_operation(&op("bob", "alice", 3, None)).await.unwrap();
            store.insert_operation(&op("alice", "bob", -2, Some("late"))).await.unwrap();
            store.insert_operation(&op("carol", "alice", 1, None)).await.unwrap();
            store.insert_operation(&op("alice", "carol", 1, None)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.user_points("alice").await.unwrap(), 4);
        assert_eq!(store.user_points("bob").await.unwrap(), -2);
        assert_eq!(store.total_points().await.unwrap(), 7);

        let top = store.leaderboard(2).await.unwrap();
        let names: Vec<_> = top.iter().map(|e| (e.name.as_str(), e.points)).collect();
        assert_eq!(names, vec![("alice", 4), ("carol", 1)]);
    }

    #[tokio::test]
    async fn unknown_users_are_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.user_points("nobody").await,
            Err(StoreError::NoSuchUser(name)) if name == "nobody"
        ));
        assert!(matches!(
            store.throwback("nobody").await,
            Err(StoreError::NoSuchUser(_))
        ));
        assert_eq!(store.total_points().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn throwback_returns_a_stored_operation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stored = op("bob", "alice", -4, Some("sleeping in"));
        store.insert_operation(&stored).await.unwrap();
        assert_eq!(store.throwback("alice").await.unwrap(), stored);
    }
}
