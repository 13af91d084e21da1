use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use whisker_core::{EatEvent, Food, FoodId, PetEvent, RecordStore, UserId};

type EatRow = (i64, i64, i64, bool, bool, i64);
type PetRow = (i64, i64, bool, i64);

/// Interaction history on SQLite.
///
/// Timestamps are Unix milliseconds; every read is ordered most-recent-first.
/// A new event is never stamped earlier than the last one written, so the
/// wall clock stepping back cannot reorder history.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    last_stamp: Arc<AtomicI64>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let raw = db_path.as_ref().display().to_string();
        let in_memory = raw == ":memory:";
        let db_url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", raw)
        };

        // An in-memory database lives and dies with its connection, so pin exactly one.
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = options
            .after_connect(|conn, _meta| Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                Ok(())
            }))
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool, last_stamp: Arc::new(AtomicI64::new(i64::MIN)) };
        store.migrate().await?;
        let latest = store.latest_stamp().await?;
        store.last_stamp.store(latest.unwrap_or(i64::MIN), Ordering::SeqCst);
        tracing::info!("Record store ready at {}", raw);
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            "#
        )
        .execute(&self.pool)
        .await
        .context("Failed to create users table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS foods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                preferred_by_cat INTEGER NOT NULL
            );
            "#
        )
        .execute(&self.pool)
        .await
        .context("Failed to create foods table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS eat_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                food_id INTEGER NOT NULL,
                is_success INTEGER NOT NULL,
                is_cat_fed INTEGER NOT NULL,
                occurred_at INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY(food_id) REFERENCES foods(id) ON DELETE CASCADE
            );
            "#
        )
        .execute(&self.pool)
        .await
        .context("Failed to create eat_events table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_eat_events_occurred_at ON eat_events(occurred_at)"
        )
        .execute(&self.pool)
        .await
        .context("Failed to create eat_events timestamp index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pet_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                is_success INTEGER NOT NULL,
                occurred_at INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            "#
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pet_events table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pet_events_occurred_at ON pet_events(occurred_at)"
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pet_events timestamp index")?;

        Ok(())
    }

    async fn latest_stamp(&self) -> Result<Option<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT MAX(latest) FROM (
                SELECT MAX(occurred_at) AS latest FROM eat_events
                UNION ALL
                SELECT MAX(occurred_at) FROM pet_events
            )
            "#
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to read latest event timestamp")
    }

    fn stamp(&self) -> i64 {
        self.stamp_at(now_millis())
    }

    /// `now`, or the last stamp handed out if the clock went backwards.
    pub(crate) fn stamp_at(&self, now: i64) -> i64 {
        self.last_stamp.fetch_max(now, Ordering::SeqCst).max(now)
    }

    pub async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")
    }

    pub async fn count_foods(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM foods")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count foods")
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn cutoff_millis(window: Duration) -> i64 {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_sub(window_ms)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

fn eat_event((id, user_id, food_id, is_success, is_cat_fed, occurred_at): EatRow) -> EatEvent {
    EatEvent {
        id,
        user_id: UserId(user_id),
        food_id: FoodId(food_id),
        is_success,
        is_cat_fed,
        occurred_at: from_millis(occurred_at),
    }
}

fn pet_event((id, user_id, is_success, occurred_at): PetRow) -> PetEvent {
    PetEvent {
        id,
        user_id: UserId(user_id),
        is_success,
        occurred_at: from_millis(occurred_at),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    // Create-or-fetch is two autocommit statements; the UNIQUE constraint on `name`
    // keeps concurrent first use from producing duplicates.
    async fn find_or_create_user(&self, name: &str) -> Result<UserId> {
        sqlx::query("INSERT INTO users (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to insert user")?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch user")?;

        Ok(UserId(id))
    }

    async fn find_or_create_food(&self, name: &str, preferred_if_new: bool) -> Result<Food> {
        let inserted = sqlx::query(
            "INSERT INTO foods (name, preferred_by_cat) VALUES (?, ?) ON CONFLICT(name) DO NOTHING"
        )
        .bind(name)
        .bind(preferred_if_new)
        .execute(&self.pool)
        .await
        .context("Failed to insert food")?;

        let (id, food_name, preferred_by_cat): (i64, String, bool) = sqlx::query_as(
            "SELECT id, name, preferred_by_cat FROM foods WHERE name = ?"
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch food")?;

        if inserted.rows_affected() > 0 {
            tracing::debug!("New food '{}' (preferred: {})", food_name, preferred_by_cat);
        }
        Ok(Food { id: FoodId(id), name: food_name, preferred_by_cat })
    }

    async fn append_eat_event(
        &self,
        user: UserId,
        food: FoodId,
        is_success: bool,
        is_cat_fed: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO eat_events (user_id, food_id, is_success, is_cat_fed, occurred_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(user.0)
        .bind(food.0)
        .bind(is_success)
        .bind(is_cat_fed)
        .bind(self.stamp())
        .execute(&self.pool)
        .await
        .context("Failed to append eat event")?;
        Ok(())
    }

    async fn append_pet_event(&self, user: UserId, is_success: bool) -> Result<()> {
        sqlx::query("INSERT INTO pet_events (user_id, is_success, occurred_at) VALUES (?, ?, ?)")
            .bind(user.0)
            .bind(is_success)
            .bind(self.stamp())
            .execute(&self.pool)
            .await
            .context("Failed to append pet event")?;
        Ok(())
    }

    async fn eat_events_since(&self, window: Duration) -> Result<Vec<EatEvent>> {
        let rows: Vec<EatRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, food_id, is_success, is_cat_fed, occurred_at
            FROM eat_events
            WHERE occurred_at >= ?
            ORDER BY occurred_at DESC, id DESC
            "#
        )
        .bind(cutoff_millis(window))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query eat events")?;

        Ok(rows.into_iter().map(eat_event).collect())
    }

    async fn pet_success_flags_since(&self, window: Duration) -> Result<Vec<bool>> {
        sqlx::query_scalar(
            "SELECT is_success FROM pet_events WHERE occurred_at >= ? ORDER BY occurred_at DESC, id DESC"
        )
        .bind(cutoff_millis(window))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query pet flags")
    }

    async fn eat_events_for_user_since(&self, name: &str, window: Duration) -> Result<Vec<EatEvent>> {
        let rows: Vec<EatRow> = sqlx::query_as(
            r#"
            SELECT e.id, e.user_id, e.food_id, e.is_success, e.is_cat_fed, e.occurred_at
            FROM eat_events e
            JOIN users u ON u.id = e.user_id
            WHERE u.name = ? AND e.occurred_at >= ?
            ORDER BY e.occurred_at DESC, e.id DESC
            "#
        )
        .bind(name)
        .bind(cutoff_millis(window))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query eat events for user")?;

        Ok(rows.into_iter().map(eat_event).collect())
    }

    async fn pet_events_for_user_since(&self, name: &str, window: Duration) -> Result<Vec<PetEvent>> {
        let rows: Vec<PetRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.user_id, p.is_success, p.occurred_at
            FROM pet_events p
            JOIN users u ON u.id = p.user_id
            WHERE u.name = ? AND p.occurred_at >= ?
            ORDER BY p.occurred_at DESC, p.id DESC
            "#
        )
        .bind(name)
        .bind(cutoff_millis(window))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query pet events for user")?;

        Ok(rows.into_iter().map(pet_event).collect())
    }
}
