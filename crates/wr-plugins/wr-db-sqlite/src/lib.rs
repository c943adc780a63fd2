//! # wr-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `wr-core` domain models, and hosts the atomic state
//! transitions (claim CAS, mint, reset, adjudication).
//!
//! Concurrency notes: the claim path is an optimistic compare-and-swap on
//! the word's price inside a single transaction, so it stays correct when
//! several processes share the database file. Escalation uses the same
//! trick on `moderation_status IS NULL`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use wr_core::error::{AppError, Result};
use wr_core::models::{
    AdjudicationTransition, AvailabilityFilter, ClaimTransition, IncomeStats, ModerationStatus,
    PlatformStats, Report, ResetTransition, Transaction, ViewedWord, Word, WordPage, WordQuery,
    WordSnapshot, WordView,
};
use wr_core::traits::{ModerationLog, WordLedger};

/// Executed in order on startup; every statement is idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS words (
        id BLOB PRIMARY KEY,
        text TEXT NOT NULL UNIQUE,
        price TEXT NOT NULL,
        owner_name TEXT,
        owner_message TEXT,
        lockout_ends_at TEXT,
        moderation_status TEXT,
        moderated_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_words_lockout_ends_at ON words(lockout_ends_at)",
    "CREATE INDEX IF NOT EXISTS idx_words_moderation_status ON words(moderation_status)",
    "CREATE TABLE IF NOT EXISTS transactions (
        id BLOB PRIMARY KEY,
        word_id BLOB NOT NULL REFERENCES words(id),
        buyer_name TEXT NOT NULL,
        price_paid TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        is_admin_action INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_transactions_word_id ON transactions(word_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp)",
    "CREATE TABLE IF NOT EXISTS message_reports (
        id BLOB PRIMARY KEY,
        word_id BLOB NOT NULL REFERENCES words(id),
        ip_address TEXT,
        timestamp TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_message_reports_word_id ON message_reports(word_id)",
    "CREATE TABLE IF NOT EXISTS word_views (
        id BLOB PRIMARY KEY,
        word_id BLOB NOT NULL REFERENCES words(id),
        ip_address TEXT,
        timestamp TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_word_views_word_id ON word_views(word_id)",
    "CREATE INDEX IF NOT EXISTS idx_word_views_timestamp ON word_views(timestamp)",
];

pub struct SqliteWordStore {
    pool: SqlitePool,
}

// Helpers for UUID / Decimal column mapping
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

/// Prices are stored as canonical two-decimal TEXT ("51.00"), which keeps
/// the claim CAS an exact string equality.
fn price_to_text(price: Decimal) -> String {
    let mut price = price.round_dp(2);
    price.rescale(2);
    price.to_string()
}

fn text_to_price(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap_or_default()
}

fn db_err(err: sqlx::Error) -> AppError {
    AppError::Internal(format!("database error: {err}"))
}

fn map_word(row: &SqliteRow) -> Word {
    Word {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        text: row.get("text"),
        price: text_to_price(&row.get::<String, _>("price")),
        owner_name: row.get("owner_name"),
        owner_message: row.get("owner_message"),
        lockout_ends_at: row.get("lockout_ends_at"),
        moderation_status: ModerationStatus::from_db(
            row.get::<Option<String>, _>("moderation_status").as_deref(),
        ),
        moderated_at: row.get("moderated_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_snapshot(row: &SqliteRow) -> WordSnapshot {
    WordSnapshot {
        word: map_word(row),
        report_count: row.get("report_count"),
    }
}

fn map_transaction(row: &SqliteRow) -> Transaction {
    Transaction {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        word_id: blob_to_uuid(row.get::<Vec<u8>, _>("word_id").as_slice()),
        buyer_name: row.get("buyer_name"),
        price_paid: text_to_price(&row.get::<String, _>("price_paid")),
        timestamp: row.get("timestamp"),
        is_admin_action: row.get("is_admin_action"),
    }
}

/// Correlated subquery attached to word selects so read paths get the
/// live report count alongside the row.
const REPORT_COUNT_COLUMN: &str =
    "(SELECT COUNT(*) FROM message_reports r WHERE r.word_id = words.id) AS report_count";

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    receipt: &Transaction,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO transactions (id, word_id, buyer_name, price_paid, timestamp, is_admin_action)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(receipt.id))
    .bind(uuid_to_blob(receipt.word_id))
    .bind(&receipt.buyer_name)
    .bind(price_to_text(receipt.price_paid))
    .bind(receipt.timestamp)
    .bind(receipt.is_admin_action)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

impl SqliteWordStore {
    /// Opens (creating if missing) the database and applies the schema.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Single-connection in-memory store. A pooled `sqlite::memory:` would
    /// hand every connection its own empty database, so tests use this.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl WordLedger for SqliteWordStore {
    async fn find_word(&self, text: &str) -> Result<Option<Word>> {
        let row = sqlx::query("SELECT * FROM words WHERE text = ?")
            .bind(text)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| map_word(&row)))
    }

    async fn find_word_by_id(&self, id: Uuid) -> Result<Option<Word>> {
        let row = sqlx::query("SELECT * FROM words WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| map_word(&row)))
    }

    async fn word_snapshot(&self, text: &str) -> Result<Option<WordSnapshot>> {
        let sql = format!("SELECT words.*, {REPORT_COUNT_COLUMN} FROM words WHERE text = ?");
        let row = sqlx::query(&sql)
            .bind(text)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| map_snapshot(&row)))
    }

    /// Atomic operation to create a word and its mint transaction.
    ///
    /// The UNIQUE constraint on `text` is the authority on duplicates:
    /// a race between two mints resolves here, not in any pre-check.
    async fn mint_word(&self, word: &Word, receipt: &Transaction) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let inserted = sqlx::query(
            "INSERT INTO words (id, text, price, owner_name, owner_message, lockout_ends_at,
                                moderation_status, moderated_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(word.id))
        .bind(&word.text)
        .bind(price_to_text(word.price))
        .bind(word.owner_name.as_deref())
        .bind(word.owner_message.as_deref())
        .bind(word.lockout_ends_at)
        .bind(word.moderation_status.as_db())
        .bind(word.moderated_at)
        .bind(word.created_at)
        .bind(word.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            return Err(match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict(format!("word '{}' already exists", word.text))
                }
                _ => db_err(err),
            });
        }

        insert_transaction(&mut tx, receipt).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Compare-and-swap claim: the UPDATE only lands while the price still
    /// equals what the engine read. A fresh owner message also wipes the
    /// previous message's moderation slate and report rows.
    async fn apply_claim(&self, claim: &ClaimTransition, receipt: &Transaction) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            "UPDATE words
             SET price = ?, owner_name = ?, owner_message = ?, lockout_ends_at = ?,
                 moderation_status = NULL, moderated_at = NULL, updated_at = ?
             WHERE id = ? AND price = ?",
        )
        .bind(price_to_text(claim.new_price))
        .bind(&claim.owner_name)
        .bind(&claim.owner_message)
        .bind(claim.lockout_ends_at)
        .bind(claim.updated_at)
        .bind(uuid_to_blob(claim.word_id))
        .bind(price_to_text(claim.expected_price))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM message_reports WHERE word_id = ?")
            .bind(uuid_to_blob(claim.word_id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        insert_transaction(&mut tx, receipt).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn apply_reset(&self, reset: &ResetTransition, receipt: &Transaction) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            "UPDATE words
             SET price = ?, owner_name = ?, owner_message = ?, lockout_ends_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(price_to_text(reset.new_price))
        .bind(reset.owner_name.as_deref())
        .bind(reset.owner_message.as_deref())
        .bind(reset.lockout_ends_at)
        .bind(reset.updated_at)
        .bind(uuid_to_blob(reset.word_id))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(AppError::NotFound(
                "word".to_string(),
                reset.word_id.to_string(),
            ));
        }

        insert_transaction(&mut tx, receipt).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn transactions_for(&self, word_id: Uuid) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE word_id = ? ORDER BY timestamp DESC",
        )
        .bind(uuid_to_blob(word_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(map_transaction).collect())
    }

    async fn recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE is_admin_action = 0
             ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(map_transaction).collect())
    }

    async fn search_words(&self, query: &WordQuery) -> Result<WordPage> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, 100);
        let like = query
            .text
            .as_ref()
            .map(|q| format!("%{}%", q.to_lowercase()));
        let now = Utc::now();

        let mut conditions: Vec<&str> = Vec::new();
        if like.is_some() {
            conditions.push("text LIKE ?");
        }
        // These clauses mirror wr_core::util::is_available exactly.
        match query.status {
            AvailabilityFilter::Available => {
                conditions.push("(lockout_ends_at IS NULL OR lockout_ends_at <= ?)")
            }
            AvailabilityFilter::Locked => {
                conditions.push("(lockout_ends_at IS NOT NULL AND lockout_ends_at > ?)")
            }
            AvailabilityFilter::All => {}
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM words{where_clause}");
        let mut count_query = sqlx::query(&count_sql);
        if let Some(like) = &like {
            count_query = count_query.bind(like);
        }
        if query.status != AvailabilityFilter::All {
            count_query = count_query.bind(now);
        }
        let total: i64 = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("total");

        let select_sql = format!(
            "SELECT words.*, {REPORT_COUNT_COLUMN} FROM words{where_clause}
             ORDER BY text LIMIT ? OFFSET ?"
        );
        let mut select_query = sqlx::query(&select_sql);
        if let Some(like) = &like {
            select_query = select_query.bind(like);
        }
        if query.status != AvailabilityFilter::All {
            select_query = select_query.bind(now);
        }
        let rows = select_query
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(WordPage {
            words: rows.iter().map(map_snapshot).collect(),
            total,
            page,
            page_size,
        })
    }

    async fn random_word(
        &self,
        available_only: bool,
        base_price_only: bool,
    ) -> Result<Option<WordSnapshot>> {
        let mut conditions: Vec<&str> = Vec::new();
        if available_only {
            conditions.push("(lockout_ends_at IS NULL OR lockout_ends_at <= ?)");
        }
        if base_price_only {
            conditions.push("price = ?");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT words.*, {REPORT_COUNT_COLUMN} FROM words{where_clause}
             ORDER BY RANDOM() LIMIT 1"
        );

        let mut random_query = sqlx::query(&sql);
        if available_only {
            random_query = random_query.bind(Utc::now());
        }
        if base_price_only {
            random_query = random_query.bind(price_to_text(Decimal::ONE));
        }
        let row = random_query
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|row| map_snapshot(&row)))
    }

    async fn most_expensive(&self, limit: i64) -> Result<Vec<WordSnapshot>> {
        let sql = format!(
            "SELECT words.*, {REPORT_COUNT_COLUMN} FROM words
             ORDER BY CAST(price AS REAL) DESC, text LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(map_snapshot).collect())
    }

    async fn platform_stats(&self) -> Result<PlatformStats> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM words) AS total_words,
                (SELECT COUNT(*) FROM words
                    WHERE lockout_ends_at IS NOT NULL AND lockout_ends_at > ?) AS words_owned,
                (SELECT COUNT(*) FROM transactions WHERE is_admin_action = 0) AS total_transactions,
                (SELECT COALESCE(SUM(CAST(price_paid AS REAL)), 0.0) FROM transactions
                    WHERE is_admin_action = 0) AS total_revenue,
                (SELECT COALESCE(AVG(CAST(price AS REAL)), 0.0) FROM words) AS average_price",
        )
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let total_words: i64 = row.get("total_words");
        let words_owned: i64 = row.get("words_owned");
        Ok(PlatformStats {
            total_words,
            words_owned,
            words_available: total_words - words_owned,
            total_transactions: row.get("total_transactions"),
            total_revenue: row.get("total_revenue"),
            average_price: row.get("average_price"),
        })
    }

    async fn income_stats(&self) -> Result<IncomeStats> {
        let now = Utc::now();
        let today_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now);
        let week_start = now - Duration::days(7);

        let row = sqlx::query(
            "SELECT
                (SELECT COALESCE(SUM(CAST(price_paid AS REAL)), 0.0) FROM transactions
                    WHERE is_admin_action = 0) AS total_income,
                (SELECT COALESCE(SUM(CAST(price_paid AS REAL)), 0.0) FROM transactions
                    WHERE is_admin_action = 0 AND timestamp >= ?) AS today_income,
                (SELECT COALESCE(SUM(CAST(price_paid AS REAL)), 0.0) FROM transactions
                    WHERE is_admin_action = 0 AND timestamp >= ?) AS week_income,
                (SELECT COUNT(*) FROM transactions WHERE is_admin_action = 0) AS total_transactions,
                (SELECT COUNT(*) FROM transactions
                    WHERE is_admin_action = 0 AND timestamp >= ?) AS today_transactions,
                (SELECT COUNT(*) FROM transactions
                    WHERE is_admin_action = 0 AND timestamp >= ?) AS week_transactions",
        )
        .bind(today_start)
        .bind(week_start)
        .bind(today_start)
        .bind(week_start)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(IncomeStats {
            total_income: row.get("total_income"),
            today_income: row.get("today_income"),
            week_income: row.get("week_income"),
            total_transactions: row.get("total_transactions"),
            today_transactions: row.get("today_transactions"),
            week_transactions: row.get("week_transactions"),
        })
    }

    async fn record_view(&self, view: &WordView) -> Result<()> {
        sqlx::query(
            "INSERT INTO word_views (id, word_id, ip_address, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(view.id))
        .bind(uuid_to_blob(view.word_id))
        .bind(view.ip_address.as_deref())
        .bind(view.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn most_viewed(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ViewedWord>> {
        let rows = sqlx::query(
            "SELECT words.text AS word, words.price AS price, words.owner_name AS owner,
                    COUNT(word_views.id) AS views
             FROM words
             JOIN word_views ON word_views.word_id = words.id
             WHERE word_views.timestamp >= ?
             GROUP BY words.id
             ORDER BY views DESC
             LIMIT ?",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| ViewedWord {
                word: row.get("word"),
                price: text_to_price(&row.get::<String, _>("price")),
                owner: row.get("owner"),
                views: row.get("views"),
            })
            .collect())
    }
}

#[async_trait]
impl ModerationLog for SqliteWordStore {
    async fn append_report(&self, report: &Report) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO message_reports (id, word_id, ip_address, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(report.id))
        .bind(uuid_to_blob(report.word_id))
        .bind(report.ip_address.as_deref())
        .bind(report.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let count: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM message_reports WHERE word_id = ?")
                .bind(uuid_to_blob(report.word_id))
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?
                .get("total");

        tx.commit().await.map_err(db_err)?;
        Ok(count)
    }

    async fn report_count(&self, word_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM message_reports WHERE word_id = ?")
            .bind(uuid_to_blob(word_id))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get("total"))
    }

    async fn escalate_if_unset(&self, word_id: Uuid) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE words SET moderation_status = 'pending', updated_at = ?
             WHERE id = ? AND moderation_status IS NULL",
        )
        .bind(Utc::now())
        .bind(uuid_to_blob(word_id))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(updated.rows_affected() > 0)
    }

    async fn apply_adjudication(&self, adjudication: &AdjudicationTransition) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if adjudication.purge_reports {
            sqlx::query("DELETE FROM message_reports WHERE word_id = ?")
                .bind(uuid_to_blob(adjudication.word_id))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let updated = match adjudication.new_lockout_ends_at {
            Some(ends_at) => {
                sqlx::query(
                    "UPDATE words
                     SET moderation_status = ?, moderated_at = ?, lockout_ends_at = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(adjudication.status.as_db())
                .bind(adjudication.moderated_at)
                .bind(ends_at)
                .bind(adjudication.updated_at)
                .bind(uuid_to_blob(adjudication.word_id))
                .execute(&mut *tx)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE words
                     SET moderation_status = ?, moderated_at = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(adjudication.status.as_db())
                .bind(adjudication.moderated_at)
                .bind(adjudication.updated_at)
                .bind(uuid_to_blob(adjudication.word_id))
                .execute(&mut *tx)
                .await
            }
        }
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Err(AppError::NotFound(
                "word".to_string(),
                adjudication.word_id.to_string(),
            ));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wr_core::content_gate::{ContentGate, GatePolicy};
    use wr_core::error::AppError;
    use wr_core::moderation::ModerationEngine;
    use wr_core::ownership::OwnershipEngine;
    use wr_core::traits::{ContentClassifier, ToxicityScores};

    const TEST_THRESHOLD: i64 = 3;

    struct QuietClassifier;

    #[async_trait]
    impl ContentClassifier for QuietClassifier {
        async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
            Ok(ToxicityScores::default())
        }
    }

    async fn engines() -> (Arc<SqliteWordStore>, OwnershipEngine, ModerationEngine) {
        let store = Arc::new(SqliteWordStore::in_memory().await.unwrap());
        let gate = ContentGate::new(Arc::new(QuietClassifier), GatePolicy::default());
        let ownership = OwnershipEngine::new(store.clone(), gate);
        let moderation = ModerationEngine::new(store.clone(), store.clone(), TEST_THRESHOLD);
        (store, ownership, moderation)
    }

    /// Inserts an unowned word directly, bypassing the mint price.
    async fn seed_word(store: &SqliteWordStore, text: &str, price: &str) -> Uuid {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query("INSERT INTO words (id, text, price, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(id))
            .bind(text)
            .bind(price)
            .bind(now)
            .bind(now)
            .execute(&store.pool)
            .await
            .unwrap();
        id
    }

    /// Inserts a word whose lockout has lapsed but whose last owner's
    /// message is still attached.
    async fn seed_stale_owned_word(store: &SqliteWordStore, text: &str, price: &str) -> Uuid {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO words (id, text, price, owner_name, owner_message, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(id))
        .bind(text)
        .bind(price)
        .bind("previous owner")
        .bind("old message")
        .bind(now)
        .bind(now)
        .execute(&store.pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn mint_creates_word_at_fixed_price() {
        let (store, ownership, _) = engines().await;

        let (word, receipt) = ownership.mint("Hello", "Ada", "first!").await.unwrap();
        assert_eq!(word.text, "hello");
        assert_eq!(word.price, Decimal::new(5100, 2));
        assert_eq!(receipt.price_paid, Decimal::new(5000, 2));
        assert!(!receipt.is_admin_action);

        let remaining = word.lockout_ends_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(49 * 60 + 59));
        assert!(remaining <= Duration::hours(50));

        let stored = store.find_word("hello").await.unwrap().unwrap();
        assert_eq!(stored.owner_name.as_deref(), Some("Ada"));
        assert_eq!(store.transactions_for(word.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn minting_existing_word_conflicts() {
        let (_, ownership, _) = engines().await;
        ownership.mint("hello", "Ada", "first!").await.unwrap();
        let err = ownership.mint("HELLO", "Bob", "mine").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn mint_rejects_non_alphabetic_words() {
        let (_, ownership, _) = engines().await;
        let err = ownership.mint("abc123", "Ada", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn claim_raises_price_and_starts_lockout() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "echo", "1.00").await;

        let (word, receipt) = ownership.claim("Echo", "Grace", "mine now").await.unwrap();
        assert_eq!(word.price, Decimal::new(200, 2));
        assert_eq!(receipt.price_paid, Decimal::new(100, 2));

        let remaining = word.lockout_ends_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(59));
        assert!(remaining <= Duration::minutes(61));

        let stored = store.find_word("echo").await.unwrap().unwrap();
        assert_eq!(stored.owner_name.as_deref(), Some("Grace"));
        assert_eq!(stored.owner_message.as_deref(), Some("mine now"));
        assert_eq!(stored.price, Decimal::new(200, 2));

        let log = store.transactions_for(word.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(!log[0].is_admin_action);
    }

    #[tokio::test]
    async fn claiming_a_locked_word_reports_remaining_time() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "echo", "1.00").await;

        ownership.claim("echo", "Grace", "mine now").await.unwrap();
        let err = ownership.claim("echo", "Alan", "no, mine").await.unwrap_err();
        assert!(matches!(err, AppError::Locked { .. }));
    }

    #[tokio::test]
    async fn concurrent_claims_admit_exactly_one_buyer() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "echo", "1.00").await;

        let (first, second) = tokio::join!(
            ownership.claim("echo", "Grace", "mine"),
            ownership.claim("echo", "Alan", "no, mine"),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let err = outcomes.iter().find(|r| r.is_err()).unwrap().as_ref().unwrap_err();
        assert!(matches!(err, AppError::Locked { .. } | AppError::Conflict(_)));

        // One word update, one transaction: the loser left no trace.
        let stored = store.find_word("echo").await.unwrap().unwrap();
        assert_eq!(stored.price, Decimal::new(200, 2));
        assert_eq!(store.transactions_for(stored.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claiming_an_unknown_word_is_not_found() {
        let (_, ownership, _) = engines().await;
        let err = ownership.claim("ghost", "Grace", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn claim_wipes_previous_moderation_slate() {
        let (store, ownership, moderation) = engines().await;
        let id = seed_stale_owned_word(&store, "kilo", "1.00").await;

        for _ in 0..TEST_THRESHOLD {
            moderation.report(id, None).await.unwrap();
        }
        let flagged = store.find_word_by_id(id).await.unwrap().unwrap();
        assert_eq!(flagged.moderation_status, ModerationStatus::Pending);

        ownership.claim("kilo", "Grace", "fresh message").await.unwrap();
        let reclaimed = store.find_word_by_id(id).await.unwrap().unwrap();
        assert_eq!(reclaimed.moderation_status, ModerationStatus::Unset);
        assert!(reclaimed.moderated_at.is_none());
        assert_eq!(store.report_count(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn admin_reset_clears_ownership_and_is_excluded_from_revenue() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "tango", "1.00").await;
        ownership.claim("tango", "Grace", "mine").await.unwrap();

        let word = ownership
            .administrative_reset("tango", Decimal::new(1000, 2), None, None)
            .await
            .unwrap();
        assert_eq!(word.price, Decimal::new(1000, 2));
        assert!(word.owner_name.is_none());
        assert!(word.owner_message.is_none());
        assert!(word.lockout_ends_at.is_none());

        let log = store.transactions_for(word.id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().any(|t| t.is_admin_action && t.buyer_name == "ADMIN_RESET"));

        // Revenue and counts only see the real purchase.
        let income = store.income_stats().await.unwrap();
        assert!((income.total_income - 1.0).abs() < f64::EPSILON);
        assert_eq!(income.total_transactions, 1);
        let stats = store.platform_stats().await.unwrap();
        assert_eq!(stats.total_transactions, 1);
        assert!((stats.total_revenue - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn admin_reset_with_owner_sets_lockout_from_new_price() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "tango", "1.00").await;

        let word = ownership
            .administrative_reset("tango", Decimal::new(1000, 2), Some("Staff"), Some("reserved"))
            .await
            .unwrap();
        assert_eq!(word.owner_name.as_deref(), Some("Staff"));
        let remaining = word.lockout_ends_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(9 * 60 + 59));
        assert!(remaining <= Duration::hours(10));

        let log = store.transactions_for(word.id).await.unwrap();
        assert_eq!(log[0].buyer_name, "Staff");
        assert!(log[0].is_admin_action);
    }

    #[tokio::test]
    async fn reports_escalate_exactly_at_the_threshold() {
        let (store, ownership, moderation) = engines().await;
        let (word, _) = ownership.mint("november", "Ada", "fine message").await.unwrap();

        for expected in 1..TEST_THRESHOLD {
            let outcome = moderation.report(word.id, None).await.unwrap();
            assert_eq!(outcome.report_count, expected);
            assert!(!outcome.escalated);
            let current = store.find_word_by_id(word.id).await.unwrap().unwrap();
            assert_eq!(current.moderation_status, ModerationStatus::Unset);
        }

        let outcome = moderation.report(word.id, None).await.unwrap();
        assert_eq!(outcome.report_count, TEST_THRESHOLD);
        assert!(outcome.escalated);
        let current = store.find_word_by_id(word.id).await.unwrap().unwrap();
        assert_eq!(current.moderation_status, ModerationStatus::Pending);

        // Escalation is one-way: further reports accumulate quietly.
        let outcome = moderation.report(word.id, None).await.unwrap();
        assert_eq!(outcome.report_count, TEST_THRESHOLD + 1);
        assert!(!outcome.escalated);
    }

    #[tokio::test]
    async fn reporting_a_word_without_message_is_rejected() {
        let (store, _, moderation) = engines().await;
        let id = seed_word(&store, "bare", "1.00").await;
        let err = moderation.report(id, None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn protect_purges_reports_and_restarts_counting() {
        let (store, ownership, moderation) = engines().await;
        let (word, _) = ownership.mint("oscar", "Ada", "fine message").await.unwrap();

        moderation.report(word.id, Some("digest-a".into())).await.unwrap();
        moderation.report(word.id, Some("digest-b".into())).await.unwrap();

        let protected = moderation.adjudicate(word.id, "protect").await.unwrap();
        assert_eq!(protected.moderation_status, ModerationStatus::Protected);
        assert!(protected.moderated_at.is_some());
        assert_eq!(store.report_count(word.id).await.unwrap(), 0);

        // Protected words shrug off further reports.
        let outcome = moderation.report(word.id, None).await.unwrap();
        assert_eq!(outcome.report_count, 0);
        assert!(!outcome.escalated);
    }

    #[tokio::test]
    async fn protect_extends_an_active_lockout_from_the_last_price_paid() {
        let (store, ownership, moderation) = engines().await;
        seed_word(&store, "zulu", "2.00").await;
        let (word, _) = ownership.claim("zulu", "Grace", "mine").await.unwrap();

        let protected = moderation.adjudicate(word.id, "protect").await.unwrap();
        // price is now 3.00, so the countdown restarts at 3.00 - 1 hours.
        let remaining = protected.lockout_ends_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(119));
        assert!(remaining <= Duration::minutes(121));

        let stored = store.find_word_by_id(word.id).await.unwrap().unwrap();
        assert_eq!(stored.lockout_ends_at, protected.lockout_ends_at);
    }

    #[tokio::test]
    async fn adjudication_controls_message_visibility() {
        let (store, ownership, moderation) = engines().await;
        let (word, _) = ownership.mint("papa", "Ada", "fine message").await.unwrap();

        let rejected = moderation.adjudicate(word.id, "reject").await.unwrap();
        assert!(moderation.visible_message(&rejected, 0).is_none());

        let approved = moderation.adjudicate(word.id, "approve").await.unwrap();
        assert_eq!(
            moderation.visible_message(&approved, TEST_THRESHOLD + 5),
            Some("fine message")
        );

        let err = moderation.adjudicate(word.id, "banish").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAction(_)));
        let stored = store.find_word_by_id(word.id).await.unwrap().unwrap();
        assert_eq!(stored.moderation_status, ModerationStatus::Approved);
    }

    #[tokio::test]
    async fn snapshots_carry_the_live_report_count() {
        let (store, ownership, moderation) = engines().await;
        let (word, _) = ownership.mint("quebec", "Ada", "fine message").await.unwrap();
        moderation.report(word.id, None).await.unwrap();

        let snapshot = store.word_snapshot("quebec").await.unwrap().unwrap();
        assert_eq!(snapshot.report_count, 1);
        assert_eq!(snapshot.word.id, word.id);
    }

    #[tokio::test]
    async fn search_filters_by_availability() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "alpha", "1.00").await;
        ownership.mint("beta", "Ada", "locked for 50h").await.unwrap();

        let available = store
            .search_words(&WordQuery {
                status: AvailabilityFilter::Available,
                page: 1,
                page_size: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(available.total, 1);
        assert_eq!(available.words[0].word.text, "alpha");

        let locked = store
            .search_words(&WordQuery {
                status: AvailabilityFilter::Locked,
                page: 1,
                page_size: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(locked.total, 1);
        assert_eq!(locked.words[0].word.text, "beta");

        let matched = store
            .search_words(&WordQuery {
                text: Some("ALP".to_string()),
                page: 1,
                page_size: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(matched.total, 1);
        assert_eq!(matched.words[0].word.text, "alpha");
    }

    #[tokio::test]
    async fn random_word_respects_its_filters() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "gamma", "1.00").await;
        ownership.mint("delta", "Ada", "locked").await.unwrap();

        let pick = store.random_word(true, true).await.unwrap().unwrap();
        assert_eq!(pick.word.text, "gamma");

        assert!(store.random_word(false, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn leaderboards_order_and_filter() {
        let (store, ownership, _) = engines().await;
        seed_word(&store, "alpha", "1.00").await;
        ownership.mint("beta", "Ada", "expensive").await.unwrap();
        ownership.claim("alpha", "Grace", "cheap").await.unwrap();
        ownership
            .administrative_reset("alpha", Decimal::new(9900, 2), None, None)
            .await
            .unwrap();

        let expensive = store.most_expensive(10).await.unwrap();
        assert_eq!(expensive[0].word.text, "alpha"); // 99.00 after reset
        assert_eq!(expensive[1].word.text, "beta");

        let recent = store.recent_transactions(10).await.unwrap();
        assert_eq!(recent.len(), 2); // the reset is invisible here
        assert!(recent.iter().all(|t| !t.is_admin_action));
    }

    #[tokio::test]
    async fn view_counts_aggregate_per_word() {
        let (store, ownership, _) = engines().await;
        let (word, _) = ownership.mint("sierra", "Ada", "hi").await.unwrap();

        for _ in 0..3 {
            store
                .record_view(&WordView {
                    id: Uuid::now_v7(),
                    word_id: word.id,
                    ip_address: None,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }

        let viewed = store
            .most_viewed(Utc::now() - Duration::days(30), 10)
            .await
            .unwrap();
        assert_eq!(viewed.len(), 1);
        assert_eq!(viewed[0].word, "sierra");
        assert_eq!(viewed[0].views, 3);
    }
}
