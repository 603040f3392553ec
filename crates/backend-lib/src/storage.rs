// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Durable state: users, sessions, friendships, friend requests.
//!
//! Backed by a single-connection SQLite pool. One writer connection keeps
//! compound mutations (friend requests, accepts) serialized; everything that
//! touches more than one row runs inside a transaction.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A row in the users table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted login.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// In-memory database, used by the test suites.
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create the schema. Safe to run on every startup.
    pub async fn migrate(&self) -> Result<(), AppError> {
        let statements = [
            r"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME NOT NULL
            )",
            r"CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                expires_at DATETIME NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            r"CREATE TABLE IF NOT EXISTS friendships (
                user_id INTEGER NOT NULL,
                friend_id INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                PRIMARY KEY (user_id, friend_id),
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY(friend_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            r"CREATE TABLE IF NOT EXISTS friend_requests (
                requester_id INTEGER NOT NULL,
                receiver_id INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                PRIMARY KEY (requester_id, receiver_id),
                FOREIGN KEY(requester_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY(receiver_id) REFERENCES users(id) ON DELETE CASCADE
            )",
        ];

        let mut tx = self.pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ---- users ----

    /// Insert a new user, returning its id. Duplicate usernames map to
    /// `Conflict`.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<i64, AppError> {
        let result = sqlx::query("INSERT INTO users(username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::Conflict("user already exists".into()))
            },
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_password(&self, user_id: i64, new_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- sessions ----

    pub async fn create_session(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO sessions(token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(Utc::now())
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- friendships ----

    /// Insert both directed rows for a friendship pair. Idempotent.
    pub async fn add_friendship(&self, user_id: i64, friend_id: i64) -> Result<(), AppError> {
        if user_id == friend_id {
            return Err(AppError::InvalidInput("cannot friend yourself".into()));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO friendships(user_id, friend_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(friend_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO friendships(user_id, friend_id, created_at) VALUES (?, ?, ?)")
            .bind(friend_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// All friends of a user, ordered by username ascending.
    pub async fn list_friends(&self, user_id: i64) -> Result<Vec<User>, AppError> {
        let friends = sqlx::query_as::<_, User>(
            r"SELECT u.id, u.username, u.password_hash, u.created_at
              FROM friendships f
              JOIN users u ON u.id = f.friend_id
              WHERE f.user_id = ?
              ORDER BY u.username ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(friends)
    }

    pub async fn are_friends(&self, user_id: i64, friend_id: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM friendships WHERE user_id = ? AND friend_id = ?",
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    // ---- friend requests ----

    /// Store a pending request. Fails with `Conflict` if a request already
    /// exists in either direction or the pair is already friends.
    pub async fn create_friend_request(
        &self,
        requester_id: i64,
        receiver_id: i64,
    ) -> Result<(), AppError> {
        if requester_id == receiver_id {
            return Err(AppError::InvalidInput(
                "cannot send a friend request to yourself".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let friends: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM friendships WHERE user_id = ? AND friend_id = ?",
        )
        .bind(requester_id)
        .bind(receiver_id)
        .fetch_one(&mut *tx)
        .await?;
        if friends > 0 {
            return Err(AppError::Conflict("friend request already exists".into()));
        }

        let pending: i64 = sqlx::query_scalar(
            r"SELECT COUNT(1) FROM friend_requests
              WHERE (requester_id = ? AND receiver_id = ?)
                 OR (requester_id = ? AND receiver_id = ?)",
        )
        .bind(requester_id)
        .bind(receiver_id)
        .bind(receiver_id)
        .bind(requester_id)
        .fetch_one(&mut *tx)
        .await?;
        if pending > 0 {
            return Err(AppError::Conflict("friend request already exists".into()));
        }

        let inserted =
            sqlx::query("INSERT INTO friend_requests(requester_id, receiver_id, created_at) VALUES (?, ?, ?)")
                .bind(requester_id)
                .bind(receiver_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await;
        match inserted {
            Ok(_) => {},
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::Conflict("friend request already exists".into()))
            },
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove a pending request. A no-op when none exists.
    pub async fn delete_friend_request(
        &self,
        requester_id: i64,
        receiver_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM friend_requests WHERE requester_id = ? AND receiver_id = ?")
            .bind(requester_id)
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Users who have requested the given user, oldest request first.
    pub async fn list_incoming_friend_requests(&self, user_id: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r"SELECT u.id, u.username, u.password_hash, u.created_at
              FROM friend_requests fr
              JOIN users u ON u.id = fr.requester_id
              WHERE fr.receiver_id = ?
              ORDER BY fr.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Users the given user has requested, oldest request first.
    pub async fn list_outgoing_friend_requests(&self, user_id: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r"SELECT u.id, u.username, u.password_hash, u.created_at
              FROM friend_requests fr
              JOIN users u ON u.id = fr.receiver_id
              WHERE fr.requester_id = ?
              ORDER BY fr.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Atomically convert a pending request into a friendship. Fails with
    /// `NotFound` when the request is missing.
    pub async fn accept_friend_request(
        &self,
        requester_id: i64,
        receiver_id: i64,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted =
            sqlx::query("DELETE FROM friend_requests WHERE requester_id = ? AND receiver_id = ?")
                .bind(requester_id)
                .bind(receiver_id)
                .execute(&mut *tx)
                .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("friend request not found".into()));
        }

        let now = Utc::now();
        sqlx::query("INSERT OR IGNORE INTO friendships(user_id, friend_id, created_at) VALUES (?, ?, ?)")
            .bind(requester_id)
            .bind(receiver_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO friendships(user_id, friend_id, created_at) VALUES (?, ?, ?)")
            .bind(receiver_id)
            .bind(requester_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
