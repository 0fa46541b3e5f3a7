use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::clock::format_timestamp;
use crate::db::models::User;
use crate::db::{is_unique_violation, RepositoryError};
use crate::state::DbPool;

/// Credential store: usernames and their password hashes.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> Result<User, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;
        let created_at = format_timestamp(now);

        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("username '{}' is already taken", username))
            } else {
                e.into()
            }
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

pub type DynUserRepository = Arc<dyn UserRepository>;
