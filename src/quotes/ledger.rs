use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::params;
use serde::Serialize;
use std::sync::Arc;

use crate::clock::format_timestamp;
use crate::db::models::{Vote, DATE_FORMAT};
use crate::db::{is_foreign_key_violation, is_unique_violation, RepositoryError};
use crate::state::DbPool;

/// A vote the caller cast, with the quote it went to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CastVote {
    pub id: i64,
    pub quote_id: i64,
    pub quote_content: String,
    pub is_anonymous: bool,
    pub vote_date: String,
}

/// One ballot per voter per calendar day.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Cast `voter_id`'s vote for the day of `now`.
    ///
    /// Fails with `NotFound` for an unknown quote and `AlreadyVoted` when the
    /// voter already has a vote that day, whichever quote it went to.
    async fn record(
        &self,
        voter_id: i64,
        quote_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vote, RepositoryError>;

    async fn cast_on(&self, voter_id: i64, day: NaiveDate)
        -> Result<Vec<CastVote>, RepositoryError>;
}

pub struct SqliteVoteLedger {
    pool: DbPool,
}

impl SqliteVoteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteLedger for SqliteVoteLedger {
    async fn record(
        &self,
        voter_id: i64,
        quote_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vote, RepositoryError> {
        let conn = self.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM quotes WHERE id = ?1",
            params![quote_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let vote_date = now.date().format(DATE_FORMAT).to_string();
        let cast_at = format_timestamp(now);

        // The (voter_id, vote_date) unique index makes this the only check
        let inserted = conn.execute(
            "INSERT INTO votes (quote_id, voter_id, is_anonymous, vote_date, cast_at)
             VALUES (?1, ?2, 0, ?3, ?4)",
            params![quote_id, voter_id, vote_date, cast_at],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(RepositoryError::AlreadyVoted),
            Err(e) if is_foreign_key_violation(&e) => return Err(RepositoryError::NotFound),
            Err(e) => return Err(e.into()),
        }

        Ok(Vote {
            id: conn.last_insert_rowid(),
            quote_id,
            voter_id,
            is_anonymous: false,
            vote_date,
            cast_at,
        })
    }

    async fn cast_on(
        &self,
        voter_id: i64,
        day: NaiveDate,
    ) -> Result<Vec<CastVote>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT v.id, v.quote_id, q.content, v.is_anonymous, v.vote_date
             FROM votes v JOIN quotes q ON q.id = v.quote_id
             WHERE v.voter_id = ?1 AND v.vote_date = ?2
             ORDER BY v.id",
        )?;
        let votes = stmt
            .query_map(
                params![voter_id, day.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(CastVote {
                        id: row.get(0)?,
                        quote_id: row.get(1)?,
                        quote_content: row.get(2)?,
                        is_anonymous: row.get(3)?,
                        vote_date: row.get(4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(votes)
    }
}

pub type DynVoteLedger = Arc<dyn VoteLedger>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn at(d: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    struct Fixture {
        ledger: SqliteVoteLedger,
        pool: DbPool,
        voter: i64,
        quotes: Vec<i64>,
    }

    fn fixture() -> Fixture {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at)
             VALUES ('alice', 'x', '2026-10-01 00:00:00')",
            [],
        )
        .unwrap();
        let voter = conn.last_insert_rowid();

        let mut quotes = Vec::new();
        for content in ["First", "Second"] {
            conn.execute(
                "INSERT INTO quotes (content, author_id, created_at, updated_at)
                 VALUES (?1, ?2, '2026-10-16 08:00:00', '2026-10-16 08:00:00')",
                params![content, voter],
            )
            .unwrap();
            quotes.push(conn.last_insert_rowid());
        }
        drop(conn);

        Fixture {
            ledger: SqliteVoteLedger::new(pool.clone()),
            pool,
            voter,
            quotes,
        }
    }

    fn vote_count(pool: &DbPool) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn records_vote_with_calendar_day() {
        let f = fixture();
        let vote = f.ledger.record(f.voter, f.quotes[0], at(16, 13)).await.unwrap();
        assert_eq!(vote.vote_date, "2026-10-16");
        assert_eq!(vote.cast_at, "2026-10-16 13:00:00");
        assert!(!vote.is_anonymous);
        assert_eq!(vote_count(&f.pool), 1);
    }

    #[tokio::test]
    async fn second_vote_same_day_is_rejected_for_any_quote() {
        let f = fixture();
        f.ledger.record(f.voter, f.quotes[0], at(16, 9)).await.unwrap();

        let same = f.ledger.record(f.voter, f.quotes[0], at(16, 10)).await;
        assert!(matches!(same, Err(RepositoryError::AlreadyVoted)));
        let other = f.ledger.record(f.voter, f.quotes[1], at(16, 23)).await;
        assert!(matches!(other, Err(RepositoryError::AlreadyVoted)));
        assert_eq!(vote_count(&f.pool), 1);
    }

    #[tokio::test]
    async fn next_day_allows_a_new_vote() {
        let f = fixture();
        f.ledger.record(f.voter, f.quotes[0], at(16, 23)).await.unwrap();
        f.ledger.record(f.voter, f.quotes[0], at(17, 0)).await.unwrap();
        assert_eq!(vote_count(&f.pool), 2);
    }

    #[tokio::test]
    async fn unknown_quote_is_not_found() {
        let f = fixture();
        let result = f.ledger.record(f.voter, 999, at(16, 9)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert_eq!(vote_count(&f.pool), 0);
    }

    #[tokio::test]
    async fn cast_on_lists_only_that_day() {
        let f = fixture();
        f.ledger.record(f.voter, f.quotes[0], at(15, 9)).await.unwrap();
        f.ledger.record(f.voter, f.quotes[1], at(16, 9)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let votes = f.ledger.cast_on(f.voter, day).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].quote_id, f.quotes[1]);
        assert_eq!(votes[0].quote_content, "Second");
        assert_eq!(votes[0].vote_date, "2026-10-16");

        let empty = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert!(f.ledger.cast_on(f.voter, empty).await.unwrap().is_empty());
    }
}
