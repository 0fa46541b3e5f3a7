// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::clock::format_timestamp;
use crate::db::models::{Quote, QuoteOfTheDay, DATE_FORMAT};
use crate::db::RepositoryError;
use crate::quotes::domain::*;
use crate::state::DbPool;

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn create(
        &self,
        author_id: i64,
        content: &str,
        is_anonymous: bool,
        now: NaiveDateTime,
    ) -> Result<QuoteDetail, RepositoryError>;

    async fn find(&self, id: i64) -> Result<Option<Quote>, RepositoryError>;

    /// Overwrite content and anonymity and bump `updated_at`.
    async fn update(
        &self,
        id: i64,
        content: &str,
        is_anonymous: bool,
        now: NaiveDateTime,
    ) -> Result<QuoteDetail, RepositoryError>;

    /// Every quote matching `listing`, plus the total count.
    async fn list(&self, listing: &QuoteListing) -> Result<Listing, RepositoryError>;

    /// Quotes tied for the most votes cast on `day`, counted for that day
    /// only. None when nobody voted that day.
    async fn quotes_of_the_day(
        &self,
        day: NaiveDate,
    ) -> Result<Option<QuotesOfTheDay>, RepositoryError>;

    /// Record the winner of `day` (lowest id among ties). Returns the new
    /// entry, or None if the day had no votes or was already recorded.
    async fn archive_day(
        &self,
        day: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Option<QuoteOfTheDay>, RepositoryError>;

    /// Recorded winners, newest day first.
    async fn archived(&self) -> Result<Vec<ArchivedQuote>, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteQuoteRepository {
    pool: DbPool,
}

impl SqliteQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<QuoteSummary> {
    let username: String = row.get(3)?;
    let is_anonymous: bool = row.get(4)?;
    Ok(QuoteSummary {
        id: row.get(0)?,
        content: row.get(1)?,
        author_id: row.get(2)?,
        author_name: display_name(&username, is_anonymous).to_string(),
        is_anonymous,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        vote_count: row.get(7)?,
    })
}

fn load_detail(conn: &Connection, id: i64) -> Result<Option<QuoteDetail>, RepositoryError> {
    let detail = conn
        .query_row(
            "SELECT q.id, q.content, q.author_id, u.username, q.is_anonymous,
                    q.created_at, q.updated_at
             FROM quotes q JOIN users u ON u.id = q.author_id
             WHERE q.id = ?1",
            params![id],
            |row| {
                Ok(QuoteDetail {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    is_anonymous: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(detail)
}

/// Summaries of `ids`, ascending by id, with votes counted within `scope`.
fn load_summaries(
    conn: &Connection,
    ids: &[i64],
    scope: VoteScope,
) -> Result<Vec<QuoteSummary>, RepositoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let (join, params) = vote_join(scope);
    // Ids are integers, so they are safe to inline
    let id_list = ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "{} {} WHERE q.id IN ({}) GROUP BY q.id ORDER BY q.id ASC",
        SUMMARY_SELECT, join, id_list
    );

    let mut stmt = conn.prepare(&sql)?;
    let quotes = stmt
        .query_map(params_from_iter(params.iter()), summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quotes)
}

#[async_trait]
impl QuoteRepository for SqliteQuoteRepository {
    async fn create(
        &self,
        author_id: i64,
        content: &str,
        is_anonymous: bool,
        now: NaiveDateTime,
    ) -> Result<QuoteDetail, RepositoryError> {
        let conn = self.pool.get()?;
        let stamp = format_timestamp(now);

        conn.execute(
            "INSERT INTO quotes (content, author_id, is_anonymous, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![content, author_id, is_anonymous, stamp],
        )?;
        let id = conn.last_insert_rowid();

        load_detail(&conn, id)?.ok_or(RepositoryError::NotFound)
    }

    async fn find(&self, id: i64) -> Result<Option<Quote>, RepositoryError> {
        let conn = self.pool.get()?;
        let quote = conn
            .query_row(
                "SELECT id, content, author_id, is_anonymous, created_at, updated_at
                 FROM quotes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Quote {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        author_id: row.get(2)?,
                        is_anonymous: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(quote)
    }

    async fn update(
        &self,
        id: i64,
        content: &str,
        is_anonymous: bool,
        now: NaiveDateTime,
    ) -> Result<QuoteDetail, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE quotes SET content = ?1, is_anonymous = ?2, updated_at = ?3 WHERE id = ?4",
            params![content, is_anonymous, format_timestamp(now), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound);
        }

        load_detail(&conn, id)?.ok_or(RepositoryError::NotFound)
    }

    async fn list(&self, listing: &QuoteListing) -> Result<Listing, RepositoryError> {
        let conn = self.pool.get()?;

        let count = listing.count_query();
        let total: i64 = conn.query_row(
            &count.sql,
            params_from_iter(count.params.iter()),
            |row| row.get(0),
        )?;

        let query = listing.listing_query();
        let mut stmt = conn.prepare(&query.sql)?;
        let quotes = stmt
            .query_map(params_from_iter(query.params.iter()), summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Listing { total, quotes })
    }

    async fn quotes_of_the_day(
        &self,
        day: NaiveDate,
    ) -> Result<Option<QuotesOfTheDay>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT quote_id, COUNT(*) FROM votes WHERE vote_date = ?1 GROUP BY quote_id",
        )?;
        let tallies = stmt
            .query_map(params![day.format(DATE_FORMAT).to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<(i64, i64)>, _>>()?;

        let Some(top) = top_voted(&tallies) else {
            return Ok(None);
        };

        let quotes = load_summaries(&conn, &top.quote_ids, VoteScope::Day(day))?;
        Ok(Some(QuotesOfTheDay {
            highest: top.count,
            quotes,
        }))
    }

    async fn archive_day(
        &self,
        day: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Option<QuoteOfTheDay>, RepositoryError> {
        let Some(winners) = self.quotes_of_the_day(day).await? else {
            return Ok(None);
        };
        let Some(winner) = winners.quotes.first() else {
            return Ok(None);
        };

        let conn = self.pool.get()?;
        let date = day.format(DATE_FORMAT).to_string();
        let created_at = format_timestamp(now);
        let rows = conn.execute(
            "INSERT INTO quote_of_the_day (quote_id, date, vote_count, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO NOTHING",
            params![winner.id, date, winners.highest, created_at],
        )?;
        if rows == 0 {
            return Ok(None);
        }

        Ok(Some(QuoteOfTheDay {
            id: conn.last_insert_rowid(),
            quote_id: winner.id,
            date,
            vote_count: winners.highest,
            created_at,
        }))
    }

    async fn archived(&self) -> Result<Vec<ArchivedQuote>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT a.date, a.vote_count, q.id, q.content, q.author_id, u.username, q.is_anonymous
             FROM quote_of_the_day a
             JOIN quotes q ON q.id = a.quote_id
             JOIN users u ON u.id = q.author_id
             ORDER BY a.date DESC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                let username: String = row.get(5)?;
                let is_anonymous: bool = row.get(6)?;
                Ok(ArchivedQuote {
                    date: row.get(0)?,
                    vote_count: row.get(1)?,
                    quote_id: row.get(2)?,
                    content: row.get(3)?,
                    author_id: row.get(4)?,
                    author_name: display_name(&username, is_anonymous).to_string(),
                    is_anonymous,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynQuoteRepository = Arc<dyn QuoteRepository>;
