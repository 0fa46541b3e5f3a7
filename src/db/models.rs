use serde::{Deserialize, Serialize};

/// Text layout of every timestamp column. SQLite's `date()` reads it directly.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text layout of calendar-day columns and the `date` query parameter.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub is_anonymous: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub quote_id: i64,
    pub voter_id: i64,
    pub is_anonymous: bool,
    pub vote_date: String,
    pub cast_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteOfTheDay {
    pub id: i64,
    pub quote_id: i64,
    pub date: String,
    pub vote_count: i64,
    pub created_at: String,
}
