// Query composition and vote aggregation. Pure: no connections, no clock.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::db::models::DATE_FORMAT;

/// Display name shown in place of the author of an anonymous quote.
pub const ANONYMOUS: &str = "Anonymous";

/// Longest quote accepted on create or update, in characters.
pub const MAX_QUOTE_CHARS: usize = 1000;

pub fn display_name(username: &str, is_anonymous: bool) -> &str {
    if is_anonymous {
        ANONYMOUS
    } else {
        username
    }
}

/// Trim and bound quote text.
pub fn normalize_content(raw: &str) -> Result<String, InputError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(InputError::InvalidContent(
            "Quote content cannot be empty".into(),
        ));
    }
    if content.chars().count() > MAX_QUOTE_CHARS {
        return Err(InputError::InvalidContent(format!(
            "Quote content must be {} characters or less",
            MAX_QUOTE_CHARS
        )));
    }
    Ok(content.to_string())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid sort '{0}', expected votes, name or updated_at")]
    InvalidSort(String),

    #[error("Invalid direction '{0}', expected asc or desc")]
    InvalidDirection(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("{0}")]
    InvalidContent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Votes,
    Name,
    UpdatedAt,
}

impl FromStr for SortKey {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "votes" => Ok(SortKey::Votes),
            "name" => Ok(SortKey::Name),
            "updated_at" => Ok(SortKey::UpdatedAt),
            other => Err(InputError::InvalidSort(other.to_string())),
        }
    }
}

impl SortKey {
    fn column(&self) -> &'static str {
        match self {
            SortKey::Votes => "vote_points",
            SortKey::Name => "u.username",
            SortKey::UpdatedAt => "q.updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Direction {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(InputError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "ASC"),
            Direction::Desc => write!(f, "DESC"),
        }
    }
}

/// Restriction on who wrote a quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorFilter {
    /// Only quotes flagged anonymous.
    Anonymous,
    /// Non-anonymous quotes whose author's username contains the text.
    Named(String),
}

impl AuthorFilter {
    /// `anonymous` in any case is reserved and never matched as a name.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            None
        } else if raw.eq_ignore_ascii_case("anonymous") {
            Some(AuthorFilter::Anonymous)
        } else {
            Some(AuthorFilter::Named(raw.to_string()))
        }
    }
}

/// Which votes count toward a quote's tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteScope {
    /// Every vote ever cast for the quote.
    Lifetime,
    /// Only votes dated on the given day.
    Day(NaiveDate),
}

/// Raw query string of `GET /quotes`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search_content: Option<String>,
    pub search_author: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub date: Option<String>,
}

/// A validated quote listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteListing {
    pub date: NaiveDate,
    pub content: Option<String>,
    pub author: Option<AuthorFilter>,
    pub sort: SortKey,
    pub direction: Direction,
}

/// SQL text plus its positional parameters, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl QuoteListing {
    pub fn for_day(date: NaiveDate) -> Self {
        Self {
            date,
            content: None,
            author: None,
            sort: SortKey::default(),
            direction: Direction::default(),
        }
    }

    /// Validate query parameters. Absent or empty values take their defaults;
    /// the day defaults to `today`.
    pub fn from_params(params: &ListParams, today: NaiveDate) -> Result<Self, InputError> {
        let sort = non_empty(&params.sort)
            .map(str::parse::<SortKey>)
            .transpose()?
            .unwrap_or_default();
        let direction = non_empty(&params.direction)
            .map(str::parse::<Direction>)
            .transpose()?
            .unwrap_or_default();
        let date = match non_empty(&params.date) {
            Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| InputError::InvalidDate(raw.to_string()))?,
            None => today,
        };

        Ok(Self {
            date,
            content: non_empty(&params.search_content).map(str::to_string),
            author: params.search_author.as_deref().and_then(AuthorFilter::parse),
            sort,
            direction,
        })
    }

    /// WHERE clause shared by the listing and its count, so both see the
    /// same rows. Expects `quotes q JOIN users u`.
    fn filters(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["date(q.created_at) = ?".to_string()];
        let mut params = vec![self.date.format(DATE_FORMAT).to_string()];

        if let Some(ref text) = self.content {
            clauses.push("fold(q.content) LIKE fold(?) ESCAPE '\\'".to_string());
            params.push(contains_pattern(text));
        }

        match self.author {
            Some(AuthorFilter::Anonymous) => {
                clauses.push("q.is_anonymous = 1".to_string());
            }
            Some(AuthorFilter::Named(ref name)) => {
                clauses.push("q.is_anonymous = 0".to_string());
                clauses.push("fold(u.username) LIKE fold(?) ESCAPE '\\'".to_string());
                params.push(contains_pattern(name));
            }
            None => {}
        }

        (clauses.join(" AND "), params)
    }

    /// Matching quotes with author name and lifetime vote tally, in order.
    /// Ties on the sort key fall back to quote id ascending.
    pub fn listing_query(&self) -> BuiltQuery {
        let (join, mut params) = vote_join(VoteScope::Lifetime);
        let (filters, filter_params) = self.filters();
        params.extend(filter_params);

        let sql = format!(
            "{} {} WHERE {} GROUP BY q.id ORDER BY {} {}, q.id ASC",
            SUMMARY_SELECT,
            join,
            filters,
            self.sort.column(),
            self.direction
        );

        BuiltQuery { sql, params }
    }

    /// Number of matching quotes. No vote join, so no fan-out.
    pub fn count_query(&self) -> BuiltQuery {
        let (filters, params) = self.filters();
        let sql = format!(
            "SELECT COUNT(*) FROM quotes q JOIN users u ON u.id = q.author_id WHERE {}",
            filters
        );
        BuiltQuery { sql, params }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Column list read by `QuoteSummary` row mapping.
pub(crate) const SUMMARY_SELECT: &str = "SELECT q.id, q.content, q.author_id, u.username, \
     q.is_anonymous, q.created_at, q.updated_at, COUNT(v.id) AS vote_points \
     FROM quotes q JOIN users u ON u.id = q.author_id";

/// LEFT JOIN of votes restricted to `scope`, with its parameters.
pub(crate) fn vote_join(scope: VoteScope) -> (String, Vec<String>) {
    match scope {
        VoteScope::Lifetime => (
            "LEFT JOIN votes v ON v.quote_id = q.id".to_string(),
            Vec::new(),
        ),
        VoteScope::Day(day) => (
            "LEFT JOIN votes v ON v.quote_id = q.id AND v.vote_date = ?".to_string(),
            vec![day.format(DATE_FORMAT).to_string()],
        ),
    }
}

/// `%text%` LIKE pattern with wildcards in `text` matched literally.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Listing entry: a quote as other users see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteSummary {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    #[serde(rename = "authorName")]
    pub author_name: String,
    pub is_anonymous: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(rename = "vote_points")]
    pub vote_count: i64,
}

/// A quote as returned to its author after create or update. Carries the
/// real username even when the quote is anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteDetail {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    #[serde(rename = "isanonymous")]
    pub is_anonymous: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub total: i64,
    pub quotes: Vec<QuoteSummary>,
}

/// Winning tally of a day and every quote that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopVoted {
    pub count: i64,
    pub quote_ids: Vec<i64>,
}

/// Pick the maximum tally from `(quote_id, count)` pairs and keep every quote
/// tied at it, ids ascending. None when nothing was voted.
pub fn top_voted(tallies: &[(i64, i64)]) -> Option<TopVoted> {
    let count = tallies.iter().map(|&(_, n)| n).max().filter(|&n| n > 0)?;
    let mut quote_ids: Vec<i64> = tallies
        .iter()
        .filter(|&&(_, n)| n == count)
        .map(|&(id, _)| id)
        .collect();
    quote_ids.sort_unstable();
    Some(TopVoted { count, quote_ids })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotesOfTheDay {
    pub highest: i64,
    pub quotes: Vec<QuoteSummary>,
}

/// A past day's recorded winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedQuote {
    pub date: String,
    #[serde(rename = "vote_points")]
    pub vote_count: i64,
    pub quote_id: i64,
    pub content: String,
    pub author_id: i64,
    #[serde(rename = "authorName")]
    pub author_name: String,
    pub is_anonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn params() -> ListParams {
        ListParams::default()
    }

    #[test]
    fn anonymous_quotes_hide_author() {
        assert_eq!(display_name("alice", false), "alice");
        assert_eq!(display_name("alice", true), "Anonymous");
    }

    #[test]
    fn empty_params_take_defaults() {
        let listing = QuoteListing::from_params(&params(), day()).unwrap();
        assert_eq!(listing, QuoteListing::for_day(day()));
        assert_eq!(listing.sort, SortKey::Votes);
        assert_eq!(listing.direction, Direction::Desc);
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let raw = ListParams {
            search_content: Some(String::new()),
            search_author: Some(String::new()),
            sort: Some(String::new()),
            direction: Some(String::new()),
            date: Some(String::new()),
        };
        let listing = QuoteListing::from_params(&raw, day()).unwrap();
        assert_eq!(listing, QuoteListing::for_day(day()));
    }

    #[test]
    fn parses_every_param() {
        let raw = ListParams {
            search_content: Some("curious".into()),
            search_author: Some("ali".into()),
            sort: Some("updated_at".into()),
            direction: Some("ASC".into()),
            date: Some("2026-01-02".into()),
        };
        let listing = QuoteListing::from_params(&raw, day()).unwrap();
        assert_eq!(listing.content.as_deref(), Some("curious"));
        assert_eq!(listing.author, Some(AuthorFilter::Named("ali".into())));
        assert_eq!(listing.sort, SortKey::UpdatedAt);
        assert_eq!(listing.direction, Direction::Asc);
        assert_eq!(listing.date, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn rejects_unknown_sort_direction_and_date() {
        let mut raw = params();
        raw.sort = Some("popularity".into());
        assert_eq!(
            QuoteListing::from_params(&raw, day()),
            Err(InputError::InvalidSort("popularity".into()))
        );

        let mut raw = params();
        raw.direction = Some("desc; DROP TABLE quotes".into());
        assert!(matches!(
            QuoteListing::from_params(&raw, day()),
            Err(InputError::InvalidDirection(_))
        ));

        let mut raw = params();
        raw.date = Some("16/10/2026".into());
        assert!(matches!(
            QuoteListing::from_params(&raw, day()),
            Err(InputError::InvalidDate(_))
        ));
    }

    #[test]
    fn anonymous_author_token_is_case_insensitive() {
        assert_eq!(AuthorFilter::parse("anonymous"), Some(AuthorFilter::Anonymous));
        assert_eq!(AuthorFilter::parse("AnOnYmOuS"), Some(AuthorFilter::Anonymous));
        assert_eq!(
            AuthorFilter::parse("anon"),
            Some(AuthorFilter::Named("anon".into()))
        );
        assert_eq!(AuthorFilter::parse(""), None);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("stay"), "%stay%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[test]
    fn listing_query_always_filters_by_day() {
        let query = QuoteListing::for_day(day()).listing_query();
        assert!(query.sql.contains("date(q.created_at) = ?"));
        assert_eq!(query.params, vec!["2026-10-16".to_string()]);
        assert!(query
            .sql
            .ends_with("GROUP BY q.id ORDER BY vote_points DESC, q.id ASC"));
    }

    #[test]
    fn named_author_filter_excludes_anonymous() {
        let mut listing = QuoteListing::for_day(day());
        listing.author = Some(AuthorFilter::Named("ali".into()));
        let query = listing.count_query();
        assert!(query.sql.contains("q.is_anonymous = 0"));
        assert!(query.sql.contains("fold(u.username) LIKE fold(?)"));
        assert_eq!(query.params, vec!["2026-10-16".to_string(), "%ali%".into()]);
    }

    #[test]
    fn anonymous_filter_binds_no_name() {
        let mut listing = QuoteListing::for_day(day());
        listing.author = Some(AuthorFilter::Anonymous);
        let query = listing.count_query();
        assert!(query.sql.contains("q.is_anonymous = 1"));
        assert!(!query.sql.contains("u.username"));
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn count_query_has_no_vote_join() {
        let mut listing = QuoteListing::for_day(day());
        listing.content = Some("x".into());
        let count = listing.count_query();
        assert!(!count.sql.contains("votes"));
        assert!(!count.sql.contains("GROUP BY"));
        // Listing and count bind the same filter values
        assert_eq!(listing.listing_query().params, count.params);
    }

    #[test]
    fn sort_keys_map_to_columns() {
        let mut listing = QuoteListing::for_day(day());
        listing.sort = SortKey::Name;
        listing.direction = Direction::Asc;
        assert!(listing
            .listing_query()
            .sql
            .ends_with("ORDER BY u.username ASC, q.id ASC"));

        listing.sort = SortKey::UpdatedAt;
        assert!(listing
            .listing_query()
            .sql
            .ends_with("ORDER BY q.updated_at ASC, q.id ASC"));
    }

    #[test]
    fn day_scoped_vote_join_binds_date() {
        let (join, params) = vote_join(VoteScope::Day(day()));
        assert!(join.contains("v.vote_date = ?"));
        assert_eq!(params, vec!["2026-10-16".to_string()]);
        let (join, params) = vote_join(VoteScope::Lifetime);
        assert!(!join.contains("vote_date"));
        assert!(params.is_empty());
    }

    #[test]
    fn top_voted_keeps_every_tie() {
        let top = top_voted(&[(3, 2), (1, 5), (7, 5), (4, 1)]).unwrap();
        assert_eq!(top.count, 5);
        assert_eq!(top.quote_ids, vec![1, 7]);
    }

    #[test]
    fn top_voted_of_nothing_is_none() {
        assert_eq!(top_voted(&[]), None);
        assert_eq!(top_voted(&[(1, 0)]), None);
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(normalize_content("  Stay curious \n").unwrap(), "Stay curious");
        assert!(normalize_content("   ").is_err());
        assert!(normalize_content(&"x".repeat(MAX_QUOTE_CHARS)).is_ok());
        assert!(normalize_content(&"x".repeat(MAX_QUOTE_CHARS + 1)).is_err());
    }
}
