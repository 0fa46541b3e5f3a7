use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::quotes::domain::{normalize_content, ListParams, QuoteDetail, QuoteListing};
use crate::quotes::{QuoteRepository, VoteLedger};
use crate::state::AppState;

// --- Request bodies ---

#[derive(Deserialize)]
pub struct QuoteInput {
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/today", get(todays_votes))
        .route("/quotes/qotd", get(quote_of_the_day))
        .route("/quotes/qotd/history", get(quote_of_the_day_history))
        .route("/quotes/{id}", put(update_quote))
        .route("/quotes/{id}/vote", post(vote_quote))
}

// --- Handlers ---

async fn create_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<QuoteInput>,
) -> AppResult<Json<QuoteDetail>> {
    let content = normalize_content(&input.content)?;
    let quote = state
        .quotes
        .create(user.id, &content, input.is_anonymous, state.clock.now())
        .await?;
    tracing::info!(quote_id = quote.id, author_id = user.id, "created quote");
    Ok(Json(quote))
}

async fn list_quotes(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<Value>> {
    let listing = QuoteListing::from_params(&params, state.clock.today())?;
    let result = state.quotes.list(&listing).await?;

    Ok(Json(json!({
        "status": 200,
        "message": "Quotes fetched successfully",
        "totalItems": result.total,
        "data": result.quotes,
    })))
}

async fn update_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    body: Result<ApiJson<QuoteInput>, AppError>,
) -> AppResult<Json<QuoteDetail>> {
    // 404 and 403 take precedence over a malformed body
    let quote = state.quotes.find(id).await?.ok_or(AppError::NotFound)?;
    if quote.author_id != user.id {
        return Err(AppError::Forbidden(
            "You are not the author of this quote".into(),
        ));
    }

    let ApiJson(input) = body?;
    let content = normalize_content(&input.content)?;
    let updated = state
        .quotes
        .update(id, &content, input.is_anonymous, state.clock.now())
        .await?;
    Ok(Json(updated))
}

async fn vote_quote(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(quote_id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    let vote = state
        .votes
        .record(user.id, quote_id, state.clock.now())
        .await?;
    tracing::info!(
        quote_id,
        voter_id = user.id,
        vote_date = %vote.vote_date,
        "recorded vote"
    );
    Ok(Json(json!({ "message": "Voted successfully" })))
}

async fn todays_votes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Value>> {
    let votes = state.votes.cast_on(user.id, state.clock.today()).await?;

    let message = if votes.is_empty() {
        "You haven't voted today yet"
    } else {
        "Today's votes fetched successfully"
    };
    Ok(Json(json!({
        "status": 200,
        "message": message,
        "data": votes,
    })))
}

async fn quote_of_the_day(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let body = match state.quotes.quotes_of_the_day(state.clock.today()).await? {
        Some(winners) => json!({
            "status": 200,
            "message": "Quote(s) of the Day fetched successfully",
            "highestVote": winners.highest,
            "totalQuotes": winners.quotes.len(),
            "data": winners.quotes,
        }),
        None => json!({
            "status": 200,
            "message": "No quotes have been voted today",
            "data": [],
        }),
    };
    Ok(Json(body))
}

async fn quote_of_the_day_history(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let history = state.quotes.archived().await?;
    Ok(Json(json!({
        "status": 200,
        "message": "Quote of the Day history fetched successfully",
        "totalItems": history.len(),
        "data": history,
    })))
}
