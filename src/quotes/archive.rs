use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::clock::Clock;
use crate::db::RepositoryError;
use crate::quotes::repository::{DynQuoteRepository, QuoteRepository};

/// Archive the winner of the day before `clock`'s today. Safe to repeat.
pub async fn archive_previous_day(
    quotes: &DynQuoteRepository,
    clock: Clock,
) -> Result<(), RepositoryError> {
    archive_day_before(quotes, clock.now()).await
}

/// Archive the winner of the calendar day before `now`.
#[tracing::instrument(skip(quotes))]
pub async fn archive_day_before(
    quotes: &DynQuoteRepository,
    now: NaiveDateTime,
) -> Result<(), RepositoryError> {
    let Some(yesterday) = now.date().pred_opt() else {
        return Ok(());
    };

    match quotes.archive_day(yesterday, now).await? {
        Some(entry) => tracing::info!(
            date = %entry.date,
            quote_id = entry.quote_id,
            votes = entry.vote_count,
            "archived quote of the day"
        ),
        None => tracing::debug!(date = %yesterday, "nothing to archive"),
    }
    Ok(())
}

/// Run [`archive_previous_day`] now and then every `every`.
pub fn spawn_archiver(quotes: DynQuoteRepository, clock: Clock, every: Duration) -> JoinHandle<()> {
    tracing::info!("initialized quote of the day archiver");

    tokio::spawn(
        async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = archive_previous_day(&quotes, clock).await {
                    tracing::error!(err = ?e, "failed to archive quote of the day");
                }
            }
        }
        .in_current_span(),
    )
}
