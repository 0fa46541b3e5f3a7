use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::token::TokenService;
use crate::clock::Clock;
use crate::config::Config;
use crate::quotes::ledger::{DynVoteLedger, SqliteVoteLedger};
use crate::quotes::repository::{DynQuoteRepository, SqliteQuoteRepository};
use crate::users::{DynUserRepository, SqliteUserRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub clock: Clock,
    pub tokens: TokenService,
    pub users: DynUserRepository,
    pub quotes: DynQuoteRepository,
    pub votes: DynVoteLedger,
}

impl AppState {
    /// Wire the SQLite repositories over `db`.
    pub fn new(db: DbPool, config: Config, tokens: TokenService) -> Self {
        Self {
            clock: config.clock.timezone,
            config,
            tokens,
            users: Arc::new(SqliteUserRepository::new(db.clone())),
            quotes: Arc::new(SqliteQuoteRepository::new(db.clone())),
            votes: Arc::new(SqliteVoteLedger::new(db)),
        }
    }
}
