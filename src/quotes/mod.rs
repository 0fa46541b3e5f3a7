pub mod archive;
pub mod domain;
pub mod ledger;
pub mod repository;

pub use domain::{
    display_name, AuthorFilter, Direction, ListParams, QuoteListing, SortKey, VoteScope,
};
pub use ledger::{SqliteVoteLedger, VoteLedger};
pub use repository::{QuoteRepository, SqliteQuoteRepository};
