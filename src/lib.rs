// Library exports for quotevote
// This allows integration tests to build the router in-process

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod quotes;
pub mod routes;
pub mod state;
pub mod users;
