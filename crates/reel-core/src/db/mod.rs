//! Local persistence layer for Reel

mod cache_repository;
mod connection;
mod migrations;
mod state_repository;
mod store;

pub use cache_repository::{CacheRepository, LibSqlCacheRepository};
pub use connection::Database;
pub use state_repository::{LibSqlStateRepository, StateRepository};
pub use store::LocalStore;
