pub mod add;
pub mod common;
pub mod config;
pub mod discover;
pub mod export;
pub mod import;
pub mod status;
pub mod sync;
pub mod watch;
