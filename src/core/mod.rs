pub mod config;
pub mod dedup;
pub mod differ;
pub mod loader;
pub mod output;
pub mod progress;
