pub mod app;
pub mod cache;
pub mod change;
pub mod config;
pub mod consolidate;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod http;
pub mod matcher;
pub mod normalize;
pub mod output;
pub mod providers;
pub mod rank;
pub mod search;
pub mod source;
pub mod standings;
pub mod store;
