pub mod aggregator;
pub mod auth;
pub mod composer;
pub mod config;
pub mod formatter;
pub mod models;
pub mod sink;
pub mod source;
pub mod table;
