pub mod api;
pub mod browser;
pub mod caption;
pub mod config;
pub mod extract;
pub mod models;
pub mod query;
pub mod scrape;
pub mod upload;
