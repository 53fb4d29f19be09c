pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod pdi;
pub mod reports;
pub mod scope;
pub mod server;
pub mod stock;
