pub mod analytics;
pub mod chat;
pub mod config;
pub mod errors;
pub mod export;
pub mod fetcher;
pub mod market;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod scheduler;
pub mod store;
pub mod table;
pub mod validate;
pub mod weather;
