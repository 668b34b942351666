pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod dates;
pub mod error;
pub mod expenses;
pub mod models;
pub mod money;
pub mod server;
pub mod settings;
pub mod statistics;
pub mod utils;
