//! # SQLite query functions
//!
//! The low-level half of the SQLite backend: plain functions, one file per table family, each
//! taking a `&mut SqliteConnection`. A caller that needs atomicity opens a transaction in
//! `sqlite_impl` and threads it through every call; a single read borrows a pool connection and
//! calls the same function unchanged.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod channels;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod recharges;
pub mod skus;
pub mod wallets;

const SQLITE_DB_URL: &str = "sqlite://data/vendo_store.db";

pub fn db_url() -> String {
    match env::var("VENDO_DATABASE_URL") {
        Ok(url) => {
            info!("Using database URL: {url}");
            url
        },
        Err(_) => {
            info!("VENDO_DATABASE_URL is not set. Using the default, {SQLITE_DB_URL}");
            SQLITE_DB_URL.to_string()
        },
    }
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    SqlitePoolOptions::new().max_connections(max_connections).connect(url).await
}
