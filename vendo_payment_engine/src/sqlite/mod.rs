//! SQLite backend for the settlement, wallet and stock traits.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
