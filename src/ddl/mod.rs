//! DDL (Data Definition Language) rendering (C8)
//!
//! This crate's DDL surface is SQLite-only; `sqlite::SqliteRenderer` is the
//! sole renderer and the one the migration diff engine (C9) calls through.

pub mod sqlite;

pub use sqlite::SqliteRenderer;
