//! hiveorm — an embedded relational data layer.
//!
//! A typed schema builder, a tagged-template SQL composer, a query
//! analyzer, a declarative security/immutability gate, and a
//! snapshot-driven migration engine, layered over a pluggable SQL driver
//! (SQLite dialect). A host program declares [`schema::Table`]s and
//! [`schema::Column`]s; from that declaration the crate derives DDL, a
//! template-SQL query API ([`sql`]), a query-time authorization check
//! ([`security`]), and idempotent migrations between schema snapshots
//! ([`migration`]).
//!
//! The [`db::Database`] facade ties the pieces together: it holds the
//! connected [`driver::SqlDriver`] and the current [`security::Principal`],
//! and routes every statement through compose → parse → analyze →
//! authorize → dispatch.

pub mod db;
pub mod ddl;
pub mod driver;
pub mod error;
pub mod ident;
pub mod migration;
pub mod schema;
pub mod security;
pub mod sql;
pub mod value;

pub use db::Database;
pub use error::DbError;
pub use schema::{Column, Table};
pub use sql::{RawSql, SqlBuilder};
