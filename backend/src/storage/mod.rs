//! # Storage Module
//!
//! Sqlite-backed persistence for the attendance engine. Repositories expose
//! pool-based queries for reads and `&mut SqliteConnection` methods for
//! writes so that services can group every externally invoked mutation into
//! a single transaction.

pub mod db;
pub mod repositories;

pub use db::DbConnection;
