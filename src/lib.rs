// ABOUTME: Library module for data-explorer
// ABOUTME: Exports the catalog, export and import engines for use in binary and tests

pub mod catalog;
pub mod coercion;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod explorer;
pub mod export;
pub mod filters;
pub mod import;
pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod utils;

pub use error::{ExplorerError, Result};
