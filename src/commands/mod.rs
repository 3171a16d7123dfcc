// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports the tables, export and import commands

pub mod export;
pub mod import;
pub mod tables;

pub use export::export;
pub use import::import;
pub use tables::tables;
