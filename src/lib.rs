//! Export the schema of a SQL Server database into one deterministic T-SQL
//! script: tables in dependency order, then stored procedures, then views.

pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod mssql;
pub mod schema;
pub mod script;
pub mod writer;
