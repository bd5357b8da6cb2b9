//! Schema snapshot generator for mssql-schema-export tests.
//!
//! Produces deterministic snapshot documents (the same JSON shape the exporter's
//! snapshot catalog reads) with random foreign-key graphs, optional reference
//! cycles, stored procedures and views.
//!
//! # Example
//!
//! ```rust
//! use test_schema_gen::{Generator, Scale};
//!
//! let mut gen = Generator::new(42, Scale::Small.config());
//! let schema = gen.generate("Shop");
//! let json = schema.to_json().unwrap();
//! assert!(json.contains("\"database\": \"Shop\""));
//! ```

pub mod generator;
pub mod model;

pub use generator::{GenConfig, Generator, Scale};
pub use model::{Column, ForeignKey, GeneratedSchema, Index, IndexColumn, Module, Name, Table};
