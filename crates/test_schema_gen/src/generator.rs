//! Random schema generation.
//!
//! Table `i` may only reference tables created before it, so a generated graph
//! is acyclic unless back references are requested. Table names are shuffled so
//! creation order never lines up with name order.

use crate::model::{Column, ForeignKey, GeneratedSchema, Index, IndexColumn, Module, Name, Table};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SCHEMAS: &[&str] = &["dbo", "sales", "hr"];

const WORDS: &[&str] = &[
    "Account", "Address", "Audit", "Batch", "Category", "Customer", "Invoice", "Item",
    "Ledger", "Order", "Payment", "Product", "Region", "Shipment", "Supplier", "Warehouse",
];

/// Generation scale presets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// 12 tables
    Small,
    /// 80 tables
    Medium,
    /// 600 tables
    Large,
}

impl Scale {
    pub fn config(&self) -> GenConfig {
        match self {
            Scale::Small => GenConfig {
                tables: 12,
                max_references: 2,
                back_references: 0,
                stored_procedures: 3,
                views: 2,
            },
            Scale::Medium => GenConfig {
                tables: 80,
                max_references: 3,
                back_references: 0,
                stored_procedures: 20,
                views: 10,
            },
            Scale::Large => GenConfig {
                tables: 600,
                max_references: 4,
                back_references: 0,
                stored_procedures: 100,
                views: 50,
            },
        }
    }
}

impl std::str::FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" | "s" => Ok(Scale::Small),
            "medium" | "m" => Ok(Scale::Medium),
            "large" | "l" => Ok(Scale::Large),
            _ => Err(format!("Unknown scale: {}. Use small, medium, or large", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenConfig {
    pub tables: usize,
    /// Upper bound on foreign keys per table
    pub max_references: usize,
    /// Foreign keys pointing at a table created later; these may close cycles
    pub back_references: usize,
    pub stored_procedures: usize,
    pub views: usize,
}

impl GenConfig {
    pub fn with_back_references(mut self, count: usize) -> Self {
        self.back_references = count;
        self
    }
}

pub struct Generator {
    rng: ChaCha8Rng,
    config: GenConfig,
}

impl Generator {
    pub fn new(seed: u64, config: GenConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    pub fn generate(&mut self, database: &str) -> GeneratedSchema {
        let names = self.table_names();
        let mut tables: Vec<Table> = names.iter().map(|n| base_table(n.clone())).collect();

        for i in 1..tables.len() {
            let count = self.rng.random_range(0..=self.config.max_references.min(i));
            for _ in 0..count {
                let target = self.rng.random_range(0..i);
                let referenced = tables[target].name.clone();
                add_reference(&mut tables[i], &referenced);
            }
        }

        if tables.len() > 1 {
            for _ in 0..self.config.back_references {
                let from = self.rng.random_range(0..tables.len() - 1);
                let to = self.rng.random_range(from + 1..tables.len());
                let referenced = tables[to].name.clone();
                add_reference(&mut tables[from], &referenced);
            }
        }

        let mut stored_procedures = Vec::new();
        let mut views = Vec::new();
        if !tables.is_empty() {
            for i in 0..self.config.stored_procedures {
                let table = &tables[self.rng.random_range(0..tables.len())];
                stored_procedures.push(procedure(i, table));
            }
            for i in 0..self.config.views {
                let table = &tables[self.rng.random_range(0..tables.len())];
                views.push(view(i, table));
            }
        }

        GeneratedSchema {
            database: database.to_string(),
            tables,
            stored_procedures,
            views,
        }
    }

    /// Unique names in creation order, shuffled against name order
    fn table_names(&mut self) -> Vec<Name> {
        let mut names: Vec<Name> = (0..self.config.tables)
            .map(|i| {
                let schema = SCHEMAS[i % SCHEMAS.len()];
                let word = WORDS[i % WORDS.len()];
                Name::new(schema, &format!("{}{:03}", word, i))
            })
            .collect();
        names.shuffle(&mut self.rng);
        names
    }
}

fn base_table(name: Name) -> Table {
    let id = format!("{}Id", name.name);
    Table {
        columns: vec![
            Column {
                name: id.clone(),
                type_name: "int".to_string(),
                max_length: 4,
                is_nullable: false,
            },
            Column {
                name: "Name".to_string(),
                type_name: "nvarchar".to_string(),
                max_length: 200,
                is_nullable: true,
            },
        ],
        indexes: vec![Index {
            name: format!("PK_{}", name.name),
            kind: "primary_key",
            clustered: true,
            is_unique: true,
            columns: vec![IndexColumn { name: id }],
        }],
        foreign_keys: Vec::new(),
        name,
    }
}

fn add_reference(table: &mut Table, referenced: &Name) {
    let column = format!("Ref{}_{}", table.foreign_keys.len(), referenced.name);
    table.columns.push(Column {
        name: column.clone(),
        type_name: "int".to_string(),
        max_length: 4,
        is_nullable: true,
    });
    table.foreign_keys.push(ForeignKey {
        name: format!("FK_{}_{}_{}", table.name.name, referenced.name, table.foreign_keys.len()),
        columns: vec![column],
        referenced_table: referenced.clone(),
        referenced_columns: vec![format!("{}Id", referenced.name)],
    });
}

fn procedure(i: usize, table: &Table) -> Module {
    let name = Name::new("dbo", &format!("usp_Get{:03}", i));
    Module {
        definition: format!(
            "CREATE PROCEDURE {}\n    @Id int\nAS\nBEGIN\n    SET NOCOUNT ON;\n    SELECT * FROM {} WHERE [{}Id] = @Id;\nEND\n",
            name, table.name, table.name.name
        ),
        name,
    }
}

fn view(i: usize, table: &Table) -> Module {
    let name = Name::new("dbo", &format!("vw_List{:03}", i));
    Module {
        definition: format!(
            "CREATE VIEW {}\nAS\nSELECT [{}Id], [Name] FROM {};\n",
            name, table.name.name, table.name
        ),
        name,
    }
}
