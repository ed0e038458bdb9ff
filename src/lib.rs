//! relgraph - 用 SQL 查询 RDF 图数据
//!
//! 从 RDF 三元组推断虚拟关系模式，并把 SQL 翻译成 SPARQL：
//! - 表 = rdf:type，列 = 谓词，`subject` 列 = 实体 IRI
//! - SELECT / JOIN / 聚合 / GROUP BY / HAVING / ORDER BY / LIMIT
//! - UNION / INTERSECT / EXCEPT 组合查询
//! - INSERT DATA 与带类型守卫的 DELETE
//!
//! ```no_run
//! use relgraph::{Converter, EmptyCatalog};
//! use std::sync::Arc;
//!
//! let converter = Converter::new(Arc::new(EmptyCatalog));
//! let sparql = converter.convert("SELECT name FROM client WHERE age >= 18")?;
//! # Ok::<(), relgraph::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod import;
pub mod metrics;
pub mod query;
pub mod schema;
pub mod server;
pub mod sparql;
pub mod types;

// 重导出常用类型
pub use config::{ConverterConfig, EntityIdGenerator, SequentialGenerator, UuidGenerator};
pub use convert::Converter;
pub use error::{Error, Result};
pub use schema::{Catalog, EmptyCatalog, InferredCatalog, MappedCatalog};
pub use sparql::GraphQuery;
pub use types::{Iri, Literal, RdfTriple, Term, Variable};

use std::sync::Arc;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert one statement against a catalog with the default configuration
pub fn convert(sql: &str, catalog: Arc<dyn Catalog>) -> Result<String> {
    Converter::new(catalog).convert(sql)
}
