//! 模式目录模块
//!
//! 从 RDF 数据推断虚拟关系模式，并提供表/列到类型/谓词 IRI 的解析

mod catalog;
mod inference;
mod mapping;

pub use catalog::{
    attribute_name_for, table_name_for, title_case, Catalog, EmptyCatalog, HandleResolver,
    JoinEdge, SUBJECT_COLUMN,
};
pub use inference::{InferredCatalog, TableSchema};
pub use mapping::{JoinMapping, MappedCatalog};
