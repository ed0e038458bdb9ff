//! SPARQL 输出模块
//!
//! 图模式查询的类型化模型与规范文本序列化

mod model;
mod serializer;

pub use model::{
    Expr, GraphQuery, GroupPattern, OrderCondition, PatternElement, Projection, SelectQuery,
    TriplePattern,
};
pub use serializer::{serialize, Serializer};
