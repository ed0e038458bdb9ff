//! SQL 查询模块
//!
//! 词法分析、解析以及关系查询的中间表示
//!
//! 主要特性:
//! - SELECT / INSERT / DELETE
//! - INNER JOIN 与 WHERE 中的隐式连接
//! - 聚合、GROUP BY、HAVING、ORDER BY、LIMIT/OFFSET
//! - UNION / INTERSECT / EXCEPT 组合查询
//! - 算术表达式与标量函数

mod ast;
mod expression;
mod lexer;
mod parser;

// 导出 AST 类型
pub use ast::{
    AggregateFunction, Attribute, ColumnComparison, Combination, CombinatorKind, CompareOp,
    Condition, ExpressionFilter, FilterCondition, InsertRows, JoinCondition, OrderItem, Query,
    QueryKind, SelectItem, TableRef, Value,
};

// 导出表达式
pub use expression::{parse_expression, render_literal, scalar_function, ArithOp, ExprNode};

// 导出词法分析器
pub use lexer::{tokenize, Token, TokenKind};

// 导出解析器
pub use parser::{parse, Clause, SqlParser};
