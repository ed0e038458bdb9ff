//! Relational query AST
//!
//! Intermediate form produced by the SQL parser and consumed by the
//! converters. One `Query` is built per conversion and discarded afterwards.

use crate::query::expression::ExprNode;
use indexmap::IndexMap;
use std::fmt;

// ============================================================================
// Query (Top-Level)
// ============================================================================

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Delete,
}

/// Relational query in intermediate form
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    /// SELECT DISTINCT
    pub distinct: bool,
    /// `SELECT *`; expanded against the catalog during conversion
    pub select_all: bool,
    pub projection: Vec<SelectItem>,
    /// Source relations in FROM/JOIN order
    pub from: Vec<TableRef>,
    pub joins: Vec<JoinCondition>,
    /// Row filters in source order
    pub conditions: Vec<Condition>,
    pub group_by: Vec<Attribute>,
    /// Post-aggregation filters, combined with AND
    pub having: Vec<FilterCondition>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// UNION / INTERSECT / EXCEPT of two branches
    pub combination: Option<Combination>,
    /// INSERT/DELETE target relation
    pub target: Option<String>,
    pub insert_rows: Option<InsertRows>,
}

impl Query {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            distinct: false,
            select_all: false,
            projection: Vec::new(),
            from: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            combination: None,
            target: None,
            insert_rows: None,
        }
    }

    /// Simple value predicates among the row filters
    pub fn filters(&self) -> impl Iterator<Item = &FilterCondition> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Compare(f) => Some(f),
            _ => None,
        })
    }

    pub fn has_aggregates(&self) -> bool {
        self.projection.iter().any(|item| match item {
            SelectItem::Column(attr) => attr.aggregate.is_some(),
            SelectItem::Computed { expr, .. } => expr.contains_aggregate(),
        })
    }

    /// Whether this query needs its own solution modifiers when nested
    pub fn is_modified(&self) -> bool {
        self.distinct
            || self.has_aggregates()
            || !self.group_by.is_empty()
            || !self.having.is_empty()
            || !self.order_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
    }

    /// Source relation for an alias or table name
    pub fn table_ref(&self, relation: &str) -> Option<&TableRef> {
        self.from
            .iter()
            .find(|t| t.alias.as_deref() == Some(relation))
            .or_else(|| self.from.iter().find(|t| t.name.eq_ignore_ascii_case(relation)))
    }
}

// ============================================================================
// Attributes and Projection
// ============================================================================

/// Aggregate function tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column reference, the pseudo-column `subject`, or `*` under COUNT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Owning relation (table name or alias); empty when unqualified
    pub relation: String,
    pub name: String,
    pub alias: Option<String>,
    pub aggregate: Option<AggregateFunction>,
    /// `AGG(DISTINCT col)`
    pub distinct: bool,
}

impl Attribute {
    pub fn new(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            name: name.into(),
            alias: None,
            aggregate: None,
            distinct: false,
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateFunction) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn is_subject(&self) -> bool {
        self.name.eq_ignore_ascii_case(crate::schema::SUBJECT_COLUMN)
    }

    /// `*` argument of `COUNT(*)`
    pub fn is_star(&self) -> bool {
        self.name == "*"
    }

    pub fn is_qualified(&self) -> bool {
        !self.relation.is_empty()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = if self.is_qualified() {
            format!("{}.{}", self.relation, self.name)
        } else {
            self.name.clone()
        };
        match self.aggregate {
            Some(agg) if self.distinct => write!(f, "{}(DISTINCT {})", agg, column),
            Some(agg) => write!(f, "{}({})", agg, column),
            None => f.write_str(&column),
        }
    }
}

/// One projected item
#[derive(Debug, Clone)]
pub enum SelectItem {
    Column(Attribute),
    /// Calculated column such as `price * stock AS value`
    Computed {
        expr: ExprNode,
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn alias(&self) -> Option<&str> {
        match self {
            SelectItem::Column(attr) => attr.alias.as_deref(),
            SelectItem::Computed { alias, .. } => alias.as_deref(),
        }
    }
}

/// Source relation with optional alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Key under which columns of this relation are qualified
    pub fn binding_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    In,
    Between,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "<=" => Some(CompareOp::Le),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    /// Target-language symbol for the plain comparisons
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::In => "IN",
            CompareOp::Between => "BETWEEN",
        }
    }
}

/// Literal operand of a condition or inserted value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// Numeric literal in its source spelling
    Number(String),
    Boolean(bool),
    Null,
    List(Vec<Value>),
    /// BETWEEN bounds
    Range(Box<Value>, Box<Value>),
}

/// `relation.attr OP value`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub attribute: Attribute,
    pub op: CompareOp,
    pub value: Value,
}

/// Equality between attributes of two different relations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub left: Attribute,
    pub right: Attribute,
}

/// Column-to-column comparison that is not a join
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnComparison {
    pub left: Attribute,
    pub op: CompareOp,
    pub right: Attribute,
}

/// `(arithmetic) OP value`
#[derive(Debug, Clone)]
pub struct ExpressionFilter {
    pub expr: ExprNode,
    pub op: CompareOp,
    pub value: Value,
}

/// One conjunct of a WHERE clause
#[derive(Debug, Clone)]
pub enum Condition {
    Compare(FilterCondition),
    Columns(ColumnComparison),
    Expression(ExpressionFilter),
    /// Disjunction of AND-groups
    Any(Vec<Vec<Condition>>),
}

// ============================================================================
// Ordering, Combination, Mutation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub attribute: Attribute,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    Union,
    Intersect,
    Except,
}

impl CombinatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinatorKind::Union => "UNION",
            CombinatorKind::Intersect => "INTERSECT",
            CombinatorKind::Except => "EXCEPT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Combination {
    pub kind: CombinatorKind,
    /// `UNION ALL`
    pub all: bool,
    pub left: Box<Query>,
    pub right: Box<Query>,
}

/// INSERT payload
#[derive(Debug, Clone, PartialEq)]
pub enum InsertRows {
    /// Explicit column list zipped with each VALUES row
    Named(Vec<IndexMap<String, Value>>),
    /// No column list; columns come from the catalog
    Positional(Vec<Vec<Value>>),
}
