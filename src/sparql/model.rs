//! SPARQL 查询模型
//!
//! Graph-pattern form assembled by the converters. Slots are typed
//! [`Term`]s; nothing here is flattened to text until serialization.

use crate::query::AggregateFunction;
use crate::types::{escape_string, Iri, Term, Variable};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// ============================================================================
// Triple Patterns
// ============================================================================

/// One triple pattern of a basic graph pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// `subject rdf:type type_iri`
    pub fn type_of(subject: impl Into<Term>, type_iri: Iri) -> Self {
        Self::new(subject, Iri::rdf_type(), type_iri)
    }

    pub fn is_type_assertion(&self) -> bool {
        matches!(&self.predicate, Term::Iri(iri) if iri.is_rdf_type())
    }

    fn rename(&mut self, map: &HashMap<Variable, Variable>) {
        for slot in [&mut self.subject, &mut self.predicate, &mut self.object] {
            rename_term(slot, map);
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

fn rename_term(term: &mut Term, map: &HashMap<Variable, Variable>) {
    if let Term::Variable(v) = term {
        if let Some(renamed) = map.get(v) {
            *v = renamed.clone();
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Filter / projection expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Term(Term),
    /// Already rendered arithmetic expression
    Raw(String),
    Compare {
        op: &'static str,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Regex {
        target: Box<Expr>,
        pattern: String,
        case_insensitive: bool,
    },
    In {
        target: Box<Expr>,
        values: Vec<Expr>,
    },
    Aggregate {
        function: AggregateFunction,
        distinct: bool,
        /// `None` renders `*`
        arg: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn var(v: &Variable) -> Self {
        Expr::Term(Term::Variable(v.clone()))
    }

    pub fn compare(op: &'static str, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Conjunction, collapsing a single operand
    pub fn and(mut exprs: Vec<Expr>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::And(exprs)
        }
    }

    /// Disjunction, collapsing a single operand
    pub fn or(mut exprs: Vec<Expr>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Or(exprs)
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Expr::Term(term) => term.as_variable(),
            _ => None,
        }
    }

    fn rename(&mut self, map: &HashMap<Variable, Variable>) {
        match self {
            Expr::Term(term) => rename_term(term, map),
            Expr::Raw(text) => {
                // Rendered text only ever references variables as `?name` tokens
                *text = rename_raw(text, map);
            }
            Expr::Compare { left, right, .. } => {
                left.rename(map);
                right.rename(map);
            }
            Expr::And(items) | Expr::Or(items) => items.iter_mut().for_each(|e| e.rename(map)),
            Expr::Regex { target, .. } => target.rename(map),
            Expr::In { target, values } => {
                target.rename(map);
                values.iter_mut().for_each(|e| e.rename(map));
            }
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.rename(map);
                }
            }
        }
    }

    fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        match self {
            Expr::Term(Term::Variable(v)) => {
                out.insert(v.clone());
            }
            Expr::Term(_) => {}
            Expr::Raw(text) => out.extend(raw_variables(text)),
            Expr::Compare { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::And(items) | Expr::Or(items) => items.iter().for_each(|e| e.collect_variables(out)),
            Expr::Regex { target, .. } => target.collect_variables(out),
            Expr::In { target, values } => {
                target.collect_variables(out);
                values.iter().for_each(|e| e.collect_variables(out));
            }
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_variables(out);
                }
            }
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(_) | Expr::Or(_) | Expr::Compare { .. } => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `?name` tokens in rendered text, skipping string literals
fn raw_variables(text: &str) -> Vec<Variable> {
    let mut vars = Vec::new();
    scan_raw(text, |name| {
        vars.push(Variable::new(name));
        None
    });
    vars
}

fn rename_raw(text: &str, map: &HashMap<Variable, Variable>) -> String {
    scan_raw(text, |name| map.get(&Variable::new(name)).map(|v| v.name().to_string()))
}

/// Walk `?name` tokens outside of string literals, replacing those `visit` maps
fn scan_raw(text: &str, mut visit: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    let mut in_string = false;
    while let Some((i, c)) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == '?' {
            let start = i + 1;
            let mut end = start;
            while let Some(&(j, n)) = chars.peek() {
                if is_var_char(n) {
                    end = j + n.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let name = &text[start..end];
            out.push('?');
            match visit(name) {
                Some(renamed) => out.push_str(&renamed),
                None => out.push_str(name),
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Term(term) => write!(f, "{}", term),
            Expr::Raw(text) => f.write_str(text),
            Expr::Compare { op, left, right } => {
                left.fmt_operand(f)?;
                write!(f, " {} ", op)?;
                right.fmt_operand(f)
            }
            Expr::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    match item {
                        Expr::Or(_) => write!(f, "({})", item)?,
                        _ => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
            Expr::Or(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    match item {
                        Expr::And(_) => write!(f, "({})", item)?,
                        _ => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
            Expr::Regex {
                target,
                pattern,
                case_insensitive,
            } => {
                write!(f, "regex({}, \"{}\"", target, escape_string(pattern))?;
                if *case_insensitive {
                    f.write_str(", \"i\"")?;
                }
                f.write_str(")")
            }
            Expr::In { target, values } => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", target, rendered.join(", "))
            }
            Expr::Aggregate {
                function,
                distinct,
                arg,
            } => {
                let distinct = if *distinct { "DISTINCT " } else { "" };
                match arg {
                    Some(arg) => write!(f, "{}({}{})", function, distinct, arg),
                    None => write!(f, "{}({}*)", function, distinct),
                }
            }
        }
    }
}

// ============================================================================
// Projection and Modifiers
// ============================================================================

/// One entry of the SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Var(Variable),
    /// `(expr AS ?alias)`
    Bind { expr: Expr, alias: Variable },
}

impl Projection {
    /// Variable under which the value appears in results
    pub fn variable(&self) -> &Variable {
        match self {
            Projection::Var(v) => v,
            Projection::Bind { alias, .. } => alias,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Var(v) => write!(f, "{}", v),
            Projection::Bind { expr, alias } => write!(f, "({} AS {})", expr, alias),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expr: Expr,
    pub descending: bool,
}

impl fmt::Display for OrderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{}({})", direction, self.expr)
    }
}

// ============================================================================
// Group Patterns
// ============================================================================

/// Element of a group graph pattern, rendered in insertion order
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Triple(TriplePattern),
    Filter(Expr),
    /// `OPTIONAL { ... }`
    Optional(GroupPattern),
    /// `{ A } UNION { B } ...`
    Union(Vec<GroupPattern>),
    /// `FILTER [NOT] EXISTS { ... }`
    Exists { negated: bool, pattern: GroupPattern },
    /// Nested `{ SELECT ... }`
    SubSelect(Box<SelectQuery>),
}

/// `{ ... }` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPattern {
    pub elements: Vec<PatternElement>,
}

impl GroupPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triples first, then filters
    pub fn basic(triples: Vec<TriplePattern>, filters: Vec<Expr>) -> Self {
        let mut elements: Vec<PatternElement> =
            triples.into_iter().map(PatternElement::Triple).collect();
        elements.extend(filters.into_iter().map(PatternElement::Filter));
        Self { elements }
    }

    pub fn push_triple(&mut self, triple: TriplePattern) {
        self.elements.push(PatternElement::Triple(triple));
    }

    pub fn push_filter(&mut self, expr: Expr) {
        self.elements.push(PatternElement::Filter(expr));
    }

    pub fn push_optional(&mut self, pattern: GroupPattern) {
        self.elements.push(PatternElement::Optional(pattern));
    }

    /// Top-level triples
    pub fn triples(&self) -> impl Iterator<Item = &TriplePattern> {
        self.elements.iter().filter_map(|e| match e {
            PatternElement::Triple(t) => Some(t),
            _ => None,
        })
    }

    /// Top-level filter expressions
    pub fn filters(&self) -> impl Iterator<Item = &Expr> {
        self.elements.iter().filter_map(|e| match e {
            PatternElement::Filter(f) => Some(f),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn rename(&mut self, map: &HashMap<Variable, Variable>) {
        for element in &mut self.elements {
            match element {
                PatternElement::Triple(t) => t.rename(map),
                PatternElement::Filter(e) => e.rename(map),
                PatternElement::Optional(p) => p.rename(map),
                PatternElement::Union(branches) => branches.iter_mut().for_each(|b| b.rename(map)),
                PatternElement::Exists { pattern, .. } => pattern.rename(map),
                PatternElement::SubSelect(q) => q.rename_variables(map),
            }
        }
    }

    fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        for element in &self.elements {
            match element {
                PatternElement::Triple(t) => {
                    for slot in [&t.subject, &t.predicate, &t.object] {
                        if let Term::Variable(v) = slot {
                            out.insert(v.clone());
                        }
                    }
                }
                PatternElement::Filter(e) => e.collect_variables(out),
                PatternElement::Optional(p) => p.collect_variables(out),
                PatternElement::Union(branches) => {
                    branches.iter().for_each(|b| b.collect_variables(out))
                }
                PatternElement::Exists { pattern, .. } => pattern.collect_variables(out),
                PatternElement::SubSelect(q) => q.collect_variables(out),
            }
        }
    }

    fn uses_rdf_type(&self) -> bool {
        self.elements.iter().any(|element| match element {
            PatternElement::Triple(t) => t.is_type_assertion(),
            PatternElement::Optional(p) => p.uses_rdf_type(),
            PatternElement::Union(branches) => branches.iter().any(GroupPattern::uses_rdf_type),
            PatternElement::Exists { pattern, .. } => pattern.uses_rdf_type(),
            PatternElement::SubSelect(q) => q.pattern.uses_rdf_type(),
            PatternElement::Filter(_) => false,
        })
    }
}

// ============================================================================
// Queries
// ============================================================================

/// SELECT form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub distinct: bool,
    /// Empty renders `SELECT *`
    pub projection: Vec<Projection>,
    pub pattern: GroupPattern,
    pub group_by: Vec<Variable>,
    /// Post-aggregation conditions, combined with `&&`
    pub having: Vec<Expr>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection_vars(&self) -> Vec<&Variable> {
        self.projection.iter().map(Projection::variable).collect()
    }

    /// Whether the query needs solution modifiers beyond a plain pattern
    pub fn has_modifiers(&self) -> bool {
        self.distinct
            || !self.group_by.is_empty()
            || !self.having.is_empty()
            || !self.order_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
            || self
                .projection
                .iter()
                .any(|p| matches!(p, Projection::Bind { .. }))
    }

    /// Every variable mentioned anywhere in the query
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        for p in &self.projection {
            out.insert(p.variable().clone());
            if let Projection::Bind { expr, .. } = p {
                expr.collect_variables(out);
            }
        }
        self.pattern.collect_variables(out);
        out.extend(self.group_by.iter().cloned());
        self.having.iter().for_each(|e| e.collect_variables(out));
        self.order_by.iter().for_each(|o| o.expr.collect_variables(out));
    }

    /// Apply a variable renaming everywhere
    pub fn rename_variables(&mut self, map: &HashMap<Variable, Variable>) {
        if map.is_empty() {
            return;
        }
        for p in &mut self.projection {
            match p {
                Projection::Var(v) => {
                    if let Some(renamed) = map.get(v) {
                        *v = renamed.clone();
                    }
                }
                Projection::Bind { expr, alias } => {
                    expr.rename(map);
                    if let Some(renamed) = map.get(alias) {
                        *alias = renamed.clone();
                    }
                }
            }
        }
        self.pattern.rename(map);
        for v in &mut self.group_by {
            if let Some(renamed) = map.get(v) {
                *v = renamed.clone();
            }
        }
        self.having.iter_mut().for_each(|e| e.rename(map));
        self.order_by.iter_mut().for_each(|o| o.expr.rename(map));
    }
}

/// Assembled graph-pattern query
#[derive(Debug, Clone, PartialEq)]
pub enum GraphQuery {
    Select(SelectQuery),
    /// `INSERT DATA { ... }`
    InsertData(Vec<TriplePattern>),
    /// `DELETE { ... } WHERE { ... }`
    Delete {
        delete: Vec<TriplePattern>,
        pattern: GroupPattern,
    },
}

impl GraphQuery {
    pub fn as_select(&self) -> Option<&SelectQuery> {
        match self {
            GraphQuery::Select(q) => Some(q),
            _ => None,
        }
    }

    /// Whether any pattern uses `rdf:type`
    pub fn uses_rdf_type(&self) -> bool {
        match self {
            GraphQuery::Select(q) => q.pattern.uses_rdf_type(),
            GraphQuery::InsertData(triples) => triples.iter().any(TriplePattern::is_type_assertion),
            GraphQuery::Delete { delete, pattern } => {
                delete.iter().any(TriplePattern::is_type_assertion) || pattern.uses_rdf_type()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Literal;

    #[test]
    fn test_expr_display_precedence() {
        let price = Variable::new("price");
        let between = Expr::and(vec![
            Expr::compare(">=", Expr::var(&price), Expr::Term(Literal::number("50").into())),
            Expr::compare("<=", Expr::var(&price), Expr::Term(Literal::number("300").into())),
        ]);
        assert_eq!(between.to_string(), "?price >= 50 && ?price <= 300");

        let either = Expr::or(vec![
            between.clone(),
            Expr::compare("=", Expr::var(&price), Expr::Term(Literal::number("0").into())),
        ]);
        assert_eq!(
            either.to_string(),
            "(?price >= 50 && ?price <= 300) || ?price = 0"
        );
        assert_eq!(Expr::and(vec![either]).to_string().matches("||").count(), 1);
    }

    #[test]
    fn test_regex_and_in() {
        let email = Variable::new("email");
        let regex = Expr::Regex {
            target: Box::new(Expr::var(&email)),
            pattern: ".*example.com".into(),
            case_insensitive: true,
        };
        assert_eq!(regex.to_string(), r#"regex(?email, ".*example.com", "i")"#);

        let within = Expr::In {
            target: Box::new(Expr::var(&Variable::new("category"))),
            values: vec![
                Expr::Term(Literal::string("Electronics").into()),
                Expr::Term(Literal::string("Furniture").into()),
            ],
        };
        assert_eq!(within.to_string(), r#"?category IN ("Electronics", "Furniture")"#);
    }

    #[test]
    fn test_projection_display() {
        let bind = Projection::Bind {
            expr: Expr::Aggregate {
                function: AggregateFunction::Count,
                distinct: false,
                arg: None,
            },
            alias: Variable::new("count"),
        };
        assert_eq!(bind.to_string(), "(COUNT(*) AS ?count)");
        assert_eq!(bind.variable().name(), "count");
    }

    #[test]
    fn test_rename_variables() {
        let mut query = SelectQuery::new();
        query.projection.push(Projection::Var(Variable::new("title")));
        query.pattern.push_triple(TriplePattern::new(
            Variable::new("s0"),
            Iri::new("http://example.org/ontology/title"),
            Variable::new("title"),
        ));
        query.pattern.push_filter(Expr::Raw("(?title + \"?title\")".into()));

        let map: HashMap<Variable, Variable> =
            [(Variable::new("title"), Variable::new("name"))].into_iter().collect();
        query.rename_variables(&map);

        assert_eq!(query.projection_vars()[0].name(), "name");
        let triple = query.pattern.triples().next().unwrap();
        assert_eq!(triple.object, Term::Variable(Variable::new("name")));
        assert_eq!(
            query.pattern.filters().next().unwrap().to_string(),
            "(?name + \"?title\")"
        );
        assert!(query.variables().contains(&Variable::new("s0")));
    }

    #[test]
    fn test_type_assertion_detection() {
        let triple = TriplePattern::type_of(Variable::new("s0"), Iri::new("http://example.org/types/Client"));
        assert!(triple.is_type_assertion());
        assert_eq!(
            triple.to_string(),
            "?s0 rdf:type <http://example.org/types/Client>"
        );
        assert!(GraphQuery::InsertData(vec![triple]).uses_rdf_type());
    }
}
