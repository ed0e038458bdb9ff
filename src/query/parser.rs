//! SQL Parser
//!
//! Parses SQL text into the relational [`Query`] AST.
//!
//! The token stream is partitioned into clause regions by a keyword table
//! (`CLAUSE_KEYWORDS`). A keyword only opens a clause at parenthesis depth 0,
//! when it is not part of a qualified name (`order.id`), and when its
//! follow-up matches (`ORDER` needs `BY`, `LIMIT` needs a number). Each region
//! is then handed to its own sub-parser.

use crate::error::{Error, Result};
use crate::metrics::global_metrics;
use crate::query::ast::*;
use crate::query::expression::{parse_expression_tokens, scalar_function, ExprNode};
use crate::query::lexer::{tokenize, Token, TokenKind};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

// ============================================================================
// Clause keyword table
// ============================================================================

/// Clause regions of a SELECT statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
}

struct ClauseKeyword {
    clause: Clause,
    words: &'static [&'static str],
    /// Only a clause when followed by a numeric literal
    needs_number: bool,
}

const CLAUSE_KEYWORDS: &[ClauseKeyword] = &[
    ClauseKeyword { clause: Clause::Select, words: &["SELECT"], needs_number: false },
    ClauseKeyword { clause: Clause::From, words: &["FROM"], needs_number: false },
    ClauseKeyword { clause: Clause::Where, words: &["WHERE"], needs_number: false },
    ClauseKeyword { clause: Clause::GroupBy, words: &["GROUP", "BY"], needs_number: false },
    ClauseKeyword { clause: Clause::Having, words: &["HAVING"], needs_number: false },
    ClauseKeyword { clause: Clause::OrderBy, words: &["ORDER", "BY"], needs_number: false },
    ClauseKeyword { clause: Clause::Limit, words: &["LIMIT"], needs_number: true },
    ClauseKeyword { clause: Clause::Offset, words: &["OFFSET"], needs_number: true },
];

const COMBINATOR_KEYWORDS: [(&str, CombinatorKind); 3] = [
    ("UNION", CombinatorKind::Union),
    ("INTERSECT", CombinatorKind::Intersect),
    ("EXCEPT", CombinatorKind::Except),
];

/// Join types other than INNER
const UNSUPPORTED_JOINS: [&str; 5] = ["LEFT", "RIGHT", "FULL", "CROSS", "NATURAL"];

/// Words that end a table reference inside FROM
const FROM_STOP_WORDS: [&str; 9] = [
    "JOIN", "INNER", "ON", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "OUTER",
];

/// Whether a keyword at `i` can start a clause: a bare word not preceded by `.`
fn is_keyword_position(tokens: &[Token], i: usize, keyword: &str) -> bool {
    tokens[i].is_keyword(keyword) && !(i > 0 && tokens[i - 1].is_symbol("."))
        && !tokens.get(i + 1).map_or(false, |t| t.is_symbol("."))
}

/// Clause opened at `i`, with the number of keyword tokens it spans
fn clause_at(tokens: &[Token], i: usize) -> Option<(Clause, usize)> {
    CLAUSE_KEYWORDS.iter().find_map(|entry| {
        let n = entry.words.len();
        let words_match = entry.words.iter().enumerate().all(|(k, word)| {
            tokens.get(i + k).map_or(false, |t| t.is_keyword(word))
        });
        if !words_match || !is_keyword_position(tokens, i, entry.words[0]) {
            return None;
        }
        if entry.needs_number
            && !tokens.get(i + n).map_or(false, |t| t.kind == TokenKind::Number)
        {
            return None;
        }
        Some((entry.clause, n))
    })
}

fn combinator_at(tokens: &[Token], i: usize) -> Option<CombinatorKind> {
    COMBINATOR_KEYWORDS
        .iter()
        .find(|(word, _)| is_keyword_position(tokens, i, word))
        .map(|(_, kind)| *kind)
}

/// Parenthesis depth before each token; both parens of a group sit at the outer depth
fn depths(tokens: &[Token]) -> Vec<i32> {
    let mut depth = 0;
    tokens
        .iter()
        .map(|t| {
            if t.is_symbol(")") {
                depth -= 1;
            }
            let current = depth;
            if t.is_symbol("(") {
                depth += 1;
            }
            current
        })
        .collect()
}

/// Split on top-level tokens matching `is_sep`
fn split_top_level<'t>(tokens: &'t [Token], is_sep: impl Fn(&Token) -> bool) -> Vec<&'t [Token]> {
    let depth = depths(tokens);
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if depth[i] == 0 && is_sep(token) {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Split a condition on top-level AND, skipping the AND inside `BETWEEN a AND b`
fn split_conjuncts(tokens: &[Token]) -> Vec<&[Token]> {
    let depth = depths(tokens);
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_between = false;
    for (i, token) in tokens.iter().enumerate() {
        if depth[i] != 0 {
            continue;
        }
        if token.is_keyword("BETWEEN") {
            in_between = true;
        } else if token.is_keyword("AND") {
            if in_between {
                in_between = false;
            } else {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Strip one pair of parentheses enclosing the whole slice
fn strip_parens(tokens: &[Token]) -> Option<&[Token]> {
    if tokens.len() < 2 || !tokens[0].is_symbol("(") || !tokens[tokens.len() - 1].is_symbol(")") {
        return None;
    }
    let depth = depths(tokens);
    // The opening paren must close at the very end
    let closes_early = tokens[..tokens.len() - 1]
        .iter()
        .enumerate()
        .skip(1)
        .any(|(i, t)| t.is_symbol(")") && depth[i] == 0);
    if closes_early {
        None
    } else {
        Some(&tokens[1..tokens.len() - 1])
    }
}

fn contains_subquery(tokens: &[Token]) -> bool {
    tokens
        .windows(2)
        .any(|w| w[0].is_symbol("(") && w[1].is_keyword("SELECT"))
}

/// Left side of a comparison once classified
enum Operand {
    Attr(Attribute),
    Expr(ExprNode),
    Value(Value),
}

// ============================================================================
// Parser
// ============================================================================

/// SQL Parser
pub struct SqlParser {
    input: String,
    strict: bool,
}

impl SqlParser {
    /// Create a new parser
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
            strict: false,
        }
    }

    /// Reject unknown aggregate names instead of falling back to COUNT
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parse one SQL statement
    pub fn parse(&self) -> Result<Query> {
        let mut tokens = tokenize(&self.input)?;
        while tokens.last().map_or(false, |t| t.is_symbol(";")) {
            tokens.pop();
        }
        if tokens.iter().any(|t| t.is_symbol(";")) {
            return Err(Error::unsupported("一次只能转换一条语句"));
        }
        if tokens.is_empty() {
            return Err(Error::syntax("未找到查询类型关键字", self.input.trim()));
        }
        self.parse_statement(&tokens)
    }

    /// Source text from the first token on; the whole statement for an empty run
    fn fragment(&self, tokens: &[Token]) -> String {
        let offset = tokens.first().map_or(0, |first| first.offset);
        let snippet: String = self.input[offset..].chars().take(40).collect();
        snippet.trim().to_string()
    }

    fn parse_statement(&self, tokens: &[Token]) -> Result<Query> {
        let first = tokens
            .iter()
            .find(|t| !t.is_symbol("("))
            .ok_or_else(|| Error::syntax("未找到查询类型关键字", self.fragment(tokens)))?;

        if first.is_keyword("SELECT") {
            self.parse_query(tokens)
        } else if first.is_keyword("INSERT") {
            self.parse_insert(tokens)
        } else if first.is_keyword("DELETE") {
            self.parse_delete(tokens)
        } else if first.is_keyword("UPDATE") {
            Err(Error::unsupported("UPDATE 语句"))
        } else {
            Err(Error::syntax("未找到查询类型关键字", self.fragment(tokens)))
        }
    }

    // ========================================================================
    // SELECT and combinators
    // ========================================================================

    /// SELECT statement, possibly combined with UNION / INTERSECT / EXCEPT
    fn parse_query(&self, tokens: &[Token]) -> Result<Query> {
        if let Some(inner) = strip_parens(tokens) {
            return self.parse_query(inner);
        }

        let depth = depths(tokens);
        let split = (0..tokens.len())
            .rev()
            .find_map(|i| {
                if depth[i] == 0 {
                    combinator_at(tokens, i).map(|kind| (i, kind))
                } else {
                    None
                }
            });

        let (idx, kind) = match split {
            Some(found) => found,
            None => return self.parse_select(tokens),
        };

        let all = tokens.get(idx + 1).map_or(false, |t| t.is_keyword("ALL"));
        let right_start = idx + if all { 2 } else { 1 };
        let left_tokens = &tokens[..idx];
        let mut right_tokens = &tokens[right_start..];
        if left_tokens.is_empty() || right_tokens.is_empty() {
            return Err(Error::syntax(
                format!("{} 缺少分支", kind.as_str()),
                self.fragment(&tokens[idx..]),
            ));
        }

        // Trailing ORDER BY / LIMIT / OFFSET of the last branch belong to the combined result
        let right_depth = depths(right_tokens);
        let trailer_start = (0..right_tokens.len()).find(|&i| {
            right_depth[i] == 0
                && matches!(
                    clause_at(right_tokens, i),
                    Some((Clause::OrderBy | Clause::Limit | Clause::Offset, _))
                )
        });
        let mut outer = Query::new(QueryKind::Select);
        if let Some(start) = trailer_start {
            let trailer = &right_tokens[start..];
            right_tokens = &right_tokens[..start];
            for (clause, body) in self.split_clauses(trailer)? {
                self.apply_modifier(&mut outer, clause, body)?;
            }
        }

        debug!(combinator = kind.as_str(), all, "split combined query");
        let left = self.parse_query(left_tokens)?;
        let right = self.parse_query(right_tokens)?;
        outer.combination = Some(Combination {
            kind,
            all,
            left: Box::new(left),
            right: Box::new(right),
        });
        Ok(outer)
    }

    /// Partition a statement into clause regions
    fn split_clauses<'t>(&self, tokens: &'t [Token]) -> Result<Vec<(Clause, &'t [Token])>> {
        let depth = depths(tokens);
        let mut starts: Vec<(usize, Clause, usize)> = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if depth[i] == 0 {
                if let Some((clause, len)) = clause_at(tokens, i) {
                    starts.push((i, clause, len));
                    i += len;
                    continue;
                }
            }
            i += 1;
        }

        match starts.first() {
            Some((0, _, _)) => {}
            _ => {
                return Err(Error::syntax("语句开头不是子句关键字", self.fragment(tokens)));
            }
        }

        let mut regions: Vec<(Clause, &[Token])> = Vec::with_capacity(starts.len());
        for (k, (start, clause, len)) in starts.iter().enumerate() {
            let end = starts.get(k + 1).map_or(tokens.len(), |next| next.0);
            if regions.iter().any(|(seen, _)| seen == clause) {
                return Err(Error::syntax(
                    format!("重复的子句 {:?}", clause),
                    self.fragment(&tokens[*start..]),
                ));
            }
            if start + len == end {
                return Err(Error::syntax(
                    format!("{:?} 子句为空", clause),
                    self.fragment(&tokens[*start..]),
                ));
            }
            regions.push((*clause, &tokens[start + len..end]));
        }
        trace!(regions = ?regions.iter().map(|(c, t)| (c, t.len())).collect::<Vec<_>>(), "clause regions");
        Ok(regions)
    }

    fn parse_select(&self, tokens: &[Token]) -> Result<Query> {
        if contains_subquery(tokens) {
            return Err(Error::unsupported("子查询"));
        }
        if tokens.iter().any(|t| t.is_keyword("EXISTS")) {
            return Err(Error::unsupported("EXISTS 子查询"));
        }

        let mut query = Query::new(QueryKind::Select);
        for (clause, body) in self.split_clauses(tokens)? {
            match clause {
                Clause::Select => self.parse_projection(&mut query, body)?,
                Clause::From => self.parse_from(&mut query, body)?,
                Clause::Where => {
                    let (joins, conditions) = self.parse_conditions(body)?;
                    query.joins.extend(joins);
                    query.conditions.extend(conditions);
                }
                Clause::GroupBy => query.group_by = self.parse_group_by(body)?,
                Clause::Having => query.having = self.parse_having(body)?,
                Clause::OrderBy | Clause::Limit | Clause::Offset => {
                    self.apply_modifier(&mut query, clause, body)?
                }
            }
        }

        if query.from.is_empty() {
            return Err(Error::syntax("SELECT 缺少 FROM 子句", self.fragment(tokens)));
        }
        if query.projection.is_empty() && !query.select_all {
            return Err(Error::syntax("SELECT 缺少投影列", self.fragment(tokens)));
        }
        Ok(query)
    }

    fn apply_modifier(&self, query: &mut Query, clause: Clause, body: &[Token]) -> Result<()> {
        match clause {
            Clause::OrderBy => query.order_by = self.parse_order_by(body)?,
            Clause::Limit => query.limit = Some(self.parse_count(body, "LIMIT")?),
            Clause::Offset => query.offset = Some(self.parse_count(body, "OFFSET")?),
            other => {
                return Err(Error::syntax(
                    format!("组合查询末尾不允许 {:?} 子句", other),
                    self.fragment(body),
                ))
            }
        }
        Ok(())
    }

    fn parse_count(&self, body: &[Token], clause: &str) -> Result<u64> {
        match body {
            [n] if n.kind == TokenKind::Number => n
                .text
                .parse()
                .map_err(|_| Error::syntax(format!("{} 需要非负整数", clause), n.text.clone())),
            _ => Err(Error::syntax(
                format!("{} 需要一个整数", clause),
                self.fragment(body),
            )),
        }
    }

    // ========================================================================
    // Projection
    // ========================================================================

    fn parse_projection(&self, query: &mut Query, mut body: &[Token]) -> Result<()> {
        if body.first().map_or(false, |t| t.is_keyword("DISTINCT")) {
            query.distinct = true;
            body = &body[1..];
        } else if body.first().map_or(false, |t| t.is_keyword("ALL")) {
            body = &body[1..];
        }

        if body.len() == 1 && body[0].is_symbol("*") {
            query.select_all = true;
            return Ok(());
        }

        for item in split_top_level(body, |t| t.is_symbol(",")) {
            if item.is_empty() {
                return Err(Error::syntax("投影列为空", self.fragment(body)));
            }
            query.projection.push(self.parse_select_item(item)?);
        }
        Ok(())
    }

    fn parse_select_item(&self, tokens: &[Token]) -> Result<SelectItem> {
        let n = tokens.len();
        let (body, alias) = if n >= 3 && tokens[n - 2].is_keyword("AS") && tokens[n - 1].is_identifier() {
            (&tokens[..n - 2], Some(tokens[n - 1].text.clone()))
        } else if n >= 2
            && tokens[n - 1].is_identifier()
            && !tokens[n - 2].is_symbol(".")
            && (tokens[n - 2].is_identifier()
                || tokens[n - 2].is_symbol(")")
                || tokens[n - 2].kind == TokenKind::Number
                || tokens[n - 2].kind == TokenKind::String)
        {
            (&tokens[..n - 1], Some(tokens[n - 1].text.clone()))
        } else {
            (tokens, None)
        };

        match self.classify(body, true)? {
            Operand::Attr(mut attr) => {
                attr.alias = alias;
                Ok(SelectItem::Column(attr))
            }
            Operand::Expr(expr) => Ok(SelectItem::Computed { expr, alias }),
            Operand::Value(value) => Ok(SelectItem::Computed {
                expr: ExprNode::Literal(value),
                alias,
            }),
        }
    }

    /// Classify a token run as attribute, aggregate attribute, literal, or expression
    fn classify(&self, tokens: &[Token], allow_aggregate: bool) -> Result<Operand> {
        if tokens.is_empty() {
            return Err(Error::syntax("缺少操作数", self.fragment(tokens)));
        }
        if let Some(attr) = simple_attribute(tokens) {
            return Ok(Operand::Attr(attr));
        }
        if tokens.len() == 3 && tokens[1].is_symbol(".") && tokens[2].is_symbol("*") {
            return Err(Error::unsupported(format!("{}.* 投影", tokens[0].text)));
        }
        if let Some(value) = self.try_value(tokens)? {
            return Ok(Operand::Value(value));
        }

        // NAME( ... ) spanning the whole run
        if tokens.len() >= 3
            && tokens[0].kind == TokenKind::Word
            && tokens[1].is_symbol("(")
            && strip_parens(&tokens[1..]).is_some()
        {
            let name = &tokens[0].text;
            let inner = &tokens[2..tokens.len() - 1];
            if let Some(attr) = self.aggregate_attribute(name, inner)? {
                if !allow_aggregate {
                    return Err(Error::unsupported(format!("WHERE 子句中的聚合 {}", name)));
                }
                return Ok(Operand::Attr(attr));
            }
        }

        let expr = parse_expression_tokens(tokens)?;
        if !allow_aggregate && expr.contains_aggregate() {
            return Err(Error::unsupported("WHERE 子句中的聚合"));
        }
        Ok(Operand::Expr(expr))
    }

    /// `AGG(col)`, `AGG(DISTINCT col)`, `COUNT(*)`, or an unknown function over one column
    fn aggregate_attribute(&self, name: &str, inner: &[Token]) -> Result<Option<Attribute>> {
        let aggregate = match AggregateFunction::from_name(name) {
            Some(agg) => agg,
            None if scalar_function(name).is_some() => return Ok(None),
            None => {
                if simple_attribute(inner).is_none() {
                    return Ok(None);
                }
                if self.strict {
                    return Err(Error::unsupported(format!("未知聚合函数: {}", name)));
                }
                warn!(function = %name, "unknown aggregate function, falling back to COUNT");
                global_metrics().record_fallback();
                AggregateFunction::Count
            }
        };

        if aggregate == AggregateFunction::Count && inner.len() == 1 && inner[0].is_symbol("*") {
            return Ok(Some(Attribute::unqualified("*").with_aggregate(aggregate)));
        }
        let (distinct, column) = match inner.first() {
            Some(t) if t.is_keyword("DISTINCT") => (true, &inner[1..]),
            _ => (false, inner),
        };
        match simple_attribute(column) {
            Some(attr) => {
                let mut attr = attr.with_aggregate(aggregate);
                attr.distinct = distinct;
                Ok(Some(attr))
            }
            None => {
                if contains_aggregate_call(column) {
                    return Err(Error::unsupported(format!("嵌套聚合: {}", name)));
                }
                Ok(None)
            }
        }
    }

    // ========================================================================
    // FROM / JOIN
    // ========================================================================

    fn parse_from(&self, query: &mut Query, body: &[Token]) -> Result<()> {
        if body.is_empty() {
            return Err(Error::syntax("FROM 缺少表名", self.fragment(body)));
        }
        for part in split_top_level(body, |t| t.is_symbol(",")) {
            self.parse_from_item(query, part)?;
        }
        Ok(())
    }

    fn parse_from_item(&self, query: &mut Query, tokens: &[Token]) -> Result<()> {
        let mut pos = 0;
        let (table, used) = self.parse_table_ref(&tokens[pos..])?;
        query.from.push(table);
        pos += used;

        while pos < tokens.len() {
            let token = &tokens[pos];
            if let Some(kind) = UNSUPPORTED_JOINS.iter().find(|k| token.is_keyword(k)) {
                return Err(Error::unsupported(format!("{} JOIN", kind)));
            }
            if token.is_keyword("INNER") {
                pos += 1;
            }
            if !tokens.get(pos).map_or(false, |t| t.is_keyword("JOIN")) {
                return Err(Error::syntax("FROM 子句中的意外内容", self.fragment(&tokens[pos..])));
            }
            pos += 1;

            let (table, used) = self.parse_table_ref(&tokens[pos..])?;
            query.from.push(table);
            pos += used;

            if !tokens.get(pos).map_or(false, |t| t.is_keyword("ON")) {
                return Err(Error::syntax("JOIN 缺少 ON 条件", self.fragment(&tokens[pos.min(tokens.len())..])));
            }
            pos += 1;

            let cond_end = (pos..tokens.len())
                .find(|&i| {
                    FROM_STOP_WORDS
                        .iter()
                        .filter(|w| **w != "ON")
                        .any(|w| tokens[i].is_keyword(w))
                })
                .unwrap_or(tokens.len());
            if pos == cond_end {
                return Err(Error::syntax("ON 条件为空", self.fragment(&tokens[pos - 1..])));
            }
            let (joins, conditions) = self.parse_conditions(&tokens[pos..cond_end])?;
            query.joins.extend(joins);
            query.conditions.extend(conditions);
            pos = cond_end;
        }
        Ok(())
    }

    /// `table [AS] [alias]`; returns the reference and tokens consumed
    fn parse_table_ref(&self, tokens: &[Token]) -> Result<(TableRef, usize)> {
        let name = match tokens.first() {
            Some(t) if t.is_identifier() && !FROM_STOP_WORDS.iter().any(|w| t.is_keyword(w)) => t,
            Some(t) if t.is_symbol("(") => return Err(Error::unsupported("FROM 中的子查询")),
            _ => return Err(Error::syntax("缺少表名", self.fragment(tokens))),
        };
        let mut table = TableRef::new(name.text.clone());
        let mut used = 1;
        if tokens.get(1).map_or(false, |t| t.is_keyword("AS")) {
            match tokens.get(2) {
                Some(alias) if alias.is_identifier() => {
                    table.alias = Some(alias.text.clone());
                    used = 3;
                }
                _ => return Err(Error::syntax("AS 后缺少别名", self.fragment(tokens))),
            }
        } else if let Some(alias) = tokens.get(1) {
            if alias.is_identifier() && !FROM_STOP_WORDS.iter().any(|w| alias.is_keyword(w)) {
                table.alias = Some(alias.text.clone());
                used = 2;
            }
        }
        Ok((table, used))
    }

    // ========================================================================
    // WHERE
    // ========================================================================

    /// Parse a condition into join conditions and row filters
    fn parse_conditions(&self, tokens: &[Token]) -> Result<(Vec<JoinCondition>, Vec<Condition>)> {
        if tokens.is_empty() {
            return Err(Error::syntax("条件为空", self.fragment(tokens)));
        }
        let mut joins = Vec::new();
        let mut conditions = Vec::new();

        let disjuncts = split_top_level(tokens, |t| t.is_keyword("OR"));
        if disjuncts.len() > 1 {
            let mut groups = Vec::with_capacity(disjuncts.len());
            for branch in disjuncts {
                groups.push(self.parse_and_group(branch)?);
            }
            conditions.push(Condition::Any(groups));
            return Ok((joins, conditions));
        }

        for conjunct in split_conjuncts(tokens) {
            if let Some(inner) = strip_parens(conjunct) {
                if self.is_condition(inner) {
                    let (j, c) = self.parse_conditions(inner)?;
                    joins.extend(j);
                    conditions.extend(c);
                    continue;
                }
            }
            match self.parse_predicate(conjunct)? {
                Predicate::Join(join) => joins.push(join),
                Predicate::Condition(cond) => conditions.push(cond),
            }
        }
        Ok((joins, conditions))
    }

    /// AND-group inside a disjunction; joins degrade to column comparisons
    fn parse_and_group(&self, tokens: &[Token]) -> Result<Vec<Condition>> {
        let (joins, mut conditions) = self.parse_conditions(tokens)?;
        conditions.extend(joins.into_iter().map(|j| {
            Condition::Columns(ColumnComparison {
                left: j.left,
                op: CompareOp::Eq,
                right: j.right,
            })
        }));
        Ok(conditions)
    }

    /// Whether a parenthesized run is itself a condition rather than an arithmetic operand
    fn is_condition(&self, tokens: &[Token]) -> bool {
        let depth = depths(tokens);
        tokens.iter().enumerate().any(|(i, t)| {
            depth[i] == 0
                && ((t.kind == TokenKind::Symbol && CompareOp::from_symbol(&t.text).is_some())
                    || ["AND", "OR", "LIKE", "IN", "BETWEEN", "IS", "NOT"]
                        .iter()
                        .any(|k| t.is_keyword(k)))
        })
    }

    fn parse_predicate(&self, tokens: &[Token]) -> Result<Predicate> {
        self.reject_negations(tokens)?;

        let depth = depths(tokens);
        let op_idx = (0..tokens.len()).find(|&i| {
            depth[i] == 0
                && ((tokens[i].kind == TokenKind::Symbol && CompareOp::from_symbol(&tokens[i].text).is_some())
                    || tokens[i].is_keyword("LIKE")
                    || tokens[i].is_keyword("IN")
                    || tokens[i].is_keyword("BETWEEN"))
        });
        let op_idx = op_idx.ok_or_else(|| Error::syntax("条件缺少比较运算符", self.fragment(tokens)))?;

        let op_token = &tokens[op_idx];
        let op = if op_token.is_keyword("LIKE") {
            CompareOp::Like
        } else if op_token.is_keyword("IN") {
            CompareOp::In
        } else if op_token.is_keyword("BETWEEN") {
            CompareOp::Between
        } else {
            CompareOp::from_symbol(&op_token.text)
                .ok_or_else(|| Error::syntax("无法识别的运算符", op_token.text.clone()))?
        };

        let left = &tokens[..op_idx];
        let right = &tokens[op_idx + 1..];
        if left.is_empty() || right.is_empty() {
            return Err(Error::syntax("比较缺少操作数", self.fragment(tokens)));
        }

        let value = match op {
            CompareOp::In => Some(self.parse_in_list(right)?),
            CompareOp::Between => Some(self.parse_range(right)?),
            CompareOp::Like => match self.try_value(right)? {
                Some(Value::String(pattern)) => Some(Value::String(pattern)),
                _ => return Err(Error::syntax("LIKE 需要字符串模式", self.fragment(right))),
            },
            _ => None,
        };

        let lhs = self.classify(left, false)?;
        if let Some(value) = value {
            return match lhs {
                Operand::Attr(attribute) => Ok(Predicate::Condition(Condition::Compare(FilterCondition {
                    attribute,
                    op,
                    value,
                }))),
                Operand::Expr(expr) => Ok(Predicate::Condition(Condition::Expression(ExpressionFilter {
                    expr,
                    op,
                    value,
                }))),
                Operand::Value(_) => Err(Error::syntax("比较左侧不能是常量", self.fragment(tokens))),
            };
        }

        let rhs = self.classify(right, false)?;
        let predicate = match (lhs, rhs) {
            (Operand::Attr(l), Operand::Attr(r)) => {
                if op == CompareOp::Eq
                    && l.is_qualified()
                    && r.is_qualified()
                    && !l.relation.eq_ignore_ascii_case(&r.relation)
                {
                    Predicate::Join(JoinCondition { left: l, right: r })
                } else {
                    Predicate::Condition(Condition::Columns(ColumnComparison { left: l, op, right: r }))
                }
            }
            (Operand::Attr(attribute), Operand::Value(value)) => {
                Predicate::Condition(Condition::Compare(FilterCondition { attribute, op, value }))
            }
            (Operand::Value(value), Operand::Attr(attribute)) => {
                Predicate::Condition(Condition::Compare(FilterCondition {
                    attribute,
                    op: flip(op),
                    value,
                }))
            }
            (Operand::Expr(expr), Operand::Value(value)) => {
                Predicate::Condition(Condition::Expression(ExpressionFilter { expr, op, value }))
            }
            (Operand::Value(value), Operand::Expr(expr)) => {
                Predicate::Condition(Condition::Expression(ExpressionFilter {
                    expr,
                    op: flip(op),
                    value,
                }))
            }
            _ => {
                return Err(Error::unsupported(format!(
                    "表达式之间的比较: {}",
                    self.fragment(tokens)
                )))
            }
        };
        Ok(predicate)
    }

    fn reject_negations(&self, tokens: &[Token]) -> Result<()> {
        for (i, t) in tokens.iter().enumerate() {
            if t.is_keyword("NOT") {
                let next = tokens.get(i + 1).map(|n| n.text.to_ascii_uppercase());
                let what = match next.as_deref() {
                    Some("IN") => "NOT IN",
                    Some("BETWEEN") => "NOT BETWEEN",
                    Some("LIKE") => "NOT LIKE",
                    Some("EXISTS") => "NOT EXISTS",
                    _ => "NOT",
                };
                return Err(Error::unsupported(what));
            }
            if t.is_keyword("IS") {
                return Err(Error::unsupported("IS [NOT] NULL"));
            }
            if t.is_keyword("NULL") {
                return Err(Error::unsupported("NULL 比较"));
            }
        }
        Ok(())
    }

    fn parse_in_list(&self, tokens: &[Token]) -> Result<Value> {
        let inner = strip_parens(tokens)
            .ok_or_else(|| Error::syntax("IN 需要括号包围的值列表", self.fragment(tokens)))?;
        if inner.first().map_or(false, |t| t.is_keyword("SELECT")) {
            return Err(Error::unsupported("IN 子查询"));
        }
        let mut values = Vec::new();
        for item in split_top_level(inner, |t| t.is_symbol(",")) {
            match self.try_value(item)? {
                Some(v) => values.push(v),
                None => return Err(Error::syntax("IN 列表只能包含常量", self.fragment(item))),
            }
        }
        Ok(Value::List(values))
    }

    fn parse_range(&self, tokens: &[Token]) -> Result<Value> {
        let and = tokens
            .iter()
            .position(|t| t.is_keyword("AND"))
            .ok_or_else(|| Error::syntax("BETWEEN 缺少 AND", self.fragment(tokens)))?;
        let low = self.try_value(&tokens[..and])?;
        let high = self.try_value(&tokens[and + 1..])?;
        match (low, high) {
            (Some(low), Some(high)) => Ok(Value::Range(Box::new(low), Box::new(high))),
            _ => Err(Error::syntax("BETWEEN 边界必须是常量", self.fragment(tokens))),
        }
    }

    /// Literal value, if the run is exactly one
    fn try_value(&self, tokens: &[Token]) -> Result<Option<Value>> {
        let value = match tokens {
            [t] if t.kind == TokenKind::String => Some(Value::String(t.text.clone())),
            [t] if t.kind == TokenKind::Number => Some(Value::Number(t.text.clone())),
            [sign, t] if sign.is_symbol("-") && t.kind == TokenKind::Number => {
                Some(Value::Number(format!("-{}", t.text)))
            }
            [t] if t.is_keyword("TRUE") => Some(Value::Boolean(true)),
            [t] if t.is_keyword("FALSE") => Some(Value::Boolean(false)),
            [t] if t.is_keyword("NULL") => Some(Value::Null),
            _ => None,
        };
        Ok(value)
    }

    // ========================================================================
    // GROUP BY / HAVING / ORDER BY
    // ========================================================================

    fn parse_group_by(&self, body: &[Token]) -> Result<Vec<Attribute>> {
        split_top_level(body, |t| t.is_symbol(","))
            .into_iter()
            .map(|item| {
                simple_attribute(item).ok_or_else(|| {
                    if item.is_empty() {
                        Error::syntax("GROUP BY 列为空", self.fragment(body))
                    } else {
                        Error::unsupported(format!("GROUP BY 表达式: {}", self.fragment(item)))
                    }
                })
            })
            .collect()
    }

    fn parse_having(&self, body: &[Token]) -> Result<Vec<FilterCondition>> {
        if split_top_level(body, |t| t.is_keyword("OR")).len() > 1 {
            return Err(Error::unsupported("HAVING 中的 OR"));
        }
        let mut conditions = Vec::new();
        for conjunct in split_conjuncts(body) {
            let conjunct = strip_parens(conjunct).unwrap_or(conjunct);
            self.reject_negations(conjunct)?;
            let depth = depths(conjunct);
            let op_idx = (0..conjunct.len())
                .find(|&i| {
                    depth[i] == 0
                        && ((conjunct[i].kind == TokenKind::Symbol
                            && CompareOp::from_symbol(&conjunct[i].text).is_some())
                            || conjunct[i].is_keyword("BETWEEN")
                            || conjunct[i].is_keyword("IN"))
                })
                .ok_or_else(|| Error::syntax("HAVING 条件缺少比较运算符", self.fragment(conjunct)))?;

            let attribute = match self.classify(&conjunct[..op_idx], true)? {
                Operand::Attr(attr) => attr,
                _ => {
                    return Err(Error::unsupported(format!(
                        "HAVING 表达式: {}",
                        self.fragment(conjunct)
                    )))
                }
            };
            let right = &conjunct[op_idx + 1..];
            let (op, value) = if conjunct[op_idx].is_keyword("BETWEEN") {
                (CompareOp::Between, self.parse_range(right)?)
            } else if conjunct[op_idx].is_keyword("IN") {
                (CompareOp::In, self.parse_in_list(right)?)
            } else {
                let op = CompareOp::from_symbol(&conjunct[op_idx].text)
                    .ok_or_else(|| Error::syntax("无法识别的运算符", conjunct[op_idx].text.clone()))?;
                let value = self
                    .try_value(right)?
                    .ok_or_else(|| Error::syntax("HAVING 右侧必须是常量", self.fragment(right)))?;
                (op, value)
            };
            conditions.push(FilterCondition { attribute, op, value });
        }
        Ok(conditions)
    }

    fn parse_order_by(&self, body: &[Token]) -> Result<Vec<OrderItem>> {
        let mut items = Vec::new();
        for item in split_top_level(body, |t| t.is_symbol(",")) {
            let (column, descending) = match item.last() {
                Some(t) if t.is_keyword("DESC") => (&item[..item.len() - 1], true),
                Some(t) if t.is_keyword("ASC") => (&item[..item.len() - 1], false),
                _ => (item, false),
            };
            if column.is_empty() {
                return Err(Error::syntax("ORDER BY 列为空", self.fragment(body)));
            }
            let attribute = match self.classify(column, true)? {
                Operand::Attr(attr) => attr,
                Operand::Value(_) => return Err(Error::unsupported("ORDER BY 列序号")),
                Operand::Expr(_) => {
                    return Err(Error::unsupported(format!(
                        "ORDER BY 表达式: {}",
                        self.fragment(column)
                    )))
                }
            };
            items.push(OrderItem { attribute, descending });
        }
        Ok(items)
    }

    // ========================================================================
    // INSERT / DELETE
    // ========================================================================

    /// `INSERT INTO t [(c1, c2)] VALUES (v1, v2)[, (...)]`
    fn parse_insert(&self, tokens: &[Token]) -> Result<Query> {
        let mut pos = 1;
        if !tokens.get(pos).map_or(false, |t| t.is_keyword("INTO")) {
            return Err(Error::syntax("INSERT 缺少 INTO", self.fragment(tokens)));
        }
        pos += 1;
        let target = match tokens.get(pos) {
            Some(t) if t.is_identifier() && !t.is_keyword("VALUES") => t.text.clone(),
            _ => return Err(Error::syntax("INSERT 缺少目标表", self.fragment(tokens))),
        };
        pos += 1;

        let mut columns = None;
        if tokens.get(pos).map_or(false, |t| t.is_symbol("(")) {
            let close = find_closing(tokens, pos)
                .ok_or_else(|| Error::syntax("列清单括号未闭合", self.fragment(&tokens[pos..])))?;
            let mut names = Vec::new();
            for col in split_top_level(&tokens[pos + 1..close], |t| t.is_symbol(",")) {
                match col {
                    [t] if t.is_identifier() => names.push(t.text.clone()),
                    _ => return Err(Error::syntax("无效的列名", self.fragment(col))),
                }
            }
            columns = Some(names);
            pos = close + 1;
        }

        match tokens.get(pos) {
            Some(t) if t.is_keyword("VALUES") => pos += 1,
            Some(t) if t.is_keyword("SELECT") => return Err(Error::unsupported("INSERT ... SELECT")),
            _ => return Err(Error::syntax("INSERT 缺少 VALUES", self.fragment(&tokens[pos.min(tokens.len())..]))),
        }

        let mut rows = Vec::new();
        for row in split_top_level(&tokens[pos..], |t| t.is_symbol(",")) {
            let inner = strip_parens(row)
                .ok_or_else(|| Error::syntax("VALUES 行必须用括号包围", self.fragment(row)))?;
            let mut values = Vec::new();
            for item in split_top_level(inner, |t| t.is_symbol(",")) {
                let value = self
                    .try_value(item)?
                    .ok_or_else(|| Error::syntax("VALUES 只能包含常量", self.fragment(item)))?;
                values.push(value);
            }
            rows.push(values);
        }

        let mut query = Query::new(QueryKind::Insert);
        query.from.push(TableRef::new(target.clone()));
        query.target = Some(target);
        query.insert_rows = Some(match columns {
            Some(names) => {
                let mut named = Vec::with_capacity(rows.len());
                for values in rows {
                    if values.len() != names.len() {
                        return Err(Error::syntax(
                            format!("列数 {} 与值数 {} 不一致", names.len(), values.len()),
                            self.fragment(&tokens[pos..]),
                        ));
                    }
                    let row: IndexMap<String, Value> = names.iter().cloned().zip(values).collect();
                    named.push(row);
                }
                InsertRows::Named(named)
            }
            None => InsertRows::Positional(rows),
        });
        Ok(query)
    }

    /// `DELETE FROM t [alias] [WHERE cond]`
    fn parse_delete(&self, tokens: &[Token]) -> Result<Query> {
        if !tokens.get(1).map_or(false, |t| t.is_keyword("FROM")) {
            return Err(Error::syntax("DELETE 缺少 FROM", self.fragment(tokens)));
        }
        let rest = &tokens[2..];
        let where_idx = rest.iter().position(|t| t.is_keyword("WHERE"));
        let table_tokens = &rest[..where_idx.unwrap_or(rest.len())];
        let (table, used) = self.parse_table_ref(table_tokens)?;
        if used != table_tokens.len() {
            return Err(Error::unsupported("DELETE 只支持单表"));
        }

        let mut query = Query::new(QueryKind::Delete);
        query.target = Some(table.name.clone());
        query.from.push(table);

        if let Some(idx) = where_idx {
            let body = &rest[idx + 1..];
            if body.is_empty() {
                return Err(Error::syntax("WHERE 子句为空", self.fragment(&rest[idx..])));
            }
            if contains_subquery(body) {
                return Err(Error::unsupported("子查询"));
            }
            let (joins, conditions) = self.parse_conditions(body)?;
            if !joins.is_empty() {
                return Err(Error::unsupported("DELETE 中的连接条件"));
            }
            query.conditions = conditions;
        }
        Ok(query)
    }
}

enum Predicate {
    Join(JoinCondition),
    Condition(Condition),
}

/// `col`, `rel.col`, or a backtick-quoted column
fn simple_attribute(tokens: &[Token]) -> Option<Attribute> {
    let reserved = |t: &Token| {
        ["TRUE", "FALSE", "NULL", "DISTINCT", "SELECT"]
            .iter()
            .any(|k| t.is_keyword(k))
    };
    match tokens {
        [col] if col.is_identifier() && !reserved(col) => Some(Attribute::unqualified(col.text.clone())),
        [rel, dot, col] if rel.is_identifier() && dot.is_symbol(".") && col.is_identifier() => {
            Some(Attribute::new(rel.text.clone(), col.text.clone()))
        }
        _ => None,
    }
}

fn contains_aggregate_call(tokens: &[Token]) -> bool {
    tokens.windows(2).any(|w| {
        w[0].kind == TokenKind::Word
            && AggregateFunction::from_name(&w[0].text).is_some()
            && w[1].is_symbol("(")
    })
}

fn find_closing(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.is_symbol("(") {
            depth += 1;
        } else if t.is_symbol(")") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Mirror a comparison so the attribute ends up on the left
fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Ge => CompareOp::Le,
        other => other,
    }
}

/// Convenience function to parse a SQL statement
pub fn parse(query: &str) -> Result<Query> {
    SqlParser::new(query).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(item: &SelectItem) -> &Attribute {
        match item {
            SelectItem::Column(attr) => attr,
            _ => panic!("Expected column projection"),
        }
    }

    #[test]
    fn test_clause_keyword_table() {
        let tokens = tokenize("SELECT a FROM t WHERE x = 1 GROUP BY a HAVING COUNT(a) > 1 ORDER BY a LIMIT 5 OFFSET 2").unwrap();
        let parser = SqlParser::new("");
        let clauses: Vec<Clause> = parser
            .split_clauses(&tokens)
            .unwrap()
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert_eq!(
            clauses,
            vec![
                Clause::Select,
                Clause::From,
                Clause::Where,
                Clause::GroupBy,
                Clause::Having,
                Clause::OrderBy,
                Clause::Limit,
                Clause::Offset
            ]
        );
    }

    #[test]
    fn test_table_named_order() {
        let query = parse("SELECT order.id, total FROM order WHERE total > 10 ORDER BY total DESC").unwrap();
        assert_eq!(query.from[0].name, "order");
        assert_eq!(column(&query.projection[0]).relation, "order");
        assert_eq!(query.order_by.len(), 1);
        assert!(query.order_by[0].descending);
        assert_eq!(query.filters().count(), 1);
    }

    #[test]
    fn test_keywords_as_column_names() {
        let query = parse("SELECT limit, offset, group FROM settings LIMIT 3").unwrap();
        assert_eq!(query.projection.len(), 3);
        assert_eq!(column(&query.projection[2]).name, "group");
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.offset, None);
    }

    #[test]
    fn test_keyword_inside_parentheses_does_not_split() {
        let query = parse("SELECT name FROM client WHERE (age > 18 OR city = 'Paris') AND name LIKE 'A%'").unwrap();
        assert_eq!(query.conditions.len(), 2);
        match &query.conditions[0] {
            Condition::Any(groups) => assert_eq!(groups.len(), 2),
            _ => panic!("Expected disjunction"),
        }
    }

    #[test]
    fn test_parse_projection_forms() {
        let query = parse("SELECT DISTINCT c.name AS n, COUNT(*), AVG(DISTINCT price) avg_price, price * stock AS value FROM client c").unwrap();
        assert!(query.distinct);
        assert_eq!(query.projection.len(), 4);

        let first = column(&query.projection[0]);
        assert_eq!(first.relation, "c");
        assert_eq!(first.alias.as_deref(), Some("n"));

        let count = column(&query.projection[1]);
        assert!(count.is_star());
        assert_eq!(count.aggregate, Some(AggregateFunction::Count));

        let avg = column(&query.projection[2]);
        assert!(avg.distinct);
        assert_eq!(avg.alias.as_deref(), Some("avg_price"));

        match &query.projection[3] {
            SelectItem::Computed { alias, .. } => assert_eq!(alias.as_deref(), Some("value")),
            _ => panic!("Expected computed projection"),
        }
        assert_eq!(query.from[0].alias.as_deref(), Some("c"));
    }

    #[test]
    fn test_select_star() {
        let query = parse("SELECT * FROM product;").unwrap();
        assert!(query.select_all);
        assert!(query.projection.is_empty());
    }

    #[test]
    fn test_join_detection() {
        let query = parse(
            "SELECT c.name, o.total FROM client c JOIN orders o ON c.subject = o.client WHERE o.total > c.credit AND o.total > 100",
        )
        .unwrap();
        assert_eq!(query.from.len(), 2);
        assert_eq!(query.joins.len(), 1);
        assert_eq!(query.joins[0].left.name, "subject");
        assert_eq!(query.conditions.len(), 2);
        assert!(matches!(query.conditions[0], Condition::Columns(_)));
        assert!(matches!(query.conditions[1], Condition::Compare(_)));
    }

    #[test]
    fn test_implicit_join_in_where() {
        let query = parse("SELECT a.name FROM client a, orders b WHERE a.id = b.client_id").unwrap();
        assert_eq!(query.from.len(), 2);
        assert_eq!(query.joins.len(), 1);
        assert!(query.conditions.is_empty());
    }

    #[test]
    fn test_operators() {
        let query = parse(
            "SELECT name FROM product WHERE price BETWEEN 50 AND 300 AND category IN ('Electronics', 'Furniture') AND email LIKE '%example.com' AND 18 <= age",
        )
        .unwrap();
        let filters: Vec<&FilterCondition> = query.filters().collect();
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[0].op, CompareOp::Between);
        assert_eq!(
            filters[0].value,
            Value::Range(
                Box::new(Value::Number("50".into())),
                Box::new(Value::Number("300".into()))
            )
        );
        assert_eq!(filters[1].op, CompareOp::In);
        assert_eq!(filters[2].op, CompareOp::Like);
        assert_eq!(filters[3].op, CompareOp::Ge);
        assert_eq!(filters[3].attribute.name, "age");
    }

    #[test]
    fn test_expression_filter() {
        let query = parse("SELECT name FROM product WHERE (price * stock) > 1000").unwrap();
        match &query.conditions[0] {
            Condition::Expression(f) => {
                assert_eq!(f.op, CompareOp::Gt);
                assert_eq!(f.value, Value::Number("1000".into()));
            }
            _ => panic!("Expected expression filter"),
        }
    }

    #[test]
    fn test_group_having_order() {
        let query = parse(
            "SELECT category, COUNT(name) AS cnt FROM product GROUP BY category HAVING COUNT(name) > 2 AND AVG(price) < 100 ORDER BY cnt DESC LIMIT 10 OFFSET 5",
        )
        .unwrap();
        assert_eq!(query.group_by.len(), 1);
        assert_eq!(query.having.len(), 2);
        assert_eq!(query.having[1].attribute.aggregate, Some(AggregateFunction::Avg));
        assert_eq!(query.order_by[0].attribute.name, "cnt");
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }

    #[test]
    fn test_union_trailing_clauses_are_outer() {
        let query = parse("SELECT name FROM client UNION SELECT name FROM product LIMIT 10").unwrap();
        assert_eq!(query.limit, Some(10));
        let combination = query.combination.unwrap();
        assert_eq!(combination.kind, CombinatorKind::Union);
        assert_eq!(combination.left.limit, None);
        assert_eq!(combination.right.limit, None);
        assert_eq!(combination.right.from[0].name, "product");
    }

    #[test]
    fn test_combinator_chain_is_left_associative() {
        let query = parse(
            "(SELECT name FROM a) INTERSECT (SELECT name FROM b LIMIT 3) EXCEPT SELECT name FROM c ORDER BY name",
        )
        .unwrap();
        assert_eq!(query.order_by.len(), 1);
        let outer = query.combination.unwrap();
        assert_eq!(outer.kind, CombinatorKind::Except);
        let inner = outer.left.combination.unwrap();
        assert_eq!(inner.kind, CombinatorKind::Intersect);
        assert_eq!(inner.right.limit, Some(3));
    }

    #[test]
    fn test_parse_insert() {
        let query = parse("INSERT INTO client (name, email, age) VALUES ('Bob', 'bob@example.com', 25), ('Eve', 'eve@example.com', 31)").unwrap();
        assert_eq!(query.kind, QueryKind::Insert);
        assert_eq!(query.target.as_deref(), Some("client"));
        match query.insert_rows.unwrap() {
            InsertRows::Named(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].get("age"), Some(&Value::Number("25".into())));
                let keys: Vec<&String> = rows[1].keys().collect();
                assert_eq!(keys, vec!["name", "email", "age"]);
            }
            _ => panic!("Expected named rows"),
        }
    }

    #[test]
    fn test_insert_errors() {
        assert!(matches!(
            parse("INSERT INTO client (name, age) VALUES ('Bob')"),
            Err(Error::Syntax { .. })
        ));
        assert!(matches!(parse("INSERT client VALUES (1)"), Err(Error::Syntax { .. })));
        assert!(matches!(parse("INSERT INTO client (name)"), Err(Error::Syntax { .. })));
        match parse("INSERT INTO client VALUES ('Bob', 3)").unwrap().insert_rows {
            Some(InsertRows::Positional(rows)) => assert_eq!(rows[0].len(), 2),
            _ => panic!("Expected positional rows"),
        }
    }

    #[test]
    fn test_parse_delete() {
        let query = parse("DELETE FROM client WHERE age < 18").unwrap();
        assert_eq!(query.kind, QueryKind::Delete);
        assert_eq!(query.target.as_deref(), Some("client"));
        assert_eq!(query.filters().count(), 1);

        let query = parse("DELETE FROM client").unwrap();
        assert!(query.conditions.is_empty());

        assert!(matches!(parse("DELETE client"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_unsupported_constructs() {
        let cases = [
            "SELECT name FROM client WHERE age NOT IN (1, 2)",
            "SELECT name FROM client WHERE age NOT BETWEEN 1 AND 2",
            "SELECT name FROM client WHERE email IS NULL",
            "SELECT name FROM client WHERE email IS NOT NULL",
            "SELECT name FROM client WHERE id IN (SELECT client FROM orders)",
            "SELECT SUM(COUNT(x)) FROM client",
            "SELECT name FROM client LEFT JOIN orders ON client.id = orders.client",
            "UPDATE client SET name = 'x'",
        ];
        for sql in cases {
            assert!(
                matches!(parse(sql), Err(Error::UnsupportedConstruct(_))),
                "expected unsupported: {}",
                sql
            );
        }
    }

    #[test]
    fn test_missing_query_kind() {
        match parse("SHOW TABLES") {
            Err(Error::Syntax { fragment, .. }) => assert_eq!(fragment, "SHOW TABLES"),
            other => panic!("Expected syntax error, got {:?}", other),
        }
        assert!(matches!(parse("   "), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_empty_clause_reports_fragment() {
        for (sql, expected) in [
            ("SELECT FROM client", "SELECT FROM client"),
            ("SELECT name FROM client WHERE", "WHERE"),
            ("SELECT name FROM client ORDER BY", "ORDER BY"),
            ("DELETE FROM client WHERE", "WHERE"),
            ("SELECT a.x FROM t a JOIN u b ON", "ON"),
        ] {
            match parse(sql) {
                Err(Error::Syntax { fragment, .. }) => assert_eq!(fragment, expected, "{}", sql),
                other => panic!("Expected syntax error for {}, got {:?}", sql, other),
            }
        }
    }

    #[test]
    fn test_unknown_aggregate() {
        let query = parse("SELECT MEDIAN(price) FROM product").unwrap();
        assert_eq!(column(&query.projection[0]).aggregate, Some(AggregateFunction::Count));

        let strict = SqlParser::new("SELECT MEDIAN(price) FROM product").strict(true).parse();
        assert!(matches!(strict, Err(Error::UnsupportedConstruct(_))));
    }
}
