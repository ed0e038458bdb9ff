//! Conversion scope of one SELECT (or DELETE) body
//!
//! Ties the relational query, the handle resolver and a fresh
//! [`BindingContext`] together. The clause converters are `impl` blocks on
//! [`QueryScope`] spread over the sibling modules.

use super::bindings::BindingContext;
use crate::error::{Error, Result};
use crate::query::{Attribute, Query, TableRef};
use crate::schema::HandleResolver;
use crate::sparql::{Expr, GroupPattern, TriplePattern};
use crate::types::Variable;
use tracing::warn;

/// A source relation as seen by the converters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Alias or table name; keys the subject variable
    pub key: String,
    /// Table name; keys type lookups
    pub table: String,
}

impl From<&TableRef> for Relation {
    fn from(t: &TableRef) -> Self {
        Relation {
            key: t.binding_name().to_string(),
            table: t.name.clone(),
        }
    }
}

pub struct QueryScope<'a> {
    pub(super) query: &'a Query,
    pub(super) resolver: &'a HandleResolver<'a>,
    pub(super) ctx: BindingContext,
    /// Property triples bound only inside a disjunct
    pub(super) optional: Vec<TriplePattern>,
    pub(super) filters: Vec<Expr>,
}

/// What a scope emitted, split by how it must match
#[derive(Debug, Default)]
pub struct ScopePattern {
    pub triples: Vec<TriplePattern>,
    pub optional: Vec<TriplePattern>,
    pub filters: Vec<Expr>,
}

impl ScopePattern {
    /// Required triples, one `OPTIONAL` block per optional triple, then filters
    pub fn into_group(self) -> GroupPattern {
        let mut group = GroupPattern::basic(self.triples, Vec::new());
        for triple in self.optional {
            group.push_optional(GroupPattern::basic(vec![triple], Vec::new()));
        }
        for filter in self.filters {
            group.push_filter(filter);
        }
        group
    }
}

impl<'a> QueryScope<'a> {
    pub fn new(query: &'a Query, resolver: &'a HandleResolver<'a>) -> Self {
        Self {
            query,
            resolver,
            ctx: BindingContext::new(),
            optional: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn context(&self) -> &BindingContext {
        &self.ctx
    }

    pub(super) fn strict(&self) -> bool {
        self.resolver.is_strict()
    }

    /// Source relation owning an attribute.
    ///
    /// Qualified names go through aliases and table names. Unqualified names
    /// pick the only relation, else the first whose catalog columns contain
    /// the attribute, else the first relation.
    pub fn relation_for(&self, attr: &Attribute) -> Result<Relation> {
        let from = &self.query.from;
        if attr.is_qualified() {
            if let Some(table) = self.query.table_ref(&attr.relation) {
                return Ok(table.into());
            }
            if self.strict() {
                return Err(Error::unsupported(format!("未知的关系: {}", attr.relation)));
            }
            if let [only] = from.as_slice() {
                warn!(relation = %attr.relation, table = %only.name, "relation not in FROM, using the only source table");
                return Ok(only.into());
            }
            warn!(relation = %attr.relation, "relation not in FROM, treating it as a table");
            return Ok(Relation {
                key: attr.relation.clone(),
                table: attr.relation.clone(),
            });
        }

        let first = from
            .first()
            .ok_or_else(|| Error::syntax("缺少来源表", attr.to_string()))?;
        if from.len() == 1 {
            return Ok(first.into());
        }
        let catalog = self.resolver.catalog();
        let owner = from
            .iter()
            .find(|t| catalog.validate(&t.name, &attr.name))
            .unwrap_or(first);
        Ok(owner.into())
    }

    /// In strict mode every FROM table must be known to the catalog
    pub fn check_relations(&self) -> Result<()> {
        if !self.strict() {
            return Ok(());
        }
        for table in &self.query.from {
            self.resolver.type_handle_for(&table.name)?;
        }
        Ok(())
    }

    /// Subject variable of a relation
    pub fn subject_of(&mut self, relation: &Relation) -> Variable {
        self.ctx.subject(&relation.key)
    }

    /// Emit the relation's type triple once
    pub fn ensure_typed(&mut self, relation: &Relation) -> Result<Variable> {
        let subject = self.subject_of(relation);
        if self.ctx.mark_typed(&relation.key) {
            let type_iri = self.resolver.type_handle_for(&relation.table)?;
            self.ctx
                .push_triple(TriplePattern::type_of(subject.clone(), type_iri));
        }
        Ok(subject)
    }

    /// Variable holding `attr`: the subject variable for `subject`, otherwise an
    /// object variable backed by a property triple (reused when already bound).
    pub fn attribute_var(&mut self, attr: &Attribute) -> Result<Variable> {
        let relation = self.relation_for(attr)?;
        if attr.is_subject() {
            return Ok(self.subject_of(&relation));
        }
        let subject = self.subject_of(&relation);
        let (var, new) = self.ctx.bind_object(&relation.key, &attr.name);
        if new {
            let predicate = self.resolver.predicate_handle_for(&attr.name)?;
            self.ctx
                .push_triple(TriplePattern::new(subject, predicate, var.clone()));
        }
        Ok(var)
    }

    /// Bind every column an arithmetic expression references, then render it
    pub fn render_expression(&mut self, expr: &crate::query::ExprNode) -> Result<String> {
        for (relation, column) in expr.operands() {
            let attr = match relation {
                Some(rel) => Attribute::new(rel, column),
                None => Attribute::unqualified(column),
            };
            self.attribute_var(&attr)?;
        }
        expr.render(self.ctx.names(), self.strict())
    }

    /// Give every FROM relation without any triple its type triple
    pub fn type_unbound_relations(&mut self) -> Result<()> {
        let relations: Vec<Relation> = self.query.from.iter().map(Relation::from).collect();
        for relation in relations {
            let subject = self.subject_of(&relation);
            if !self.ctx.mentions(&subject) {
                self.ensure_typed(&relation)?;
            }
        }
        Ok(())
    }

    /// Emitted triples and filters, in emission order
    pub fn finish(mut self) -> ScopePattern {
        ScopePattern {
            triples: self.ctx.take_triples(),
            optional: self.optional,
            filters: self.filters,
        }
    }
}
