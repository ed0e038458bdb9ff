//! Variable binding context
//!
//! Per-conversion state shared by the clause converters: subject variables per
//! relation, object variables per (relation, attribute), projection aliases and
//! the triples emitted so far. A context is created for one query (or one
//! combinator branch) and dropped with it.

use crate::query::AggregateFunction;
use crate::sparql::TriplePattern;
use crate::types::{Term, Variable};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// What a projection alias stands for
#[derive(Debug, Clone, PartialEq)]
pub struct AliasBinding {
    /// Variable carrying the projected value
    pub var: Variable,
    /// Aggregated variable, `None` for `COUNT(*)`
    pub base: Option<Variable>,
    pub aggregate: Option<AggregateFunction>,
    pub distinct: bool,
}

#[derive(Debug, Default)]
pub struct BindingContext {
    /// relation key -> `?sN`, in first-appearance order
    subjects: IndexMap<String, Variable>,
    /// (relation key, attribute) -> object variable
    objects: HashMap<(String, String), Variable>,
    /// `rel.col` / `col` -> variable, for expression rendering
    names: HashMap<String, Variable>,
    used: HashSet<String>,
    aliases: HashMap<String, AliasBinding>,
    triples: Vec<TriplePattern>,
    typed: HashSet<String>,
    join_count: usize,
}

/// Lowercase and replace characters SPARQL does not allow in variable names
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "v".to_string()
    } else {
        cleaned
    }
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject variable of a relation; allocated on first use
    pub fn subject(&mut self, relation: &str) -> Variable {
        let key = relation.to_lowercase();
        if let Some(var) = self.subjects.get(&key) {
            return var.clone();
        }
        let var = self.fresh(&format!("s{}", self.subjects.len()));
        trace!(relation = %key, var = %var, "subject variable");
        self.names
            .entry(format!("{}.{}", key, crate::schema::SUBJECT_COLUMN))
            .or_insert_with(|| var.clone());
        self.subjects.insert(key, var.clone());
        var
    }

    pub fn existing_subject(&self, relation: &str) -> Option<&Variable> {
        self.subjects.get(&relation.to_lowercase())
    }

    pub fn subjects(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.subjects.iter()
    }

    pub fn object(&self, relation: &str, attribute: &str) -> Option<&Variable> {
        self.objects
            .get(&(relation.to_lowercase(), attribute.to_lowercase()))
    }

    /// Object variable for `relation.attribute`; the flag is `true` when newly allocated.
    ///
    /// Naming: the attribute itself, then `relation_attribute`, then a numeric suffix.
    pub fn bind_object(&mut self, relation: &str, attribute: &str) -> (Variable, bool) {
        let key = (relation.to_lowercase(), attribute.to_lowercase());
        if let Some(var) = self.objects.get(&key) {
            return (var.clone(), false);
        }
        let plain = sanitize(attribute);
        let var = if self.used.contains(&plain) {
            self.fresh(&format!("{}_{}", sanitize(relation), plain))
        } else {
            self.fresh(&plain)
        };
        trace!(relation = %key.0, attribute = %key.1, var = %var, "object variable");
        self.names
            .entry(format!("{}.{}", key.0, key.1))
            .or_insert_with(|| var.clone());
        self.names.entry(key.1.clone()).or_insert_with(|| var.clone());
        self.objects.insert(key, var.clone());
        (var, true)
    }

    /// Unused variable derived from `base`
    pub fn fresh(&mut self, base: &str) -> Variable {
        let base = sanitize(base);
        let mut name = base.clone();
        let mut n = 2;
        while self.used.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.used.insert(name.clone());
        Variable::new(name)
    }

    /// `?joinN` for value joins
    pub fn join_var(&mut self) -> Variable {
        let var = self.fresh(&format!("join{}", self.join_count));
        self.join_count += 1;
        var
    }

    /// Append a triple unless an identical one is already present
    pub fn push_triple(&mut self, triple: TriplePattern) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    pub fn triples(&self) -> &[TriplePattern] {
        &self.triples
    }

    pub fn take_triples(&mut self) -> Vec<TriplePattern> {
        std::mem::take(&mut self.triples)
    }

    /// Remove and return the triples emitted since `start`
    pub fn split_triples_off(&mut self, start: usize) -> Vec<TriplePattern> {
        self.triples.split_off(start.min(self.triples.len()))
    }

    /// Mark a relation's type triple as emitted; `false` if it already was
    pub fn mark_typed(&mut self, relation: &str) -> bool {
        self.typed.insert(relation.to_lowercase())
    }

    /// Whether any emitted triple has `var` as subject or object
    pub fn mentions(&self, var: &Variable) -> bool {
        let term = Term::Variable(var.clone());
        self.triples
            .iter()
            .any(|t| t.subject == term || t.object == term)
    }

    pub fn register_alias(&mut self, alias: &str, binding: AliasBinding) {
        self.names
            .entry(alias.to_lowercase())
            .or_insert_with(|| binding.var.clone());
        self.aliases.insert(alias.to_lowercase(), binding);
    }

    pub fn alias(&self, name: &str) -> Option<&AliasBinding> {
        self.aliases.get(&name.to_lowercase())
    }

    /// Name map handed to expression rendering
    pub fn names(&self) -> &HashMap<String, Variable> {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Iri;

    #[test]
    fn test_subject_allocation_order() {
        let mut ctx = BindingContext::new();
        assert_eq!(ctx.subject("client").name(), "s0");
        assert_eq!(ctx.subject("orders").name(), "s1");
        assert_eq!(ctx.subject("CLIENT").name(), "s0");
        let order: Vec<&str> = ctx.subjects().map(|(_, v)| v.name()).collect();
        assert_eq!(order, vec!["s0", "s1"]);
    }

    #[test]
    fn test_object_naming() {
        let mut ctx = BindingContext::new();
        let (a, new) = ctx.bind_object("a", "Name");
        assert!(new);
        assert_eq!(a.name(), "name");
        let (b, _) = ctx.bind_object("b", "name");
        assert_eq!(b.name(), "b_name");
        let (again, new) = ctx.bind_object("A", "name");
        assert!(!new);
        assert_eq!(again, a);
        assert_eq!(ctx.names().get("b.name"), Some(&b));
        assert_eq!(ctx.names().get("name"), Some(&a));
    }

    #[test]
    fn test_fresh_and_join_vars() {
        let mut ctx = BindingContext::new();
        assert_eq!(ctx.fresh("count").name(), "count");
        assert_eq!(ctx.fresh("count").name(), "count_2");
        assert_eq!(ctx.join_var().name(), "join0");
        assert_eq!(ctx.join_var().name(), "join1");
        assert_eq!(ctx.fresh("unit-price").name(), "unit_price");
    }

    #[test]
    fn test_triple_dedup() {
        let mut ctx = BindingContext::new();
        let s = ctx.subject("client");
        let t = TriplePattern::type_of(s.clone(), Iri::new("http://example.org/types/Client"));
        assert!(ctx.push_triple(t.clone()));
        assert!(!ctx.push_triple(t));
        assert_eq!(ctx.triples().len(), 1);
        assert!(ctx.mentions(&s));
        assert!(ctx.mark_typed("client"));
        assert!(!ctx.mark_typed("Client"));
    }
}
