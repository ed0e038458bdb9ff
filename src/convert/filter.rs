//! Filter / join converter
//!
//! Joins run first, then row filters, both against the bindings the
//! projection already made.
//!
//! | join shape                | emitted                                   |
//! |---------------------------|-------------------------------------------|
//! | catalog join edge         | `?sA edge ?sB`                            |
//! | `subject` = `attr`        | `?sAttr attr ?sSubject`                   |
//! | `subject` = `subject`     | `FILTER(?sA = ?sB)`                       |
//! | `attr` = `attr`           | `?sA attrA ?joinN . ?sB attrB ?joinN`     |
//!
//! Inside an OR, an attribute that not every alternative mentions is bound
//! through `OPTIONAL`, so rows lacking it can still satisfy another branch.

use super::operators::translate;
use super::scope::QueryScope;
use crate::error::Result;
use crate::query::{Attribute, Condition, JoinCondition};
use crate::sparql::{Expr, TriplePattern};
use std::collections::BTreeSet;
use tracing::{debug, trace};

impl<'a> QueryScope<'a> {
    pub fn convert_joins(&mut self) -> Result<()> {
        let query = self.query;
        for join in &query.joins {
            self.convert_join(join)?;
        }
        Ok(())
    }

    fn convert_join(&mut self, join: &JoinCondition) -> Result<()> {
        let left = self.relation_for(&join.left)?;
        let right = self.relation_for(&join.right)?;
        let left_subject = self.subject_of(&left);
        let right_subject = self.subject_of(&right);

        if let Some(edge) =
            self.resolver
                .join_edge(&left.table, &join.left.name, &right.table, &join.right.name)
        {
            trace!(predicate = %edge.predicate, forward = edge.forward, "catalog join edge");
            let triple = if edge.forward {
                TriplePattern::new(left_subject, edge.predicate, right_subject)
            } else {
                TriplePattern::new(right_subject, edge.predicate, left_subject)
            };
            self.ctx.push_triple(triple);
            return Ok(());
        }

        match (join.left.is_subject(), join.right.is_subject()) {
            (true, true) => {
                self.filters.push(Expr::compare(
                    "=",
                    Expr::var(&left_subject),
                    Expr::var(&right_subject),
                ));
            }
            (true, false) => {
                let predicate = self.resolver.predicate_handle_for(&join.right.name)?;
                self.ctx
                    .push_triple(TriplePattern::new(right_subject, predicate, left_subject));
            }
            (false, true) => {
                let predicate = self.resolver.predicate_handle_for(&join.left.name)?;
                self.ctx
                    .push_triple(TriplePattern::new(left_subject, predicate, right_subject));
            }
            (false, false) => {
                let shared = self.ctx.join_var();
                let left_predicate = self.resolver.predicate_handle_for(&join.left.name)?;
                let right_predicate = self.resolver.predicate_handle_for(&join.right.name)?;
                self.ctx.push_triple(TriplePattern::new(
                    left_subject,
                    left_predicate,
                    shared.clone(),
                ));
                self.ctx
                    .push_triple(TriplePattern::new(right_subject, right_predicate, shared));
            }
        }
        Ok(())
    }

    pub fn convert_conditions(&mut self) -> Result<()> {
        let query = self.query;
        // columns read by a plain conjunct are required even when an OR also reads them
        for condition in &query.conditions {
            if matches!(condition, Condition::Any(_)) {
                continue;
            }
            let mut attrs = Vec::new();
            condition_attributes(condition, &mut attrs);
            for attr in attrs.iter().filter(|a| !a.is_subject()) {
                self.attribute_var(attr)?;
            }
        }
        for condition in &query.conditions {
            let expr = self.condition_expr(condition)?;
            debug!(filter = %expr, "filter converted");
            self.filters.push(expr);
        }
        Ok(())
    }

    fn condition_expr(&mut self, condition: &Condition) -> Result<Expr> {
        match condition {
            Condition::Compare(filter) => {
                let target = self.operand_var(&filter.attribute)?;
                translate(
                    Expr::var(&target),
                    filter.op,
                    &filter.value,
                    filter.attribute.is_subject(),
                )
            }
            Condition::Columns(cmp) => {
                let left = self.operand_var(&cmp.left)?;
                let right = self.operand_var(&cmp.right)?;
                Ok(Expr::compare(cmp.op.symbol(), Expr::var(&left), Expr::var(&right)))
            }
            Condition::Expression(filter) => {
                let rendered = self.render_expression(&filter.expr)?;
                translate(Expr::Raw(rendered), filter.op, &filter.value, false)
            }
            Condition::Any(groups) => {
                self.bind_shared_attributes(groups)?;
                let start = self.ctx.triples().len();
                let mut alternatives = Vec::with_capacity(groups.len());
                for group in groups {
                    let conjuncts = group
                        .iter()
                        .map(|c| self.condition_expr(c))
                        .collect::<Result<Vec<_>>>()?;
                    alternatives.push(Expr::and(conjuncts));
                }
                let optional = self.ctx.split_triples_off(start);
                if !optional.is_empty() {
                    trace!(count = optional.len(), "disjunct-only bindings made optional");
                }
                self.optional.extend(optional);
                Ok(Expr::or(alternatives))
            }
        }
    }

    /// Bind as required every attribute that all alternatives reference
    fn bind_shared_attributes(&mut self, groups: &[Vec<Condition>]) -> Result<()> {
        let mut shared: Option<BTreeSet<(String, String)>> = None;
        let mut first_group = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            let mut attrs = Vec::new();
            group.iter().for_each(|c| condition_attributes(c, &mut attrs));
            let keys = attrs
                .iter()
                .filter(|a| !a.is_subject())
                .map(|a| self.attribute_key(a))
                .collect::<Result<BTreeSet<_>>>()?;
            shared = Some(match shared {
                None => keys,
                Some(seen) => seen.intersection(&keys).cloned().collect(),
            });
            if i == 0 {
                first_group = attrs;
            }
        }
        let shared = shared.unwrap_or_default();
        for attr in first_group.iter().filter(|a| !a.is_subject()) {
            if shared.contains(&self.attribute_key(attr)?) {
                self.attribute_var(attr)?;
            }
        }
        Ok(())
    }

    fn attribute_key(&self, attr: &Attribute) -> Result<(String, String)> {
        let relation = self.relation_for(attr)?;
        Ok((relation.key.to_lowercase(), attr.name.to_lowercase()))
    }

    /// Subject variable for `subject`, otherwise the (possibly reused) object variable
    fn operand_var(&mut self, attr: &Attribute) -> Result<crate::types::Variable> {
        if attr.is_subject() {
            let relation = self.relation_for(attr)?;
            return Ok(self.subject_of(&relation));
        }
        self.attribute_var(attr)
    }
}

/// Every column a condition reads
fn condition_attributes(condition: &Condition, out: &mut Vec<Attribute>) {
    match condition {
        Condition::Compare(filter) => out.push(filter.attribute.clone()),
        Condition::Columns(cmp) => {
            out.push(cmp.left.clone());
            out.push(cmp.right.clone());
        }
        Condition::Expression(filter) => {
            out.extend(filter.expr.operands().into_iter().map(|(relation, column)| {
                match relation {
                    Some(rel) => Attribute::new(rel, column),
                    None => Attribute::unqualified(column),
                }
            }))
        }
        Condition::Any(groups) => groups
            .iter()
            .flatten()
            .for_each(|c| condition_attributes(c, out)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::query::parse;
    use crate::schema::{EmptyCatalog, HandleResolver, MappedCatalog};

    fn convert(sql: &str) -> (Vec<String>, Vec<String>) {
        let catalog = EmptyCatalog;
        convert_with(&catalog, sql)
    }

    fn convert_with(catalog: &dyn crate::schema::Catalog, sql: &str) -> (Vec<String>, Vec<String>) {
        let (triples, _, filters) = convert_parts(catalog, sql);
        (triples, filters)
    }

    /// Required triples, optional triples, filters
    fn convert_parts(
        catalog: &dyn crate::schema::Catalog,
        sql: &str,
    ) -> (Vec<String>, Vec<String>, Vec<String>) {
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(catalog, &config);
        let query = parse(sql).unwrap();
        let mut scope = QueryScope::new(&query, &resolver);
        scope.convert_projection().unwrap();
        scope.convert_joins().unwrap();
        scope.convert_conditions().unwrap();
        let pattern = scope.finish();
        let render = |triples: &[TriplePattern]| -> Vec<String> {
            triples.iter().map(|t| t.to_string()).collect()
        };
        (
            render(&pattern.triples),
            render(&pattern.optional),
            pattern.filters.iter().map(|f| f.to_string()).collect(),
        )
    }

    #[test]
    fn test_value_join_shares_one_variable() {
        let (triples, filters) =
            convert("SELECT a.x FROM client a, orders b WHERE a.id = b.client_id");
        let joins: Vec<&String> = triples.iter().filter(|t| t.ends_with("?join0")).collect();
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[0], "?s0 <http://example.org/ontology/id> ?join0");
        assert_eq!(joins[1], "?s1 <http://example.org/ontology/client_id> ?join0");
        assert!(filters.is_empty());
    }

    #[test]
    fn test_subject_join_is_one_triple() {
        let (triples, _) =
            convert("SELECT o.total FROM orders o JOIN client c ON o.client = c.subject");
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[1], "?s0 <http://example.org/ontology/client> ?s1");
    }

    #[test]
    fn test_subject_subject_join_is_filter() {
        let (triples, filters) =
            convert("SELECT a.name FROM client a, client b WHERE a.subject = b.subject");
        assert_eq!(triples.len(), 1);
        assert_eq!(filters, vec!["?s0 = ?s1"]);
    }

    #[test]
    fn test_catalog_join_edge() {
        let catalog = MappedCatalog::from_json(
            r#"{"joins": [{"from_table": "orders", "from_column": "customerID",
                           "to_table": "customer", "to_column": "customerID",
                           "predicate": "http://example.org/ontology/customer"}]}"#,
        )
        .unwrap();
        let (triples, _) = convert_with(
            &catalog,
            "SELECT c.name FROM customer c JOIN orders o ON c.customerID = o.customerID",
        );
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[1], "?s1 <http://example.org/ontology/customer> ?s0");
    }

    #[test]
    fn test_filter_reuses_projection_variable() {
        let (triples, filters) =
            convert("SELECT name, price FROM product WHERE price BETWEEN 50 AND 300");
        assert_eq!(triples.len(), 2);
        assert_eq!(filters, vec!["?price >= 50 && ?price <= 300"]);
    }

    #[test]
    fn test_filter_binds_unprojected_attribute() {
        let (triples, filters) = convert("SELECT name FROM client WHERE email LIKE '%example.com'");
        assert_eq!(triples.len(), 2);
        assert_eq!(filters, vec![r#"regex(?email, ".*example.com", "i")"#]);
    }

    #[test]
    fn test_disjunction_and_column_comparison() {
        let (_, filters) = convert(
            "SELECT name FROM product WHERE (category = 'A' OR price < 10 AND stock > 0) AND price > cost",
        );
        assert_eq!(
            filters,
            vec![
                r#"?category = "A" || (?price < 10 && ?stock > 0)"#,
                "?price > ?cost"
            ]
        );
    }

    #[test]
    fn test_disjunct_only_attributes_are_optional() {
        let (triples, optional, filters) =
            convert_parts(&EmptyCatalog, "SELECT name FROM client WHERE age > 10 OR email = 'x'");
        assert_eq!(triples, vec!["?s0 <http://example.org/ontology/name> ?name"]);
        assert_eq!(
            optional,
            vec![
                "?s0 <http://example.org/ontology/age> ?age",
                "?s0 <http://example.org/ontology/email> ?email",
            ]
        );
        assert_eq!(filters, vec![r#"?age > 10 || ?email = "x""#]);
    }

    #[test]
    fn test_attributes_every_alternative_needs_stay_required() {
        let (triples, optional, _) =
            convert_parts(&EmptyCatalog, "SELECT name FROM client WHERE age > 60 OR age < 18");
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[1], "?s0 <http://example.org/ontology/age> ?age");
        assert!(optional.is_empty());

        let (triples, optional, _) = convert_parts(
            &EmptyCatalog,
            "SELECT name FROM product WHERE (category = 'A' OR price < 10) AND price > cost",
        );
        assert!(triples.contains(&"?s0 <http://example.org/ontology/price> ?price".to_string()));
        assert!(triples.contains(&"?s0 <http://example.org/ontology/cost> ?cost".to_string()));
        assert_eq!(optional, vec!["?s0 <http://example.org/ontology/category> ?category"]);
    }

    #[test]
    fn test_expression_filter() {
        let (_, filters) = convert("SELECT name FROM product WHERE (price * stock) > 1000");
        assert_eq!(filters, vec!["(?price * ?stock) > 1000"]);
    }

    #[test]
    fn test_subject_filter_with_iri() {
        let (_, filters) =
            convert("SELECT name FROM client WHERE subject = 'http://example.org/client/1'");
        assert_eq!(filters, vec!["?s0 = <http://example.org/client/1>"]);
    }
}
